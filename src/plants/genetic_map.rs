use crate::abstract_plants::BioSize;
use crate::error::GeneticMapError;
use std::fmt::Debug;

/// Converts a distance in centimorgans into a recombination probability.
pub trait MapFunction: Send + Sync + Debug {
    fn recombination_probability(&self, distance_cm: f64) -> f64;
}

/// `r = 0.5 (1 - e^{-2d})` with `d` in morgans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Haldane;

impl MapFunction for Haldane {
    fn recombination_probability(&self, distance_cm: f64) -> f64 {
        0.5 * (1.0 - (-2.0 * distance_cm / 100.0).exp())
    }
}

/// `r = 0.5 tanh(2d)` with `d` in morgans.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kosambi;

impl MapFunction for Kosambi {
    fn recombination_probability(&self, distance_cm: f64) -> f64 {
        0.5 * (2.0 * distance_cm / 100.0).tanh()
    }
}

/// Distances between consecutive target loci of every chromosome, together with the
/// recombination probabilities between every pair of loci on the same chromosome.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneticMap {
    distances: Vec<Vec<f64>>,
    recombination: Vec<Vec<Vec<f64>>>,
}

impl GeneticMap {
    /// `distances[c][i]` is the distance in cM between loci `i` and `i + 1` of chromosome `c`.
    pub fn new(
        distances: Vec<Vec<f64>>,
        map_function: &dyn MapFunction,
    ) -> Result<Self, GeneticMapError> {
        for (chromosome, ds) in distances.iter().enumerate() {
            if let Some((locus, &distance)) = ds
                .iter()
                .enumerate()
                .find(|(_, d)| d.is_nan() || **d < 0.0)
            {
                return Err(GeneticMapError::NegativeDistance {
                    chromosome,
                    locus,
                    next: locus + 1,
                    distance,
                });
            }
        }
        let recombination = distances
            .iter()
            .map(|ds| {
                let n = ds.len() + 1;
                let mut r = vec![vec![0.0; n]; n];
                for i in 0..n {
                    let mut d = 0.0;
                    for j in i + 1..n {
                        d += ds[j - 1];
                        r[i][j] = map_function.recombination_probability(d);
                        r[j][i] = r[i][j];
                    }
                }
                r
            })
            .collect();
        Ok(Self {
            distances,
            recombination,
        })
    }

    pub fn haldane(distances: Vec<Vec<f64>>) -> Result<Self, GeneticMapError> {
        Self::new(distances, &Haldane)
    }

    /// Map on which every pair of loci segregates independently.
    pub fn unlinked(loci_per_chromosome: &[usize]) -> Self {
        let distances = loci_per_chromosome
            .iter()
            .map(|&n| vec![f64::INFINITY; n.saturating_sub(1)])
            .collect();
        // infinite distances are non-negative, so construction cannot fail
        Self::new(distances, &Haldane).unwrap_or_else(|_| Self {
            distances: vec![],
            recombination: vec![],
        })
    }

    /// Recombination probability between loci `i` and `j` of chromosome `chrom`.
    pub fn r(&self, chrom: usize, i: usize, j: usize) -> f64 {
        self.recombination[chrom][i][j]
    }

    pub fn distances(&self, chrom: usize) -> &[f64] {
        &self.distances[chrom]
    }

    pub fn check_shape<T: BioSize>(&self, x: &T) -> Result<(), GeneticMapError> {
        match self.same_shape(x) {
            true => Ok(()),
            false => Err(GeneticMapError::ShapeMismatch {
                map: self.get_sizes(),
                genotype: x.get_sizes(),
            }),
        }
    }
}

impl BioSize for GeneticMap {
    fn get_sizes(&self) -> Vec<usize> {
        self.distances.iter().map(|ds| ds.len() + 1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;

    #[test]
    fn haldane_limits() {
        let map = GeneticMap::haldane(vec![vec![0.0, 100.0, 1e6]]).unwrap();
        assert_eq!(map.r(0, 0, 1), 0.0);
        assert!((map.r(0, 1, 2) - 0.5 * (1.0 - (-2.0f64).exp())).abs() < 1e-12);
        assert!((map.r(0, 2, 3) - 0.5).abs() < 1e-12);
        assert_eq!(map.r(0, 0, 2), map.r(0, 2, 0));
        assert!(map.r(0, 0, 3) <= 0.5);
    }

    #[test]
    fn kosambi_is_below_haldane_bound() {
        let h = Haldane.recombination_probability(10.0);
        let k = Kosambi.recombination_probability(10.0);
        assert!(k > 0.0 && k < 0.5);
        assert!(k > h);
    }

    #[test]
    fn negative_distances_are_rejected() {
        assert!(matches!(
            GeneticMap::haldane(vec![vec![1.0], vec![-1.0]]),
            Err(GeneticMapError::NegativeDistance { chromosome: 1, .. })
        ));
    }

    #[test]
    fn shape_is_checked_against_genotypes() {
        let map = GeneticMap::unlinked(&[2, 1]);
        assert_eq!(map.get_sizes(), vec![2, 1]);
        assert!((map.r(0, 0, 1) - 0.5).abs() < 1e-12);
        assert!(map.check_shape(&parse_genotype("10/01 1/0").unwrap()).is_ok());
        assert!(map.check_shape(&parse_genotype("10/01").unwrap()).is_err());
    }
}
