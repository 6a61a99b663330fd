use crate::abstract_plants::*;
use crate::error::GenotypeError;
use crate::plants::chromosome::{ChromosomeState, DiploidChromosome, TargetState};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Per-chromosome observable states of a genotype; the key of a genotype group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ObservableState {
    chromosomes: Vec<ChromosomeState>,
}

impl ObservableState {
    pub fn new(chromosomes: Vec<ChromosomeState>) -> Self {
        Self { chromosomes }
    }

    pub fn chromosome(&self, chrom: usize) -> &ChromosomeState {
        &self.chromosomes[chrom]
    }

    pub fn chromosomes(&self) -> &[ChromosomeState] {
        &self.chromosomes
    }

    pub fn target(&self, chrom: usize, locus: usize) -> TargetState {
        self.chromosomes[chrom].target(locus)
    }
}

/// Phase-known diploid genotype. The observable state is computed once at construction.
#[derive(Debug, Clone)]
pub struct Genotype {
    chromosomes: Vec<DiploidChromosome>,
    observable: ObservableState,
}

impl Genotype {
    pub fn new(chromosomes: Vec<DiploidChromosome>) -> Result<Self, GenotypeError> {
        if chromosomes.is_empty() {
            return Err(GenotypeError::EmptyGenotype);
        }
        Ok(Self::from_chromosomes(chromosomes))
    }

    /// Genotype without chromosomes, carried by placeholder plant nodes.
    pub(crate) fn placeholder() -> Self {
        Self::from_chromosomes(vec![])
    }

    fn from_chromosomes(chromosomes: Vec<DiploidChromosome>) -> Self {
        let observable =
            ObservableState::new(chromosomes.iter().map(|c| c.observable_state()).collect());
        Self {
            chromosomes,
            observable,
        }
    }

    pub fn chromosomes(&self) -> &[DiploidChromosome] {
        &self.chromosomes
    }

    pub fn chromosome(&self, chrom: usize) -> &DiploidChromosome {
        &self.chromosomes[chrom]
    }

    pub fn n_chromosomes(&self) -> usize {
        self.chromosomes.len()
    }

    pub fn observable_state(&self) -> &ObservableState {
        &self.observable
    }

    /// The allelic frequency vector; another name for the observable state.
    pub fn allelic_frequencies(&self) -> &ObservableState {
        &self.observable
    }

    pub fn is_homozygous_at_all_target_loci(&self) -> bool {
        self.chromosomes.iter().all(|c| c.is_homozygous())
    }

    pub fn compatible_with(&self, other: &Genotype) -> bool {
        self.same_shape(other)
    }

    pub fn check_compatible(&self, other: &Genotype) -> Result<(), GenotypeError> {
        match self.compatible_with(other) {
            true => Ok(()),
            false => Err(GenotypeError::IncompatibleGenotypes(format!(
                "{:?} vs {:?} loci per chromosome",
                self.get_sizes(),
                other.get_sizes()
            ))),
        }
    }
}

impl BioSize for Genotype {
    fn get_sizes(&self) -> Vec<usize> {
        self.chromosomes.iter().map(|c| c.n_loci()).collect()
    }
}

impl PartialEq for Genotype {
    fn eq(&self, other: &Self) -> bool {
        self.chromosomes == other.chromosomes
    }
}

impl Eq for Genotype {}

impl Hash for Genotype {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.chromosomes.hash(state);
    }
}

impl PartialOrd for Genotype {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Genotype {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chromosomes.cmp(&other.chromosomes)
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.chromosomes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use std::collections::HashSet;

    #[test]
    fn phase_matters_for_equality() {
        let x = parse_genotype("10/01").unwrap();
        let y = parse_genotype("11/00").unwrap();
        let z = parse_genotype("01/10").unwrap();
        assert_ne!(x, y);
        assert_eq!(x, z);
        assert_eq!(x.observable_state(), y.observable_state());
        let set: HashSet<Genotype> = vec![x, y, z].into_iter().collect();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn compatibility_requires_same_shape() {
        let x = parse_genotype("10/01 1/1").unwrap();
        assert!(x.compatible_with(&parse_genotype("00/00 0/1").unwrap()));
        assert!(!x.compatible_with(&parse_genotype("00/00").unwrap()));
        assert!(x
            .check_compatible(&parse_genotype("000/000 0/1").unwrap())
            .is_err());
    }

    #[test]
    fn homozygosity_and_empty_genotypes() {
        assert!(parse_genotype("11/11 0/0").unwrap().is_homozygous_at_all_target_loci());
        assert!(!parse_genotype("11/11 0/1").unwrap().is_homozygous_at_all_target_loci());
        assert_eq!(Genotype::new(vec![]), Err(GenotypeError::EmptyGenotype));
        assert_eq!(parse_genotype("10/01 1/1").unwrap().to_string(), "01/10 1/1");
    }
}
