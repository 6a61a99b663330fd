use crate::abstract_plants::*;
use crate::error::GenotypeError;
use crate::plants::haplotype::Haplotype;
use serde::Serialize;
use std::fmt;

/// Number of copies of the target present at a locus, as seen from the outside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TargetState {
    Zero,
    Once,
    Twice,
}

impl TargetState {
    pub fn from_alleles(a: bool, b: bool) -> Self {
        match (a, b) {
            (false, false) => TargetState::Zero,
            (true, true) => TargetState::Twice,
            _ => TargetState::Once,
        }
    }

    /// Whether a parent contributing `allele` can still produce this state when the other
    /// parent's contribution is restricted to `other`.
    pub fn allows(self, allele: bool, other: TargetState) -> bool {
        match self {
            TargetState::Twice => allele,
            TargetState::Zero => !allele,
            TargetState::Once => match other {
                TargetState::Twice => !allele,
                TargetState::Zero => allele,
                TargetState::Once => true,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChromosomeState {
    targets: Vec<TargetState>,
}

impl ChromosomeState {
    pub fn new(targets: Vec<TargetState>) -> Self {
        Self { targets }
    }

    pub fn target(&self, locus: usize) -> TargetState {
        self.targets[locus]
    }

    pub fn targets(&self) -> &[TargetState] {
        &self.targets
    }
}

/// Pair of haplotypes stored in canonical order (smallest first).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiploidChromosome {
    haplotypes: [Haplotype; 2],
}

impl DiploidChromosome {
    pub fn new(h1: Haplotype, h2: Haplotype) -> Result<Self, GenotypeError> {
        if h1.n_targets() != h2.n_targets() {
            return Err(GenotypeError::IncompatibleHaplotypes(
                h1.n_targets(),
                h2.n_targets(),
            ));
        }
        let haplotypes = if h1 <= h2 { [h1, h2] } else { [h2, h1] };
        Ok(Self { haplotypes })
    }

    pub fn n_loci(&self) -> usize {
        self.haplotypes[0].n_targets()
    }

    pub fn haplotype(&self, i: usize) -> &Haplotype {
        &self.haplotypes[i]
    }

    pub fn haplotypes(&self) -> &[Haplotype; 2] {
        &self.haplotypes
    }

    pub fn is_homozygous_at(&self, locus: usize) -> bool {
        self.haplotypes[0].target(locus) == self.haplotypes[1].target(locus)
    }

    pub fn is_homozygous(&self) -> bool {
        self.haplotypes[0] == self.haplotypes[1]
    }

    pub fn target_state(&self, locus: usize) -> TargetState {
        TargetState::from_alleles(
            self.haplotypes[0].target(locus),
            self.haplotypes[1].target(locus),
        )
    }

    pub fn observable_state(&self) -> ChromosomeState {
        ChromosomeState::new((0..self.n_loci()).map(|l| self.target_state(l)).collect())
    }
}

impl Diploid<Haplotype> for DiploidChromosome {
    fn upper(&self) -> &Haplotype {
        &self.haplotypes[0]
    }

    fn lower(&self) -> &Haplotype {
        &self.haplotypes[1]
    }
}

impl BioSize for DiploidChromosome {
    fn get_sizes(&self) -> Vec<usize> {
        vec![self.n_loci()]
    }
}

impl fmt::Display for DiploidChromosome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.haplotypes[0], self.haplotypes[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hap(s: &str) -> Haplotype {
        Haplotype::parse(s).unwrap()
    }

    #[test]
    fn lengths_must_match() {
        assert_eq!(
            DiploidChromosome::new(hap("01"), hap("011")),
            Err(GenotypeError::IncompatibleHaplotypes(2, 3))
        );
    }

    #[test]
    fn observable_state_counts_targets() {
        let c = DiploidChromosome::new(hap("110"), hap("010")).unwrap();
        assert_eq!(c.upper(), &hap("010"));
        assert_eq!(
            c.observable_state().targets(),
            &[TargetState::Once, TargetState::Twice, TargetState::Zero]
        );
        assert!(!c.is_homozygous_at(0));
        assert!(c.is_homozygous_at(1));
        assert!(!c.is_homozygous());
    }

    #[test]
    fn desired_state_case_table() {
        assert!(TargetState::Twice.allows(true, TargetState::Zero));
        assert!(!TargetState::Twice.allows(false, TargetState::Twice));
        assert!(TargetState::Zero.allows(false, TargetState::Once));
        assert!(!TargetState::Once.allows(true, TargetState::Twice));
        assert!(TargetState::Once.allows(true, TargetState::Zero));
        assert!(!TargetState::Once.allows(false, TargetState::Zero));
        assert!(TargetState::Once.allows(false, TargetState::Once));
        assert!(TargetState::Once.allows(true, TargetState::Once));
    }

    proptest! {
        #[test]
        fn haplotypes_are_stored_in_order(
            pair in (1usize..12).prop_flat_map(|n| (
                prop::collection::vec(any::<bool>(), n),
                prop::collection::vec(any::<bool>(), n),
            ))
        ) {
            let h1 = Haplotype::from_bools(&pair.0).unwrap();
            let h2 = Haplotype::from_bools(&pair.1).unwrap();
            let c = DiploidChromosome::new(h1.clone(), h2.clone()).unwrap();
            prop_assert!(c.haplotype(0) <= c.haplotype(1));
            prop_assert_eq!(c, DiploidChromosome::new(h2, h1).unwrap());
        }
    }
}
