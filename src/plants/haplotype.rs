use crate::abstract_plants::*;
use crate::error::GenotypeError;
use bit_vec::BitVec;
use std::fmt;

/// Presence flags of the targets along one chromatid, ordered lexicographically.
#[derive(Debug, Clone, PartialEq, PartialOrd, Ord, Eq, Hash)]
pub struct Haplotype {
    targets: BitVec,
}

impl Haplotype {
    pub fn new(targets: BitVec) -> Result<Self, GenotypeError> {
        if targets.is_empty() {
            return Err(GenotypeError::EmptyHaplotype);
        }
        Ok(Self { targets })
    }

    pub fn from_bools(targets: &[bool]) -> Result<Self, GenotypeError> {
        Self::new(targets.iter().copied().collect())
    }

    /// Reads a haplotype written as a string of `0` and `1` characters.
    pub fn parse(s: &str) -> Result<Self, GenotypeError> {
        let targets = s
            .chars()
            .map(|c| match c {
                '0' => Ok(false),
                '1' => Ok(true),
                _ => Err(GenotypeError::Parse(s.to_owned())),
            })
            .collect::<Result<BitVec, _>>()?;
        Self::new(targets)
    }

    pub fn n_targets(&self) -> usize {
        self.targets.len()
    }

    pub fn target(&self, locus: usize) -> bool {
        self.targets.get(locus).unwrap_or(false)
    }

    pub fn targets(&self) -> &BitVec {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        self.targets.iter()
    }
}

impl Haploid for Haplotype {
    fn alleles(&self) -> Vec<Allele> {
        self.targets.iter().map(Allele::from).collect()
    }
}

impl BioSize for Haplotype {
    fn get_sizes(&self) -> Vec<usize> {
        vec![self.targets.len()]
    }
}

impl fmt::Display for Haplotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for t in self.targets.iter() {
            write!(f, "{}", if t { '1' } else { '0' })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_haplotype_is_rejected() {
        assert_eq!(Haplotype::parse(""), Err(GenotypeError::EmptyHaplotype));
        assert!(matches!(Haplotype::parse("01x"), Err(GenotypeError::Parse(_))));
    }

    #[test]
    fn lexicographic_order() {
        let a = Haplotype::parse("011").unwrap();
        let b = Haplotype::parse("100").unwrap();
        let c = Haplotype::parse("101").unwrap();
        assert!(a < b);
        assert!(b < c);
        assert_eq!(a, Haplotype::from_bools(&[false, true, true]).unwrap());
        assert_eq!(c.to_string(), "101");
        assert_eq!(c.alleles(), vec![Allele::O, Allele::Z, Allele::O]);
    }
}
