/// Shape of a genetic object: the number of target loci on each chromosome.
pub trait BioSize {
    /// Creates an array of sizes where the i-th entry is the number of target loci on the i-th
    /// chromosome
    fn get_sizes(&self) -> Vec<usize>;

    fn get_n_loci(&self, chromosome_i: usize) -> usize {
        self.get_sizes()[chromosome_i]
    }

    fn get_n_chrom(&self) -> usize {
        self.get_sizes().len()
    }

    /// Two objects fit together when they agree on chromosome count and per-chromosome loci
    /// counts.
    fn same_shape<T: BioSize + ?Sized>(&self, other: &T) -> bool {
        self.get_sizes() == other.get_sizes()
    }
}

/// Presence (`O`) or absence (`Z`) of the target allele at a locus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Allele {
    Z,
    O,
}

impl From<bool> for Allele {
    fn from(value: bool) -> Self {
        match value {
            false => Allele::Z,
            true => Allele::O,
        }
    }
}

impl From<Allele> for bool {
    fn from(value: Allele) -> Self {
        match value {
            Allele::Z => false,
            Allele::O => true,
        }
    }
}

pub trait Haploid {
    fn alleles(&self) -> Vec<Allele>;
}

pub trait Diploid<B: Haploid> {
    fn upper(&self) -> &B;
    fn lower(&self) -> &B;
}

/// Binary relation deciding whether `x` dominates `y`.
pub trait Dominance<T>: Send + Sync {
    fn dom(&self, x: &T, y: &T) -> bool;
}

impl<T> std::fmt::Debug for dyn Dominance<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Dominance")
    }
}

impl<T, F> Dominance<T> for F
where
    F: Fn(&T, &T) -> bool + Send + Sync,
{
    fn dom(&self, x: &T, y: &T) -> bool {
        self(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sizes(Vec<usize>);

    impl BioSize for Sizes {
        fn get_sizes(&self) -> Vec<usize> {
            self.0.clone()
        }
    }

    #[test]
    fn shapes_compare_per_chromosome() {
        let x = Sizes(vec![2, 3]);
        assert_eq!(x.get_n_chrom(), 2);
        assert_eq!(x.get_n_loci(1), 3);
        assert!(x.same_shape(&Sizes(vec![2, 3])));
        assert!(!x.same_shape(&Sizes(vec![3, 2])));
        assert!(!x.same_shape(&Sizes(vec![2])));
    }

    #[test]
    fn closures_are_dominance_relations() {
        let d = |x: &i32, y: &i32| x > y;
        assert!(d.dom(&2, &1));
        assert!(!Dominance::dom(&d, &1, &1));
        assert_eq!(Allele::from(true), Allele::O);
        assert!(!bool::from(Allele::Z));
    }
}
