use crate::error::GenotypeError;
use crate::plants::{DiploidChromosome, Genotype, Haplotype};
use bit_vec::BitVec;
use rand::prelude::*;

/// Reads a genotype written as whitespace separated chromosomes, each given as two haplotypes
/// separated by `/`, e.g. `"110/011 1/0"`.
pub fn parse_genotype(s: &str) -> Result<Genotype, GenotypeError> {
    let chromosomes = s
        .split_whitespace()
        .map(|c| {
            let (h1, h2) = c
                .split_once('/')
                .ok_or_else(|| GenotypeError::Parse(c.to_owned()))?;
            DiploidChromosome::new(Haplotype::parse(h1)?, Haplotype::parse(h2)?)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Genotype::new(chromosomes)
}

/// Builds single chromosome homozygous plants where locus `i` is donated by plant `sources[i]`.
pub fn homozygous_from_sources(sources: &[usize]) -> Result<Vec<Genotype>, GenotypeError> {
    let n_loci = sources.len();
    let n_pop = sources.iter().max().map(|&m| m + 1).unwrap_or(0);
    (0..n_pop)
        .map(|j| {
            let h = Haplotype::new(BitVec::from_fn(n_loci, |i| sources[i] == j))?;
            Genotype::new(vec![DiploidChromosome::new(h.clone(), h)?])
        })
        .collect()
}

/// Reads a line such as `"0 1 1 0"` into homozygous plants, see [`homozygous_from_sources`].
pub fn parse_homozygous(s: &str) -> Result<Vec<Genotype>, GenotypeError> {
    let sources = s
        .split_whitespace()
        .map(|w| w.parse::<usize>().map_err(|_| GenotypeError::Parse(w.to_owned())))
        .collect::<Result<Vec<_>, _>>()?;
    homozygous_from_sources(&sources)
}

pub fn ideotype(loci_per_chromosome: &[usize]) -> Result<Genotype, GenotypeError> {
    loci_per_chromosome
        .iter()
        .map(|&n| {
            let h = Haplotype::new(BitVec::from_elem(n, true))?;
            DiploidChromosome::new(h.clone(), h)
        })
        .collect::<Result<Vec<_>, _>>()
        .and_then(Genotype::new)
}

pub fn random_genotype<R>(rng: &mut R, loci_per_chromosome: &[usize]) -> Result<Genotype, GenotypeError>
where
    R: Rng + ?Sized,
{
    let chromosomes = loci_per_chromosome
        .iter()
        .map(|&n| {
            let h1 = Haplotype::new(BitVec::from_fn(n, |_| rng.gen()))?;
            let h2 = Haplotype::new(BitVec::from_fn(n, |_| rng.gen()))?;
            DiploidChromosome::new(h1, h2)
        })
        .collect::<Result<Vec<_>, _>>()?;
    Genotype::new(chromosomes)
}

/// Random population in which every target is present in at least one plant.
pub fn init_pop_random<R>(
    rng: &mut R,
    loci_per_chromosome: &[usize],
    n_pop: usize,
) -> Result<Vec<Genotype>, GenotypeError>
where
    R: Rng + ?Sized,
{
    // TODO: resample only the missing loci instead of the whole population <2026-10-18> //
    loop {
        let pop = (0..n_pop)
            .map(|_| random_genotype(rng, loci_per_chromosome))
            .collect::<Result<Vec<_>, _>>()?;
        if n_pop == 0 || covers_all_targets(&pop) {
            return Ok(pop);
        }
    }
}

fn covers_all_targets(pop: &[Genotype]) -> bool {
    let Some(first) = pop.first() else {
        return false;
    };
    (0..first.n_chromosomes()).all(|c| {
        (0..first.chromosome(c).n_loci()).all(|l| {
            pop.iter().any(|g| {
                g.chromosome(c)
                    .haplotypes()
                    .iter()
                    .any(|h| h.target(l))
            })
        })
    })
}
