//! Genetic primitives: haplotypes, diploid chromosomes, genotypes, genetic maps and the seed
//! lots obtained by crossing two genotypes.

pub mod chromosome;
pub mod genetic_map;
pub mod genotype;
pub mod haplotype;
/// Offspring distributions grouped by observable state
pub mod seed_lot;

pub use chromosome::{ChromosomeState, DiploidChromosome, TargetState};
pub use genetic_map::{GeneticMap, Haldane, Kosambi, MapFunction};
pub use genotype::{Genotype, ObservableState};
pub use haplotype::Haplotype;
pub use seed_lot::{GenotypeGroup, SeedLot};
