use crate::plants::{Genotype, SeedLot};
use serde::Serialize;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Objectives of a crossing scheme, also used as optimistic bounds of its completions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossingSchemeDescriptor {
    pub num_generations: usize,
    pub num_crossings: usize,
    pub max_crossings_with_plant: usize,
    pub max_pop_per_generation: u64,
    pub total_pop_size: u64,
    pub linkage_phase_ambiguity: f64,
    pub num_targets_from_non_uniform: usize,
}

/// A plant as it is grown from a seed lot.
#[derive(Debug, Clone)]
pub struct PlantDescriptor {
    pub genotype: Arc<Genotype>,
    /// Probability of the phase-known genotype among the seeds.
    pub probability: f64,
    pub linkage_phase_ambiguity: f64,
    pub uniform_parent: bool,
}

impl PlantDescriptor {
    /// Descriptor of a plant with `genotype` grown from `lot`.
    pub fn grown_from(genotype: &Genotype, lot: &SeedLot) -> Self {
        Self {
            genotype: Arc::new(genotype.clone()),
            probability: lot.probability_of_phase_known(genotype),
            linkage_phase_ambiguity: lot.linkage_phase_ambiguity(genotype),
            uniform_parent: lot.is_uniform(),
        }
    }
}

impl PartialEq for PlantDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.genotype == other.genotype
            && self.probability.to_bits() == other.probability.to_bits()
            && self.linkage_phase_ambiguity.to_bits() == other.linkage_phase_ambiguity.to_bits()
            && self.uniform_parent == other.uniform_parent
    }
}

impl Eq for PlantDescriptor {}

impl Hash for PlantDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.genotype.hash(state);
        self.probability.to_bits().hash(state);
        self.linkage_phase_ambiguity.to_bits().hash(state);
        self.uniform_parent.hash(state);
    }
}
