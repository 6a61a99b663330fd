use crate::plants::Genotype;
use crate::scheme::crossing_scheme::CrossingScheme;
use crate::scheme::descriptor::PlantDescriptor;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Equivalent schemes for the same final genotype, obtained from different alignments of their
/// histories. The search queues and expands them as one unit.
#[derive(Debug, Clone)]
pub struct CrossingSchemeAlternatives {
    id: u64,
    alternatives: Vec<Arc<CrossingScheme>>,
}

impl CrossingSchemeAlternatives {
    /// All alternatives must share the final genotype.
    pub fn new(id: u64, alternatives: Vec<Arc<CrossingScheme>>) -> Self {
        debug_assert!(alternatives
            .windows(2)
            .all(|w| w[0].final_genotype() == w[1].final_genotype()));
        Self { id, alternatives }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn alternatives(&self) -> &[Arc<CrossingScheme>] {
        &self.alternatives
    }

    pub fn len(&self) -> usize {
        self.alternatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alternatives.is_empty()
    }

    pub fn retain(&mut self, keep: impl FnMut(&Arc<CrossingScheme>) -> bool) {
        self.alternatives.retain(keep);
    }

    pub fn min_num_generations(&self) -> usize {
        self.alternatives
            .iter()
            .map(|s| s.num_generations())
            .min()
            .unwrap_or(0)
    }

    /// `None` once every alternative has been removed.
    pub fn final_genotype(&self) -> Option<&Arc<Genotype>> {
        self.alternatives.first().map(|s| s.final_genotype())
    }

    /// Descriptors of every plant grown in any of the alternatives.
    pub fn ancestor_descriptors(&self) -> HashSet<PlantDescriptor> {
        self.alternatives
            .iter()
            .flat_map(|s| s.plant_descriptors())
            .collect()
    }
}

impl fmt::Display for CrossingSchemeAlternatives {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} [", self.id)?;
        for (i, s) in self.alternatives.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", s)?;
        }
        write!(f, "]")
    }
}
