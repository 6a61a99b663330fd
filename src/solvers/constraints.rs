use crate::error::ConstraintError;
use crate::scheme::{CrossingScheme, CrossingSchemeDescriptor, PlantIx};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Hard limits on the objectives of a crossing scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Constraint {
    MaxGenerations(usize),
    MaxTotalPopSize(u64),
    MaxPopSizePerGeneration(u64),
    MaxCrossingsWithPlant(usize),
    MaxCrossings(usize),
    MaxLinkagePhaseAmbiguity(f64),
}

impl Constraint {
    pub fn id(&self) -> &'static str {
        match self {
            Constraint::MaxGenerations(_) => "MaxGenerations",
            Constraint::MaxTotalPopSize(_) => "MaxTotalPopSize",
            Constraint::MaxPopSizePerGeneration(_) => "MaxPopSizePerGen",
            Constraint::MaxCrossingsWithPlant(_) => "MaxCrossingsWithPlant",
            Constraint::MaxCrossings(_) => "MaxCrossings",
            Constraint::MaxLinkagePhaseAmbiguity(_) => "MaxLinkagePhaseAmbiguity",
        }
    }

    pub fn is_satisfied(&self, d: &CrossingSchemeDescriptor) -> bool {
        match *self {
            Constraint::MaxGenerations(max) => d.num_generations <= max,
            Constraint::MaxTotalPopSize(max) => d.total_pop_size <= max,
            Constraint::MaxPopSizePerGeneration(max) => d.max_pop_per_generation <= max,
            Constraint::MaxCrossingsWithPlant(max) => d.max_crossings_with_plant <= max,
            Constraint::MaxCrossings(max) => d.num_crossings <= max,
            Constraint::MaxLinkagePhaseAmbiguity(max) => d.linkage_phase_ambiguity <= max,
        }
    }

    fn check(&self) -> Result<(), ConstraintError> {
        let reason = match *self {
            Constraint::MaxLinkagePhaseAmbiguity(max) if !(0.0..=1.0).contains(&max) => {
                Some(format!("ambiguity bound {max} is outside [0, 1]"))
            }
            Constraint::MaxTotalPopSize(0) | Constraint::MaxPopSizePerGeneration(0) => {
                Some("no seeds may be grown".to_owned())
            }
            Constraint::MaxCrossingsWithPlant(0) => Some("no plant may be crossed".to_owned()),
            _ => None,
        };
        match reason {
            Some(reason) => Err(ConstraintError::Contradictory {
                id: self.id().to_owned(),
                reason,
            }),
            None => Ok(()),
        }
    }
}

/// Validated list of constraints with distinct identifiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints(Vec<Constraint>);

impl Constraints {
    pub fn new(constraints: Vec<Constraint>) -> Result<Self, ConstraintError> {
        let mut seen = HashSet::new();
        for c in &constraints {
            if !seen.insert(c.id()) {
                return Err(ConstraintError::Duplicate(c.id().to_owned()));
            }
            c.check()?;
        }
        Ok(Self(constraints))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Constraint> {
        self.0.iter()
    }

    pub fn all_satisfied(&self, d: &CrossingSchemeDescriptor) -> bool {
        self.0.iter().all(|c| c.is_satisfied(d))
    }

    pub fn max_generations(&self) -> Option<usize> {
        self.0.iter().find_map(|c| match c {
            Constraint::MaxGenerations(max) => Some(*max),
            _ => None,
        })
    }

    pub fn max_pop_per_generation(&self) -> Option<u64> {
        self.0.iter().find_map(|c| match c {
            Constraint::MaxPopSizePerGeneration(max) => Some(*max),
            _ => None,
        })
    }

    pub fn max_crossings_with_plant(&self) -> Option<usize> {
        self.0.iter().find_map(|c| match c {
            Constraint::MaxCrossingsWithPlant(max) => Some(*max),
            _ => None,
        })
    }

    pub fn max_linkage_phase_ambiguity(&self) -> Option<f64> {
        self.0.iter().find_map(|c| match c {
            Constraint::MaxLinkagePhaseAmbiguity(max) => Some(*max),
            _ => None,
        })
    }

    /// A plant with the given id in `generation` that can be used in one more crossing, or
    /// selfed once more, without breaking the crossing cap. Among plants eligible for a
    /// crossing, one that was crossed an odd number of times is preferred.
    pub fn reusable_plant(
        &self,
        id: u64,
        generation: usize,
        scheme: &CrossingScheme,
        selfing: bool,
    ) -> Option<PlantIx> {
        let plants = scheme.plants_in_generation_with_id(generation, id);
        let Some(cap) = self.max_crossings_with_plant() else {
            return plants.first().copied();
        };
        let times = |p: PlantIx| scheme.graph().plant(p).times_crossed();
        if selfing {
            return plants.into_iter().find(|&p| times(p) + 2 <= cap);
        }
        let mut reusable = None;
        for p in plants {
            if times(p) < cap {
                reusable = Some(p);
                if times(p) % 2 == 1 {
                    break;
                }
            }
        }
        reusable
    }
}
