//! Crossing schemes: plants, seed lots and crossings arranged in generations, rooted at the
//! final plant.

/// Equivalent schemes handled as one search node
pub mod alternatives;
pub mod crossing_scheme;
/// Objective vectors of schemes and plants
pub mod descriptor;
/// Arena of scheme nodes
pub mod graph;
pub mod nodes;

pub use alternatives::CrossingSchemeAlternatives;
pub use crossing_scheme::CrossingScheme;
pub use descriptor::{CrossingSchemeDescriptor, PlantDescriptor};
pub use graph::SchemeGraph;
pub use nodes::{
    CrossingIx, CrossingNode, NodeIds, NodeKey, PlantIx, PlantNode, SeedLotIx, SeedLotNode,
    PLACEHOLDER_ID,
};
