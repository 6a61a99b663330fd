//! Utilities around the search: reports, drawings and instance generation.

/// Text reports and formatting helpers
pub mod analysis;
/// Genotype parsing and random instances
pub mod instance_generators;
/// Graphviz and SVG output
pub mod visualisation;
