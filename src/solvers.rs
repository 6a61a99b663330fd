//! The branch and bound search and the pieces it is assembled from.
//!
//! [`branch_and_bound::search`] is the entry point. Everything else can be swapped through
//! [`branch_and_bound::SearchOptions`]: how seed lots are constructed, how population sizes are
//! computed, which heuristics bound the search and which dominance relation the frontier keeps.

/// Queue-driven search over crossing schemes
pub mod branch_and_bound;
/// Hard limits on scheme objectives
pub mod constraints;
/// Seed lot construction restricted to promising gametes
pub mod heuristic_constructor;
/// Additional bounds and filters
pub mod heuristics;
pub mod listener;
/// Merging of two scheme histories under a new crossing
pub mod merger;
pub mod pareto;
/// Seeds needed to observe target plants
pub mod population_size;
pub mod runtime_limit;
pub mod seed_lot_cache;
/// Exact offspring distributions of crossings
pub mod seed_lot_constructor;
/// Bounds against constraints and the current frontier
pub mod solution_manager;

pub use branch_and_bound::{search, BranchAndBound, SearchOptions, SearchReport};
pub use constraints::{Constraint, Constraints};
pub use listener::{MessageLevel, SearchListener};
pub use pareto::{DefaultDominance, ParetoFrontier};
