//! Crossing scheme design for gene stacking.
//!
//! Given initial plants, a target genotype (the ideotype) and a genetic map, the branch and
//! bound search in [`solvers::branch_and_bound`] finds the Pareto optimal crossing schemes that
//! grow the ideotype with a given success probability. Components are separated by module.
//! Typical use is as follows:
//! ```
//! use gene_stacker::extra::instance_generators::parse_genotype;
//! use gene_stacker::plants::GeneticMap;
//! use gene_stacker::solvers::{search, Constraint, Constraints, SearchOptions};
//!
//! let initial = vec![parse_genotype("10/10").unwrap(), parse_genotype("01/01").unwrap()];
//! let ideotype = parse_genotype("11/11").unwrap();
//! let map = GeneticMap::haldane(vec![vec![20.0]]).unwrap();
//! let options = SearchOptions::default()
//!     .with_success_probability(0.9)
//!     .with_constraints(Constraints::new(vec![Constraint::MaxGenerations(3)]).unwrap());
//!
//! let report = search(initial, ideotype, map, None, 2, options).unwrap();
//! for scheme in report.solutions() {
//!     println!("{scheme}");
//! }
//! ```
//#![deny(missing_docs)]

/// Exports the traits shared by plants and the search
pub mod abstract_plants;
pub mod config;
pub mod error;
pub mod extra;
pub mod plants;
pub mod scheme;
pub mod solvers;

pub use error::{ErrorKind, Result, SearchError};
