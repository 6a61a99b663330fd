use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of every failure the crate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InputGenotype,
    InputMap,
    InputConstraint,
    ImpossibleCrossing,
    CrossingSchemeInvariant,
    Search,
    Interrupted,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GenotypeError {
    #[error("haplotypes of a chromosome differ in length ({0} vs {1})")]
    IncompatibleHaplotypes(usize, usize),

    #[error("genotypes cannot be crossed: {0}")]
    IncompatibleGenotypes(String),

    #[error("haplotype has no target loci")]
    EmptyHaplotype,

    #[error("genotype has no chromosomes")]
    EmptyGenotype,

    #[error("cannot parse genotype from {0:?}")]
    Parse(String),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeneticMapError {
    #[error("negative distance {distance} between loci {locus} and {next} of chromosome {chromosome}")]
    NegativeDistance {
        chromosome: usize,
        locus: usize,
        next: usize,
        distance: f64,
    },

    #[error("genetic map with loci {map:?} does not fit genotype with loci {genotype:?}")]
    ShapeMismatch {
        map: Vec<usize>,
        genotype: Vec<usize>,
    },
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstraintError {
    #[error("constraint {0} is given more than once")]
    Duplicate(String),

    #[error("constraint {id} cannot be satisfied: {reason}")]
    Contradictory { id: String, reason: String },

    #[error("success probability {0} is outside (0, 1]")]
    SuccessProbability(f64),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemeError {
    #[error("cannot cross plants from generation {0} and generation {1}")]
    ImpossibleCrossing(usize, usize),

    #[error("crossing scheme invariant broken: {0}")]
    Invariant(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Genotype(#[from] GenotypeError),

    #[error(transparent)]
    GeneticMap(#[from] GeneticMapError),

    #[error(transparent)]
    Constraint(#[from] ConstraintError),

    #[error(transparent)]
    Scheme(#[from] SchemeError),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to serialise output: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot start cross workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error("search interrupted")]
    Interrupted,
}

impl SearchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SearchError::Genotype(_) => ErrorKind::InputGenotype,
            SearchError::GeneticMap(_) => ErrorKind::InputMap,
            SearchError::Constraint(_) => ErrorKind::InputConstraint,
            SearchError::Scheme(SchemeError::ImpossibleCrossing(..)) => {
                ErrorKind::ImpossibleCrossing
            }
            SearchError::Scheme(SchemeError::Invariant(_)) => ErrorKind::CrossingSchemeInvariant,
            SearchError::Io { .. }
            | SearchError::Serialization(_)
            | SearchError::WorkerPool(_) => ErrorKind::Search,
            SearchError::Interrupted => ErrorKind::Interrupted,
        }
    }
}

pub type Result<T, E = SearchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_wrapped_errors() {
        let e: SearchError = GenotypeError::EmptyHaplotype.into();
        assert_eq!(e.kind(), ErrorKind::InputGenotype);
        let e: SearchError = SchemeError::ImpossibleCrossing(0, 1).into();
        assert_eq!(e.kind(), ErrorKind::ImpossibleCrossing);
        let e: SearchError = SchemeError::Invariant("x".to_owned()).into();
        assert_eq!(e.kind(), ErrorKind::CrossingSchemeInvariant);
        let e: SearchError = ConstraintError::Duplicate("MaxGenerations".to_owned()).into();
        assert_eq!(e.kind(), ErrorKind::InputConstraint);
        assert_eq!(SearchError::Interrupted.kind(), ErrorKind::Interrupted);
    }

    #[test]
    fn messages_name_the_problem() {
        let e = GeneticMapError::ShapeMismatch {
            map: vec![2],
            genotype: vec![3],
        };
        assert!(e.to_string().contains("[2]"));
        assert!(ConstraintError::Duplicate("MaxGenerations".to_owned())
            .to_string()
            .contains("MaxGenerations"));
    }
}
