//! Plain-data configuration: search settings that can be stored as JSON, and the environment
//! settings used for rendering.

use crate::error::{ConfigError, Result};
use crate::plants::{GeneticMap, Genotype};
use crate::solvers::branch_and_bound::{SearchOptions, DEFAULT_SUCCESS_PROBABILITY};
use crate::solvers::constraints::{Constraint, Constraints};
use crate::solvers::heuristic_constructor::HeuristicSeedLotConstructor;
use crate::solvers::heuristics::{
    DuplicatePlantFilter, Heuristics, ImprovementOverAncestorsHeuristic, MinProbabilityFilter,
    OptimalSubschemeHeuristic,
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Environment variable naming the settings file.
pub const CONFIG_ENV: &str = "GENE_STACKER_CONFIG";
/// Graphviz executable looked up on the `PATH` when none is configured.
pub const DEFAULT_DOT: &str = "dot";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchConfig {
    pub success_probability: f64,
    pub constraints: Vec<Constraint>,
    /// Maximum number of seeds a single crossing produces.
    pub seeds_per_crossing: Option<u64>,
    pub homozygous_ideotype_parents: bool,
    /// Seconds; no limit when absent.
    pub runtime_limit: Option<f64>,
    pub workers: usize,
    pub intermediate_output: Option<PathBuf>,
    pub remove_duplicate_plants: bool,
    pub heuristics: HeuristicConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            success_probability: DEFAULT_SUCCESS_PROBABILITY,
            constraints: Vec::new(),
            seeds_per_crossing: None,
            homozygous_ideotype_parents: false,
            runtime_limit: None,
            workers: 1,
            intermediate_output: None,
            remove_duplicate_plants: false,
            heuristics: HeuristicConfig::default(),
        }
    }
}

/// Heuristics switched on for a search. All of them are off by default, which keeps the search
/// exact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicConfig {
    pub optimal_subschemes: bool,
    pub improvement_over_ancestors: bool,
    pub heuristic_seed_lots: Option<HeuristicSeedLotConfig>,
    /// Genotypes grown with a lower phase-known probability are dropped from every seed lot.
    pub min_probability: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeuristicSeedLotConfig {
    pub max_crossovers: Option<usize>,
    pub consistent: bool,
}

impl SearchConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Negative and non-finite limits are treated as no limit.
    pub fn runtime_limit(&self) -> Option<Duration> {
        self.runtime_limit
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
    }

    /// Options for a search towards `ideotype` on `map`.
    pub fn build_options(&self, ideotype: &Genotype, map: &GeneticMap) -> Result<SearchOptions> {
        let constraints = Constraints::new(self.constraints.clone())?;
        let mut options = SearchOptions::default()
            .with_success_probability(self.success_probability)
            .with_constraints(constraints)
            .with_seeds_per_crossing(self.seeds_per_crossing)
            .with_homozygous_ideotype_parents(self.homozygous_ideotype_parents);

        let h = &self.heuristics;
        let mut heuristics = Heuristics::default();
        if h.optimal_subschemes {
            heuristics.push(Arc::new(OptimalSubschemeHeuristic::new(
                options.dominance.clone(),
            )));
        }
        if h.improvement_over_ancestors {
            heuristics.push(Arc::new(ImprovementOverAncestorsHeuristic::new(Arc::new(
                ideotype.clone(),
            ))));
        }
        options = options.with_heuristics(heuristics);
        if let Some(lots) = &h.heuristic_seed_lots {
            options = options.with_seed_lot_constructor(Arc::new(HeuristicSeedLotConstructor::new(
                Arc::new(map.clone()),
                Arc::new(ideotype.clone()),
                lots.max_crossovers,
                lots.consistent,
            )));
        }
        if let Some(min_probability) = h.min_probability {
            options = options.with_seed_lot_filter(Arc::new(MinProbabilityFilter { min_probability }));
        }
        if self.remove_duplicate_plants {
            options = options.with_initial_plant_filter(Arc::new(DuplicatePlantFilter));
        }
        if let Some(path) = &self.intermediate_output {
            options = options.with_intermediate_output(path.clone());
        }
        Ok(options)
    }
}

/// Environment settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Graphviz `dot` executable, may start with `~/`.
    #[serde(rename = "dot.path", default, skip_serializing_if = "Option::is_none")]
    pub dot_path: Option<String>,
}

impl Settings {
    /// Reads the file named by [`CONFIG_ENV`], or `~/.gene_stacker/config.json`. A missing file
    /// gives the defaults; a malformed one is reported and ignored.
    pub fn load() -> Self {
        let Some(path) = settings_location() else {
            return Self::default();
        };
        if !path.exists() {
            debug!("no settings file at {}", path.display());
            return Self::default();
        }
        match Self::from_file(&path) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("ignoring settings: {e}");
                Self::default()
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    pub fn dot_executable(&self) -> PathBuf {
        let home = std::env::var_os("HOME").map(PathBuf::from);
        resolve_dot(self.dot_path.as_deref(), home.as_deref())
    }
}

fn settings_location() -> Option<PathBuf> {
    std::env::var_os(CONFIG_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME")
                .map(|home| Path::new(&home).join(".gene_stacker").join("config.json"))
        })
}

fn resolve_dot(configured: Option<&str>, home: Option<&Path>) -> PathBuf {
    let dot = configured
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_DOT);
    match (dot.strip_prefix("~/"), home) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(dot),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extra::instance_generators::parse_genotype;
    use std::io::Write;

    #[test]
    fn partial_json_keeps_defaults() {
        let config = SearchConfig::from_json(
            r#"{"success_probability": 0.9, "constraints": [{"MaxGenerations": 3}], "runtime_limit": 1.5}"#,
        )
        .unwrap();
        assert_eq!(config.success_probability, 0.9);
        assert_eq!(config.constraints, vec![Constraint::MaxGenerations(3)]);
        assert_eq!(config.runtime_limit(), Some(Duration::from_millis(1500)));
        assert_eq!(config.workers, 1);
        assert!(!config.heuristics.optimal_subschemes);
        assert!(SearchConfig::from_json(r#"{"succes_probability": 0.9}"#).is_err());
    }

    #[test]
    fn options_follow_the_switches() {
        let config = SearchConfig {
            constraints: vec![Constraint::MaxGenerations(4), Constraint::MaxCrossings(6)],
            seeds_per_crossing: Some(20),
            remove_duplicate_plants: true,
            heuristics: HeuristicConfig {
                optimal_subschemes: true,
                improvement_over_ancestors: true,
                heuristic_seed_lots: Some(HeuristicSeedLotConfig {
                    max_crossovers: Some(1),
                    consistent: true,
                }),
                min_probability: Some(0.01),
            },
            ..SearchConfig::default()
        };
        let round_tripped = SearchConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_tripped, config);

        let ideotype = parse_genotype("11/11").unwrap();
        let options = config
            .build_options(&ideotype, &GeneticMap::unlinked(&[2]))
            .unwrap();
        assert_eq!(options.constraints.max_generations(), Some(4));
        assert_eq!(options.seeds_per_crossing, Some(20));
        assert_eq!(options.heuristics.len(), 2);
        assert_eq!(options.seed_lot_filters.len(), 1);
        assert!(options.initial_plant_filter.is_some());
        assert!(options.seed_lot_constructor.is_some());
        assert!(options.intermediate_output.is_none());
    }

    #[test]
    fn duplicate_constraints_are_rejected() {
        let config = SearchConfig {
            constraints: vec![Constraint::MaxGenerations(4), Constraint::MaxGenerations(5)],
            ..SearchConfig::default()
        };
        let err = config
            .build_options(&parse_genotype("1/1").unwrap(), &GeneticMap::unlinked(&[1]))
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InputConstraint);
    }

    #[test]
    fn dot_path_resolution() {
        let home = Path::new("/home/breeder");
        assert_eq!(resolve_dot(None, Some(home)), PathBuf::from("dot"));
        assert_eq!(resolve_dot(Some("  "), Some(home)), PathBuf::from("dot"));
        assert_eq!(
            resolve_dot(Some("~/graphviz/bin/dot"), Some(home)),
            PathBuf::from("/home/breeder/graphviz/bin/dot")
        );
        assert_eq!(
            resolve_dot(Some("~/dot"), None),
            PathBuf::from("~/dot")
        );
        assert_eq!(
            resolve_dot(Some("/usr/bin/dot"), Some(home)),
            PathBuf::from("/usr/bin/dot")
        );
    }

    #[test]
    fn settings_file_uses_dotted_key() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dot.path": "/opt/graphviz/dot"}}"#).unwrap();
        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.dot_path.as_deref(), Some("/opt/graphviz/dot"));
        assert_eq!(settings.dot_executable(), PathBuf::from("/opt/graphviz/dot"));

        let missing = Settings::from_file(Path::new("/nonexistent/gene_stacker.json"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }
}
