//! Search configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use pt_types::{SearchError, TuneResult};

/// Whether the run estimates a better configuration or just wants one solution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SearchMode {
    /// Keep improving the record until a point or time budget runs out.
    #[default]
    Estimating,
    /// Stop at the first point that verifies the benchmark set.
    Solving,
}

/// Top-level configuration for a search run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Number of evaluations running in parallel.
    pub concurrency: usize,

    /// Maximum number of points to process (the default point included).
    pub max_points: usize,

    /// Wall-clock budget for the whole run.
    pub max_duration: Option<Duration>,

    /// Known aggregate score of the default point. Must come with
    /// `solver_time_limit`; the default point is then not re-evaluated.
    pub default_score: Option<f64>,

    /// Program-side time limit in seconds used until a record exists.
    pub solver_time_limit: Option<f64>,

    pub mode: SearchMode,

    /// Seed for the candidate generator.
    pub seed: u64,

    /// Per-parameter mutation probability; `None` means `1/num_parameters`.
    pub mutation_rate: Option<f64>,

    /// A verified result replaces the record only if `score * ratio < best`.
    pub min_improvement_ratio: f64,

    /// Fraction of instances that must be verified for a point to count as solved.
    pub required_verified_fraction: f64,

    /// Unverified instances cost `penalty_factor` times the time limit.
    pub penalty_factor: f64,

    /// Time allowed for killed processes to be torn down before the run returns.
    pub settle_delay: Duration,

    /// Consecutive rejected candidates after which the space counts as exhausted.
    pub max_generation_attempts: usize,

    /// Where raw solver output is written in solving mode.
    pub solve_log_dir: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            max_points: 1000,
            max_duration: None,
            default_score: None,
            solver_time_limit: None,
            mode: SearchMode::Estimating,
            seed: chrono::Utc::now().timestamp_millis() as u64,
            mutation_rate: None,
            min_improvement_ratio: 1.005,
            required_verified_fraction: 1.0,
            penalty_factor: 10.0,
            settle_delay: Duration::from_secs(1),
            max_generation_attempts: 10_000,
            solve_log_dir: None,
        }
    }
}

impl SearchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n;
        self
    }

    pub fn with_max_points(mut self, n: usize) -> Self {
        self.max_points = n;
        self
    }

    pub fn with_max_duration(mut self, d: Duration) -> Self {
        self.max_duration = Some(d);
        self
    }

    pub fn with_default_score(mut self, score: f64, solver_time_limit: f64) -> Self {
        self.default_score = Some(score);
        self.solver_time_limit = Some(solver_time_limit);
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_mutation_rate(mut self, rate: f64) -> Self {
        self.mutation_rate = Some(rate);
        self
    }

    pub fn with_min_improvement_ratio(mut self, ratio: f64) -> Self {
        self.min_improvement_ratio = ratio;
        self
    }

    pub fn with_required_verified_fraction(mut self, fraction: f64) -> Self {
        self.required_verified_fraction = fraction;
        self
    }

    pub fn with_settle_delay(mut self, d: Duration) -> Self {
        self.settle_delay = d;
        self
    }

    pub fn with_solve_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.solve_log_dir = Some(dir.into());
        self
    }

    pub fn is_solving(&self) -> bool {
        self.mode == SearchMode::Solving
    }

    /// Reject inconsistent settings before any search starts.
    pub fn validate(&self) -> TuneResult<()> {
        let invalid = |message: &str| -> TuneResult<()> {
            Err(SearchError::InvalidConfig {
                message: message.to_string(),
            }
            .into())
        };

        if self.concurrency == 0 {
            return invalid("concurrency must be at least 1");
        }
        if self.max_points == 0 {
            return invalid("max_points must be at least 1");
        }
        match (self.default_score, self.solver_time_limit) {
            (Some(score), Some(limit)) if score > 0.0 && limit > 0.0 => {}
            (None, None) => {}
            (None, Some(limit)) if limit > 0.0 => {}
            _ => {
                return invalid(
                    "default_score requires a positive solver_time_limit and must itself be positive",
                )
            }
        }
        if let Some(rate) = self.mutation_rate {
            if !(rate > 0.0 && rate <= 1.0) {
                return invalid("mutation_rate must be in (0, 1]");
            }
        }
        if !(self.min_improvement_ratio >= 1.0) {
            return invalid("min_improvement_ratio must be at least 1");
        }
        if !(self.required_verified_fraction > 0.0 && self.required_verified_fraction <= 1.0) {
            return invalid("required_verified_fraction must be in (0, 1]");
        }
        if !(self.penalty_factor >= 1.0) {
            return invalid("penalty_factor must be at least 1");
        }
        if self.max_generation_attempts == 0 {
            return invalid("max_generation_attempts must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SearchConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.max_points, 1000);
        assert_eq!(config.min_improvement_ratio, 1.005);
        assert!(!config.is_solving());
    }

    #[test]
    fn builder_chain() {
        let config = SearchConfig::new()
            .with_concurrency(4)
            .with_max_points(50)
            .with_default_score(120.0, 30.0)
            .with_mode(SearchMode::Solving)
            .with_seed(7);
        assert!(config.validate().is_ok());
        assert!(config.is_solving());
        assert_eq!(config.default_score, Some(120.0));
    }

    #[test]
    fn rejects_invalid_settings() {
        assert!(SearchConfig::new().with_concurrency(0).validate().is_err());
        assert!(SearchConfig::new().with_max_points(0).validate().is_err());
        assert!(SearchConfig::new().with_mutation_rate(0.0).validate().is_err());
        assert!(SearchConfig::new()
            .with_min_improvement_ratio(0.9)
            .validate()
            .is_err());

        let mut score_without_limit = SearchConfig::new();
        score_without_limit.default_score = Some(10.0);
        assert!(score_without_limit.validate().is_err());
    }

    #[test]
    fn time_limit_alone_is_allowed() {
        let mut config = SearchConfig::new();
        config.solver_time_limit = Some(60.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn deserializes_partial_json() {
        let config: SearchConfig =
            serde_json::from_str(r#"{"concurrency": 8, "mode": "Solving"}"#).unwrap();
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.mode, SearchMode::Solving);
        assert_eq!(config.max_points, 1000);
    }
}
