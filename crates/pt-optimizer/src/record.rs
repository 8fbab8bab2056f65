//! Best-point state of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use pt_types::Point;

use crate::evaluator::Evaluation;

/// The best point found so far. Owned and mutated by the scheduler only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    pub best_point: Point,
    /// `None` until some point verifies the benchmark set.
    pub best_score: Option<f64>,
    pub best_command: String,
    pub max_instance_time: Option<f64>,
    /// Number of improvements applied.
    pub updates: usize,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SearchRecord {
    /// A record without a score; the first verified result replaces it.
    pub fn unscored(default_point: Point) -> Self {
        Self {
            best_point: default_point,
            best_score: None,
            best_command: String::new(),
            max_instance_time: None,
            updates: 0,
            updated_at: None,
        }
    }

    /// A record seeded with an externally known score of the default point.
    pub fn with_known_score(default_point: Point, score: f64, time_limit: f64, command: String) -> Self {
        Self {
            best_point: default_point,
            best_score: Some(score),
            best_command: command,
            max_instance_time: Some(time_limit),
            updates: 0,
            updated_at: Some(Utc::now()),
        }
    }

    /// Per-instance time limit for the next evaluation: the best score if
    /// positive, else `fallback`.
    pub fn time_limit(&self, fallback: Option<f64>) -> Option<f64> {
        match self.best_score {
            Some(score) if score > 0.0 => Some(score),
            _ => fallback,
        }
    }

    /// Partial score above which an evaluation can no longer win.
    pub fn beat_threshold(&self) -> Option<f64> {
        self.best_score
    }

    /// Whether `eval` would replace the record.
    ///
    /// It must verify at least `required_fraction` of the instances and beat
    /// the current best by the factor `min_ratio`.
    pub fn improves(&self, eval: &Evaluation, min_ratio: f64, required_fraction: f64) -> bool {
        if !eval.verifies(required_fraction) {
            return false;
        }
        match self.best_score {
            None => true,
            Some(best) => eval.score * min_ratio < best,
        }
    }

    /// Apply `eval` if it improves the record. Returns whether it did.
    pub fn update(&mut self, eval: &Evaluation, min_ratio: f64, required_fraction: f64) -> bool {
        if !self.improves(eval, min_ratio, required_fraction) {
            return false;
        }
        self.best_point = eval.point.clone();
        self.best_score = Some(eval.score);
        self.best_command = eval.command.clone();
        if let Some(time) = eval.max_instance_time {
            self.max_instance_time = Some(self.max_instance_time.map_or(time, |m| m.min(time)));
        }
        self.updates += 1;
        self.updated_at = Some(Utc::now());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pt_types::ParamValue;

    fn point(x: i64) -> Point {
        Point::from_values(vec![ParamValue::Int(x)])
    }

    fn eval(x: i64, score: f64, max_time: f64) -> Evaluation {
        Evaluation {
            point: point(x),
            score,
            max_instance_time: Some(max_time),
            all_verified: true,
            verified_instances: 2,
            instances_run: 2,
            total_instances: 2,
            aborted: false,
            command: format!("./kissat --x={x} a.cnf"),
        }
    }

    #[test]
    fn first_verified_result_always_wins() {
        let mut record = SearchRecord::unscored(point(1));
        assert!(record.update(&eval(2, 500.0, 400.0), 1.005, 1.0));
        assert_eq!(record.best_score, Some(500.0));
        assert_eq!(record.best_point, point(2));
        assert_eq!(record.max_instance_time, Some(400.0));
        assert_eq!(record.updates, 1);
    }

    #[test]
    fn marginal_gains_are_ignored() {
        let mut record = SearchRecord::with_known_score(point(1), 100.0, 50.0, "./kissat a.cnf".into());
        // 99.9 * 1.005 > 100
        assert!(!record.update(&eval(2, 99.9, 10.0), 1.005, 1.0));
        assert!(record.update(&eval(3, 99.0, 10.0), 1.005, 1.0));
        assert_eq!(record.best_point, point(3));
        assert_eq!(record.max_instance_time, Some(10.0));
    }

    #[test]
    fn unverified_or_aborted_results_never_win() {
        let record = SearchRecord::unscored(point(1));

        let mut partial = eval(2, 1.0, 1.0);
        partial.all_verified = false;
        partial.verified_instances = 1;
        assert!(!record.improves(&partial, 1.005, 1.0));
        assert!(record.improves(&partial, 1.005, 0.5));

        let mut aborted = eval(2, 1.0, 1.0);
        aborted.aborted = true;
        assert!(!record.improves(&aborted, 1.005, 0.5));
    }

    #[test]
    fn max_instance_time_only_decreases() {
        let mut record = SearchRecord::with_known_score(point(1), 100.0, 50.0, String::new());
        record.update(&eval(2, 80.0, 70.0), 1.005, 1.0);
        assert_eq!(record.max_instance_time, Some(50.0));
        record.update(&eval(3, 60.0, 30.0), 1.005, 1.0);
        assert_eq!(record.max_instance_time, Some(30.0));
    }

    #[test]
    fn time_limit_prefers_best_score() {
        let mut record = SearchRecord::unscored(point(1));
        assert_eq!(record.time_limit(None), None);
        assert_eq!(record.time_limit(Some(5000.0)), Some(5000.0));
        record.update(&eval(2, 120.0, 70.0), 1.005, 1.0);
        assert_eq!(record.time_limit(Some(5000.0)), Some(120.0));
        assert_eq!(record.beat_threshold(), Some(120.0));
    }
}
