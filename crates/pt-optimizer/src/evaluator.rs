//! Objective evaluation: PAR10-style penalized runtime of one point.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use pt_data::{write_solver_log, BenchmarkSet};
use pt_types::{ParameterSpace, Point, TuneResult};

use crate::runner::{InstanceRunner, KillSignal, RunRequest};

/// Score and bookkeeping of one evaluated point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub point: Point,
    /// Penalized runtime sum. A lower bound when `aborted` is set.
    pub score: f64,
    /// Slowest verified instance, if any instance was verified.
    pub max_instance_time: Option<f64>,
    /// Every instance ran and was verified.
    pub all_verified: bool,
    pub verified_instances: usize,
    pub instances_run: usize,
    pub total_instances: usize,
    /// Remaining instances were skipped because the score already lost.
    pub aborted: bool,
    /// Last invocation, for reproducing the result by hand.
    pub command: String,
}

impl Evaluation {
    /// Fraction of the benchmark set verified; 0 for aborted evaluations.
    pub fn verified_fraction(&self) -> f64 {
        if self.aborted || self.total_instances == 0 {
            return 0.0;
        }
        self.verified_instances as f64 / self.total_instances as f64
    }

    /// Ran to completion and verified at least `required_fraction` of the set.
    pub fn verifies(&self, required_fraction: f64) -> bool {
        !self.aborted && self.verified_fraction() >= required_fraction
    }
}

/// Result of [`Evaluator::evaluate`].
#[derive(Debug, Clone, PartialEq)]
pub enum EvalOutcome {
    Completed(Evaluation),
    /// The kill switch fired while the point was being evaluated.
    Cancelled,
}

/// Runs the program on every benchmark instance for a point and aggregates
/// the penalized runtime.
pub struct Evaluator {
    space: ParameterSpace,
    instances: BenchmarkSet,
    runner: Arc<dyn InstanceRunner>,
    penalty_factor: f64,
    solve_log_dir: Option<PathBuf>,
}

impl Evaluator {
    pub fn new(space: ParameterSpace, instances: BenchmarkSet, runner: Arc<dyn InstanceRunner>) -> Self {
        Self {
            space,
            instances,
            runner,
            penalty_factor: 10.0,
            solve_log_dir: None,
        }
    }

    pub fn with_penalty_factor(mut self, factor: f64) -> Self {
        self.penalty_factor = factor;
        self
    }

    /// Persist raw output of every verified instance (solving mode).
    pub fn with_solve_log_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.solve_log_dir = dir;
        self
    }

    pub fn instances(&self) -> &BenchmarkSet {
        &self.instances
    }

    /// The bare program on the first instance, standing in for the default
    /// point's command when its score is supplied rather than measured.
    pub fn plain_command(&self) -> String {
        format!(
            "{} {}",
            self.runner.program().display(),
            self.instances.instances()[0].display()
        )
    }

    fn request(&self, point: &Point, instance: usize, limit: Option<f64>) -> RunRequest {
        RunRequest {
            args: self.space.to_args(point),
            instance: self.instances.instances()[instance].clone(),
            timeout: limit,
        }
    }

    /// Evaluate `point` under time limit `limit`.
    ///
    /// Each verified instance costs its runtime; any other costs
    /// `penalty_factor × limit` (or × its own runtime when unbounded).
    /// Once the partial sum exceeds `beat`, the remaining instances are
    /// skipped.
    pub async fn evaluate(
        &self,
        point: &Point,
        limit: Option<f64>,
        beat: Option<f64>,
        mut signal: KillSignal,
    ) -> TuneResult<EvalOutcome> {
        let total = self.instances.len();
        let mut score = 0.0;
        let mut max_instance_time: Option<f64> = None;
        let mut verified_instances = 0;
        let mut instances_run = 0;
        let mut command = String::new();

        for i in 0..total {
            if signal.is_fired() {
                return Ok(EvalOutcome::Cancelled);
            }

            let request = self.request(point, i, limit);
            command = self.runner.describe(&request);
            let output = tokio::select! {
                biased;
                _ = signal.fired() => return Ok(EvalOutcome::Cancelled),
                output = self.runner.run(&request) => output?,
            };
            instances_run += 1;

            let in_time = limit.map_or(true, |l| output.runtime < l);
            if output.solved && in_time {
                score += output.runtime;
                verified_instances += 1;
                max_instance_time = Some(max_instance_time.map_or(output.runtime, |m| m.max(output.runtime)));
                debug!("Time : {} on {}", output.runtime, request.instance.display());
                if let Some(dir) = &self.solve_log_dir {
                    write_solver_log(dir, self.runner.program(), &request.instance, &output.raw)?;
                }
            } else {
                score += self.penalty_factor * limit.unwrap_or(output.runtime);
            }

            if let Some(threshold) = beat {
                if score > threshold && instances_run < total {
                    debug!(
                        "Partial score {} exceeds {} after {} of {} instances, aborting",
                        score, threshold, instances_run, total
                    );
                    return Ok(EvalOutcome::Completed(Evaluation {
                        point: point.clone(),
                        score,
                        max_instance_time,
                        all_verified: false,
                        verified_instances,
                        instances_run,
                        total_instances: total,
                        aborted: true,
                        command,
                    }));
                }
            }
        }

        Ok(EvalOutcome::Completed(Evaluation {
            point: point.clone(),
            score,
            max_instance_time,
            all_verified: verified_instances == total,
            verified_instances,
            instances_run,
            total_instances: total,
            aborted: false,
            command,
        }))
    }
}
