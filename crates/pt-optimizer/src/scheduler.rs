//! The evaluate-update loop.
//!
//! A single coordinator owns the [`SearchRecord`] and the candidate generator.
//! Workers only evaluate points and send their [`Evaluation`] back through the
//! join set, so results are applied one at a time in completion order.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use pt_types::{internal_error, ParameterSpace, Point, PointKey, TuneResult};

use crate::config::SearchConfig;
use crate::constraints::ConstraintValidator;
use crate::evaluator::{EvalOutcome, Evaluation, Evaluator};
use crate::mutation::{GenerationStats, NeighborGenerator};
use crate::record::SearchRecord;
use crate::runner::{KillSignal, KillSwitch};
use crate::seeds::AuxiliarySeed;

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    PointBudget,
    TimeBudget,
    /// Solving mode found a point that verifies the benchmark set.
    Solved,
    /// No new admissible point could be generated and nothing was in flight.
    Exhausted,
}

/// Final state of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub run_id: Uuid,
    pub default_point: Point,
    pub record: SearchRecord,
    /// Points evaluated, plus the default point when its score was supplied.
    pub processed: usize,
    pub stats: GenerationStats,
    /// Keys of every point generated during the run, sorted.
    pub generated: Vec<PointKey>,
    pub reason: TerminationReason,
    pub elapsed: Duration,
}

type WorkerResult = TuneResult<EvalOutcome>;

pub struct SearchScheduler {
    config: SearchConfig,
    space: ParameterSpace,
    evaluator: Arc<Evaluator>,
    generator: NeighborGenerator,
    seeds: Vec<AuxiliarySeed>,
    seed_points: Vec<Point>,
}

impl SearchScheduler {
    pub fn new(
        config: SearchConfig,
        space: ParameterSpace,
        validator: ConstraintValidator,
        evaluator: Evaluator,
    ) -> TuneResult<Self> {
        config.validate()?;

        let mut generator = NeighborGenerator::new(space.clone(), validator, config.seed)
            .with_max_attempts(config.max_generation_attempts);
        if let Some(rate) = config.mutation_rate {
            generator = generator.with_mutation_rate(rate);
        }

        let solve_log_dir = if config.is_solving() {
            config.solve_log_dir.clone()
        } else {
            None
        };
        let evaluator = evaluator
            .with_penalty_factor(config.penalty_factor)
            .with_solve_log_dir(solve_log_dir);

        Ok(Self {
            config,
            space,
            evaluator: Arc::new(evaluator),
            generator,
            seeds: Vec::new(),
            seed_points: Vec::new(),
        })
    }

    pub fn with_seeds(mut self, seeds: Vec<AuxiliarySeed>) -> Self {
        self.seeds = seeds;
        self
    }

    /// Extra starting points, e.g. read from a seed-point file.
    pub fn with_seed_points(mut self, points: Vec<Point>) -> Self {
        self.seed_points = points;
        self
    }

    /// Run the search until a budget runs out, solving mode succeeds or the
    /// space is exhausted. Protocol errors from any worker abort the run after
    /// all running processes have been killed.
    pub async fn run(mut self) -> TuneResult<SearchOutcome> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let deadline = self.config.max_duration.map(|d| started + d);
        let default_point = self.space.default_point();

        info!(
            "Starting search {}: {} parameters, {} instances, concurrency {}, budget {} points, mode {:?}",
            run_id,
            self.space.len(),
            self.evaluator.instances().len(),
            self.config.concurrency,
            self.config.max_points,
            self.config.mode
        );

        let (mut record, mut processed) = match self.config.default_score {
            Some(score) => {
                let limit = self.config.solver_time_limit.unwrap_or(score);
                info!("Default point score supplied: {}", score);
                let command = self.evaluator.plain_command();
                (SearchRecord::with_known_score(default_point.clone(), score, limit, command), 1)
            }
            None => (SearchRecord::unscored(default_point.clone()), 0),
        };

        let initial = self.initial_batch(&default_point, processed)?;
        let (switch, signal) = KillSwitch::channel();
        let mut workers: JoinSet<WorkerResult> = JoinSet::new();
        for point in initial {
            self.dispatch(&mut workers, point, &record, &signal);
        }

        let result = if processed >= self.config.max_points {
            Ok(TerminationReason::PointBudget)
        } else {
            self.collect(&mut workers, &signal, &mut record, &mut processed, started, deadline)
                .await
        };

        Self::drain(&switch, &mut workers, self.config.settle_delay).await;
        let reason = result?;

        let elapsed = started.elapsed();
        info!(
            "Search {} finished ({:?}) after {} points in {:.1}s",
            run_id,
            reason,
            processed,
            elapsed.as_secs_f64()
        );
        match record.best_score {
            Some(score) => info!("Best score {} : {}", score, record.best_command),
            None => warn!("No point verified the benchmark set"),
        }
        info!("{}", self.space.describe_diff(&default_point, &record.best_point));

        let mut generated: Vec<PointKey> = self.generator.generated_keys().cloned().collect();
        generated.sort();

        Ok(SearchOutcome {
            run_id,
            default_point,
            record,
            processed,
            stats: self.generator.stats(),
            generated,
            reason,
            elapsed,
        })
    }

    /// Default point (unless already scored), auxiliary seeds, seed-file
    /// points, then generated neighbors, capped at the concurrency width and
    /// the remaining point budget.
    fn initial_batch(&mut self, default_point: &Point, processed: usize) -> TuneResult<Vec<Point>> {
        let cap = self
            .config
            .concurrency
            .min(self.config.max_points.saturating_sub(processed));
        let mut batch = Vec::with_capacity(cap);

        self.generator.mark_generated(default_point);
        if processed == 0 && cap > 0 {
            batch.push(default_point.clone());
        }

        let mut candidates = Vec::new();
        for seed in &self.seeds {
            if let Some(point) = seed.resolve(&self.space, default_point)? {
                candidates.push(point);
            }
        }
        for point in &self.seed_points {
            self.space.validate_point(point)?;
            candidates.push(point.clone());
        }
        for point in candidates {
            if batch.len() >= cap {
                break;
            }
            if self.generator.mark_generated(&point) {
                batch.push(point);
            } else {
                debug!("Seed point {} already queued", point.key());
            }
        }

        if batch.len() < cap {
            let missing = cap - batch.len();
            batch.extend(self.generator.generate(default_point, missing));
        }
        debug!("Initial batch of {} points", batch.len());
        Ok(batch)
    }

    fn dispatch(
        &self,
        workers: &mut JoinSet<WorkerResult>,
        point: Point,
        record: &SearchRecord,
        signal: &KillSignal,
    ) {
        let evaluator = Arc::clone(&self.evaluator);
        let limit = record.time_limit(self.config.solver_time_limit);
        let beat = record.beat_threshold();
        let signal = signal.clone();
        debug!("Dispatching {} (limit {:?})", point, limit);
        workers.spawn(async move { evaluator.evaluate(&point, limit, beat, signal).await });
    }

    async fn collect(
        &mut self,
        workers: &mut JoinSet<WorkerResult>,
        signal: &KillSignal,
        record: &mut SearchRecord,
        processed: &mut usize,
        started: Instant,
        deadline: Option<Instant>,
    ) -> TuneResult<TerminationReason> {
        let width = self.config.concurrency;
        let max_points = self.config.max_points;

        loop {
            let joined = match deadline {
                Some(deadline) => tokio::select! {
                    joined = workers.join_next() => joined,
                    _ = tokio::time::sleep_until(deadline) => return Ok(TerminationReason::TimeBudget),
                },
                None => workers.join_next().await,
            };
            let Some(joined) = joined else {
                return Ok(TerminationReason::Exhausted);
            };
            let outcome = joined.map_err(|e| internal_error!("Evaluation worker failed: {}", e))??;
            let EvalOutcome::Completed(eval) = outcome else {
                continue;
            };

            *processed += 1;
            self.apply(record, &eval, started);
            if self.config.is_solving() && eval.verifies(self.config.required_verified_fraction) {
                info!("Solved by {} : {}", eval.point, eval.command);
                return Ok(TerminationReason::Solved);
            }
            if *processed >= max_points {
                return Ok(TerminationReason::PointBudget);
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return Ok(TerminationReason::TimeBudget);
            }

            while workers.len() < width && *processed + workers.len() < max_points {
                let Some(point) = self.generator.generate(&record.best_point, 1).pop() else {
                    break;
                };
                self.dispatch(workers, point, record, signal);
            }
        }
    }

    fn apply(&self, record: &mut SearchRecord, eval: &Evaluation, started: Instant) {
        let improved = record.update(
            eval,
            self.config.min_improvement_ratio,
            self.config.required_verified_fraction,
        );
        if improved {
            info!(
                "New record {} at {:.1}s ({} of {} verified, slowest {:?}) : {}",
                eval.score,
                started.elapsed().as_secs_f64(),
                eval.verified_instances,
                eval.total_instances,
                eval.max_instance_time,
                eval.command
            );
            info!("{}", self.space.describe_diff(&self.space.default_point(), &record.best_point));
        } else if eval.aborted {
            debug!(
                "{} aborted after {} of {} instances at {}",
                eval.point, eval.instances_run, eval.total_instances, eval.score
            );
        } else {
            debug!("{} scored {}, record stays at {:?}", eval.point, eval.score, record.best_score);
        }
    }

    /// Kill everything still running and discard late results.
    async fn drain(switch: &KillSwitch, workers: &mut JoinSet<WorkerResult>, settle_delay: Duration) {
        if workers.is_empty() {
            return;
        }
        debug!("Killing {} running evaluations", workers.len());
        switch.fire();
        while workers.join_next().await.is_some() {}
        tokio::time::sleep(settle_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchMode;
    use crate::evaluator::testing::{instances, ScriptedRunner};
    use crate::runner::{InstanceRunner, RunRequest};
    use pt_types::{ParamValue, Parameter};
    use std::sync::Mutex;

    fn space(size: i64) -> ParameterSpace {
        let domain = (0..size).map(ParamValue::Int).collect();
        ParameterSpace::new(vec![Parameter::new("x", domain, ParamValue::Int(1)).unwrap()]).unwrap()
    }

    fn x_of(req: &RunRequest) -> i64 {
        req.args[0].trim_start_matches("--x=").parse().unwrap()
    }

    fn scheduler(
        config: SearchConfig,
        space: ParameterSpace,
        runner: Arc<dyn InstanceRunner>,
        names: &[&str],
    ) -> SearchScheduler {
        let validator = ConstraintValidator::permissive(&space);
        let evaluator = Evaluator::new(space.clone(), instances(names), runner);
        SearchScheduler::new(config.with_settle_delay(Duration::ZERO), space, validator, evaluator).unwrap()
    }

    #[tokio::test]
    async fn point_budget_bounds_evaluations() {
        let runtime = |x: i64| 10.0 - x as f64 * 0.5;
        let runner = Arc::new(ScriptedRunner::new(move |req| (runtime(x_of(req)), true)));
        let config = SearchConfig::new().with_max_points(5).with_seed(3);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(runner.calls(), 5);
        assert_eq!(outcome.processed, 5);
        assert_eq!(outcome.reason, TerminationReason::PointBudget);
        assert!(outcome.record.best_score.unwrap() <= runtime(1));
        assert_eq!(outcome.generated.len(), 5);
    }

    #[tokio::test]
    async fn tiny_space_terminates_as_exhausted() {
        let runner = Arc::new(ScriptedRunner::new(|req| (10.0 - x_of(req) as f64, true)));
        let mut config = SearchConfig::new().with_max_points(5).with_seed(9);
        config.max_generation_attempts = 200;

        let outcome = scheduler(config, space(4), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::Exhausted);
        assert_eq!(outcome.processed, 4);
        assert_eq!(runner.calls(), 4);
        assert_eq!(outcome.record.best_score, Some(7.0));
        assert_eq!(outcome.record.best_point.values(), &[ParamValue::Int(3)]);
    }

    #[tokio::test]
    async fn solving_mode_stops_at_first_success() {
        let runner = Arc::new(ScriptedRunner::new(|req| (1.0, x_of(req) == 3)));
        let config = SearchConfig::new()
            .with_mode(SearchMode::Solving)
            .with_concurrency(1)
            .with_max_points(100)
            .with_seed(21);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::Solved);
        assert_eq!(outcome.record.best_point.values(), &[ParamValue::Int(3)]);
        assert_eq!(outcome.record.updates, 1);
        // one point in flight at a time, so nothing runs past the solving one
        assert_eq!(runner.calls(), outcome.processed);
        assert!(outcome.processed <= 8);
    }

    #[tokio::test]
    async fn solving_mode_stops_on_verified_point_without_new_record() {
        // each instance verifies under the 2.0 limit, but the 3.0 sum loses to 2.0
        let runner = Arc::new(ScriptedRunner::new(|_| (1.5, true)));
        let config = SearchConfig::new()
            .with_mode(SearchMode::Solving)
            .with_concurrency(1)
            .with_max_points(6)
            .with_default_score(2.0, 20.0)
            .with_seed(8);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf", "b.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::Solved);
        assert_eq!(outcome.processed, 2);
        assert_eq!(runner.calls(), 2);
        assert_eq!(outcome.record.best_score, Some(2.0));
        assert_eq!(outcome.record.updates, 0);
    }

    #[tokio::test]
    async fn supplied_default_score_skips_default_evaluation() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runner = {
            let seen = seen.clone();
            Arc::new(ScriptedRunner::new(move |req| {
                let x = x_of(req);
                seen.lock().unwrap().push(x);
                (x as f64 + 1.0, true)
            }))
        };
        let config = SearchConfig::new()
            .with_max_points(3)
            .with_default_score(50.0, 20.0)
            .with_seed(5);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.processed, 3);
        assert_eq!(runner.calls(), 2);
        assert!(!seen.lock().unwrap().contains(&1));
        assert!(outcome.record.best_score.unwrap() < 50.0);
        assert!(outcome.record.max_instance_time.unwrap() <= 20.0);
    }

    #[tokio::test]
    async fn supplied_score_with_single_point_budget_runs_nothing() {
        let runner = Arc::new(ScriptedRunner::new(|_| (1.0, true)));
        let config = SearchConfig::new().with_max_points(1).with_default_score(50.0, 20.0);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::PointBudget);
        assert_eq!(runner.calls(), 0);
        assert_eq!(outcome.record.best_command, "./scripted a.cnf");
    }

    #[tokio::test]
    async fn seeds_are_evaluated_first() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let runner = {
            let seen = seen.clone();
            Arc::new(ScriptedRunner::new(move |req| {
                seen.lock().unwrap().push(x_of(req));
                (1.0, true)
            }))
        };
        let space = space(8);
        let seed = AuxiliarySeed::new("high", &[("x", ParamValue::Int(6))]);
        let absent = AuxiliarySeed::new("other", &[("y", ParamValue::Int(0))]);
        let file_point = Point::from_values(vec![ParamValue::Int(4)]);
        let config = SearchConfig::new().with_concurrency(3).with_max_points(3);

        let outcome = scheduler(config, space, runner, &["a.cnf"])
            .with_seeds(vec![seed, absent])
            .with_seed_points(vec![file_point])
            .run()
            .await
            .unwrap();

        let mut seen = seen.lock().unwrap().clone();
        seen.sort();
        assert_eq!(seen, vec![1, 4, 6]);
        assert_eq!(outcome.processed, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn time_budget_stops_waiting_for_results() {
        let runner = Arc::new(
            ScriptedRunner::new(|req| (10.0 - x_of(req) as f64, true)).with_delay(Duration::from_secs(10)),
        );
        let config = SearchConfig::new()
            .with_max_points(1000)
            .with_max_duration(Duration::from_secs(25))
            .with_seed(2);

        let outcome = scheduler(config, space(8), runner.clone(), &["a.cnf"])
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.reason, TerminationReason::TimeBudget);
        assert_eq!(outcome.processed, 2);
        assert_eq!(runner.calls(), 3);
    }

    #[test]
    fn rejects_invalid_config() {
        let space = space(4);
        let runner = Arc::new(ScriptedRunner::new(|_| (1.0, true)));
        let evaluator = Evaluator::new(space.clone(), instances(&["a.cnf"]), runner);
        let config = SearchConfig::new().with_concurrency(0);
        let result = SearchScheduler::new(config, space.clone(), ConstraintValidator::permissive(&space), evaluator);
        assert!(result.is_err());
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::protocol::SolverProtocol;
        use crate::runner::ProcessRunner;
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};

        fn script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("solver.sh");
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[tokio::test]
        async fn protocol_violation_aborts_the_run() {
            let dir = tempfile::tempdir().unwrap();
            let program = script(dir.path(), "echo 's UNSATISFIABLE'\necho 'c process-time: 1.0 seconds'");
            let runner = Arc::new(ProcessRunner::new(&program, SolverProtocol::default()));
            let config = SearchConfig::new().with_max_points(10).with_concurrency(2);

            let err = scheduler(config, space(8), runner, &["a.cnf"])
                .run()
                .await
                .unwrap_err();
            assert!(err.to_string().contains("unsatisfiable"));
        }

        #[tokio::test]
        async fn runs_real_processes() {
            let dir = tempfile::tempdir().unwrap();
            // runtime shrinks as x grows
            let program = script(
                dir.path(),
                "for a in \"$@\"; do case $a in --x=*) x=${a#--x=};; esac; done\n\
                 echo 's SATISFIABLE'\n\
                 echo \"c process-time: $((10 - x)).5 seconds\"",
            );
            let runner = Arc::new(ProcessRunner::new(&program, SolverProtocol::default()));
            let config = SearchConfig::new().with_max_points(4).with_seed(8);

            let outcome = scheduler(config, space(8), runner, &["a.cnf"])
                .run()
                .await
                .unwrap();
            assert_eq!(outcome.processed, 4);
            assert!(outcome.record.best_score.unwrap() <= 9.5);
        }
    }
}
