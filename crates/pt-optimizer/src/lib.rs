//! # pt-optimizer
//!
//! Parameter search and evaluation scheduling for ParamTune.
//!
//! Provides the constraint validator, the distance-weighted neighbor
//! generator, the PAR10 objective evaluator over an external program, and the
//! bounded-concurrency scheduler that drives the search record toward better
//! configurations.

mod config;
mod constraints;
mod evaluator;
mod mutation;
mod protocol;
mod record;
mod runner;
mod scheduler;
mod seeds;

pub use config::{SearchConfig, SearchMode};
pub use constraints::{ConstraintTable, ConstraintValidator, DependencyRule};
pub use evaluator::{EvalOutcome, Evaluation, Evaluator};
pub use mutation::{neighbor_weights, weighted_neighbor, GenerationStats, NeighborGenerator};
pub use protocol::{RunReport, SolverProtocol};
pub use record::SearchRecord;
pub use runner::{InstanceRunner, KillSignal, KillSwitch, ProcessRunner, RunOutput, RunRequest};
pub use scheduler::{SearchOutcome, SearchScheduler, TerminationReason};
pub use seeds::AuxiliarySeed;
