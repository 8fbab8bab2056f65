//! Running the external program on one instance, and killing it on demand.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::watch;

use pt_types::{ProtocolError, TuneResult};

use crate::protocol::SolverProtocol;

/// Broadcasts the termination of a run to every worker.
///
/// The external program has no cancellation API, so firing the switch makes
/// each worker drop its running child process, which kills it (SIGKILL).
#[derive(Debug)]
pub struct KillSwitch {
    tx: watch::Sender<bool>,
}

/// Worker-side handle of a [`KillSwitch`].
#[derive(Debug, Clone)]
pub struct KillSignal {
    rx: watch::Receiver<bool>,
}

impl KillSwitch {
    pub fn channel() -> (Self, KillSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, KillSignal { rx })
    }

    pub fn fire(&self) {
        self.tx.send_replace(true);
    }
}

impl KillSignal {
    pub fn is_fired(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the switch has been fired, or its owner is gone.
    pub async fn fired(&mut self) {
        // an Err means the switch was dropped, which also ends the run
        let _ = self.rx.wait_for(|fired| *fired).await;
    }
}

/// One run of the program: a point's arguments on one instance.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub args: Vec<String>,
    pub instance: PathBuf,
    /// Program-side limit in seconds; `None` runs unbounded.
    pub timeout: Option<f64>,
}

/// Outcome of one completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutput {
    pub runtime: f64,
    pub solved: bool,
    pub raw: String,
}

/// Executes single runs. Implementations must stop their work when the
/// returned future is dropped.
#[async_trait]
pub trait InstanceRunner: Send + Sync {
    async fn run(&self, request: &RunRequest) -> TuneResult<RunOutput>;

    /// Human-readable invocation, used in logs and as the record's command.
    fn describe(&self, request: &RunRequest) -> String;

    /// Program path, used to name solving-mode logs.
    fn program(&self) -> &Path;
}

/// Spawns the external program as a child process per run.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    protocol: SolverProtocol,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>, protocol: SolverProtocol) -> Self {
        Self {
            program: program.into(),
            protocol,
        }
    }

    fn full_args(&self, request: &RunRequest) -> Vec<String> {
        let mut args = Vec::with_capacity(request.args.len() + 2);
        if let Some(limit) = request.timeout {
            args.push(self.protocol.timeout_arg(limit));
        }
        args.extend(request.args.iter().cloned());
        args.push(request.instance.display().to_string());
        args
    }
}

#[async_trait]
impl InstanceRunner for ProcessRunner {
    async fn run(&self, request: &RunRequest) -> TuneResult<RunOutput> {
        let output = Command::new(&self.program)
            .args(self.full_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ProtocolError::SpawnFailed {
                program: self.program.display().to_string(),
                message: e.to_string(),
            })?;

        let raw = String::from_utf8_lossy(&output.stdout).into_owned();
        let report = self.protocol.parse(
            &raw,
            &request.instance.display().to_string(),
            &self.describe(request),
        )?;
        Ok(RunOutput {
            runtime: report.runtime,
            solved: report.solved,
            raw,
        })
    }

    fn describe(&self, request: &RunRequest) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.full_args(request));
        parts.join(" ")
    }

    fn program(&self) -> &Path {
        &self.program
    }
}
