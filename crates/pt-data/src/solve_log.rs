use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use pt_types::TuneResult;
use tracing::info;

use crate::instances::instance_stem;

/// Persist a solver's raw output for an instance it solved.
///
/// Only used in solving mode, where the output carries the solution.
pub fn write_solver_log(dir: &Path, solver: &Path, instance: &Path, output: &str) -> TuneResult<PathBuf> {
    let solver_name = solver
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "solver".to_string());
    let stamp = Local::now().format("%d-%m-%Y_%H-%M-%S");
    let path = dir.join(format!("log_{}_{}_{}", solver_name, instance_stem(instance), stamp));

    info!("Writing solver log to file {}", path.display());
    fs::write(&path, output)?;
    Ok(path)
}
