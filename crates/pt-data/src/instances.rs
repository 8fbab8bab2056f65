use std::fs;
use std::path::{Path, PathBuf};

use pt_types::{validation_error, SearchError, TuneResult};
use tracing::info;

/// Benchmark instances every point is evaluated on.
///
/// Instance files are only ever read, so one set is shared by all workers.
#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkSet {
    instances: Vec<PathBuf>,
}

impl BenchmarkSet {
    pub fn new(instances: Vec<PathBuf>) -> TuneResult<Self> {
        if instances.is_empty() {
            return Err(SearchError::NoInstances.into());
        }
        Ok(Self { instances })
    }

    /// Collect every `*.{extension}` file of `dir`, sorted by path.
    pub fn from_dir<P: AsRef<Path>>(dir: P, extension: &str) -> TuneResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(validation_error!("Instance directory {} does not exist", dir.display()));
        }
        let mut instances: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().map(|x| x == extension).unwrap_or(false))
            .collect();
        instances.sort();

        info!("{} instances found in {}", instances.len(), dir.display());
        for instance in &instances {
            info!("  {}", instance.display());
        }
        Self::new(instances)
    }

    pub fn instances(&self) -> &[PathBuf] {
        &self.instances
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Instance file stems joined by `_`, used to name result files.
    pub fn label(&self) -> String {
        self.instances
            .iter()
            .map(|p| instance_stem(p))
            .collect::<Vec<_>>()
            .join("_")
    }
}

pub fn instance_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
