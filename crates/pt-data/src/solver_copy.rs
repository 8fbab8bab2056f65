use std::fs;
use std::path::{Path, PathBuf};

use pt_types::{config_error, TuneResult};
use rand::Rng;
use tracing::{info, warn};

const SUFFIX_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const SUFFIX_LEN: usize = 10;

/// Private copy of the solver binary, removed when dropped.
///
/// Runs are killed forcibly on cancellation; they only ever touch this copy,
/// never the canonical binary.
#[derive(Debug)]
pub struct SolverCopy {
    path: PathBuf,
}

impl SolverCopy {
    pub fn create<P: AsRef<Path>>(original: P) -> TuneResult<Self> {
        let original = original.as_ref();
        if !original.is_file() {
            return Err(config_error!("Solver binary {} not found", original.display()));
        }
        let mut rng = rand::rng();
        let suffix: String = (0..SUFFIX_LEN)
            .map(|_| SUFFIX_CHARSET[rng.random_range(0..SUFFIX_CHARSET.len())] as char)
            .collect();

        let path = copy_path(original, &suffix);
        info!("Creating solver copy {}", path.display());
        fs::copy(original, &path)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Sibling of `original` named `<name>_<suffix>`. A bare file name gets a
/// `./` parent so the copy is spawned from the working directory and not
/// looked up on `PATH`.
fn copy_path(original: &Path, suffix: &str) -> PathBuf {
    let name = original
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "solver".to_string());
    let dir = original
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    dir.join(format!("{name}_{suffix}"))
}

impl Drop for SolverCopy {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove solver copy {}: {}", self.path.display(), e);
        }
    }
}
