//! Seed-point files and the generated-points dump.

use std::fs;
use std::path::{Path, PathBuf};

use pt_types::{DomainError, ParamValue, ParameterSpace, Point, TuneResult};
use tracing::info;

/// Read pre-defined points, one per line, as `--name=value` overrides of `base`.
///
/// Every point is validated against the domain before it is returned.
pub fn read_seed_points<P: AsRef<Path>>(
    path: P,
    space: &ParameterSpace,
    base: &Point,
) -> TuneResult<Vec<Point>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let points = parse_seed_points(&content, space, base)?;
    info!("{} points read from {}", points.len(), path.display());
    Ok(points)
}

pub fn parse_seed_points(content: &str, space: &ParameterSpace, base: &Point) -> TuneResult<Vec<Point>> {
    let mut points = Vec::new();
    for (i, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let overrides = line
            .split_whitespace()
            .map(|word| parse_assignment(word, i + 1))
            .collect::<Result<Vec<_>, _>>()?;
        let point = space.with_overrides(
            base,
            overrides.iter().map(|(name, value)| (name.as_str(), *value)),
        )?;
        points.push(point);
    }
    Ok(points)
}

fn parse_assignment(word: &str, line: usize) -> Result<(String, ParamValue), DomainError> {
    let malformed = |message: String| DomainError::MalformedLine { line, message };
    let body = word
        .strip_prefix("--")
        .ok_or_else(|| malformed(format!("expected --name=value, got '{word}'")))?;
    let (name, value) = body
        .split_once('=')
        .ok_or_else(|| malformed(format!("expected --name=value, got '{word}'")))?;
    let value = value.parse::<ParamValue>().map_err(malformed)?;
    Ok((name.to_string(), value))
}

/// Result file for the generated points of a run over `label`.
pub fn generated_points_path(dir: &Path, label: &str) -> PathBuf {
    dir.join(format!("generated_{label}"))
}

/// Write one canonical point key per line.
pub fn write_generated_points<P, I, S>(path: P, keys: I) -> TuneResult<usize>
where
    P: AsRef<Path>,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out = String::new();
    let mut count = 0;
    for key in keys {
        out.push_str(key.as_ref());
        out.push('\n');
        count += 1;
    }
    info!("Writing {} generated points to file {}", count, path.as_ref().display());
    fs::write(path, out)?;
    Ok(count)
}
