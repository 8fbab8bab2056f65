//! Loader and writer for the line-oriented PCS parameter format.
//!
//! Each non-empty line declares one parameter: `name {v1, v2, ...}[default]`.
//! Lines starting with `#` are comments.

use std::fs;
use std::path::{Path, PathBuf};

use pt_types::{DomainError, ParamValue, Parameter, ParameterSpace, Point, TuneResult};
use tracing::info;

/// Reads PCS files into a validated [`ParameterSpace`].
#[derive(Debug, Default, Clone)]
pub struct PcsLoader;

impl PcsLoader {
    pub fn new() -> Self {
        Self
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> TuneResult<ParameterSpace> {
        let path = path.as_ref();
        info!("Loading parameters from: {}", path.display());
        let content = fs::read_to_string(path)?;
        let space = self.parse(&content)?;
        info!("{} parameters loaded", space.len());
        Ok(space)
    }

    pub fn parse(&self, content: &str) -> TuneResult<ParameterSpace> {
        let mut parameters = Vec::new();
        for (i, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            parameters.push(Self::parse_line(line, i + 1)?);
        }
        Ok(ParameterSpace::new(parameters)?)
    }

    fn parse_line(line: &str, line_no: usize) -> Result<Parameter, DomainError> {
        let malformed = |message: &str| DomainError::MalformedLine {
            line: line_no,
            message: message.to_string(),
        };

        let open = line.find('{').ok_or_else(|| malformed("missing '{'"))?;
        let close = line[open..]
            .find('}')
            .map(|i| open + i)
            .ok_or_else(|| malformed("missing '}'"))?;
        let def_open = line[close..]
            .find('[')
            .map(|i| close + i)
            .ok_or_else(|| malformed("missing '[' before default value"))?;
        let def_close = line[def_open..]
            .find(']')
            .map(|i| def_open + i)
            .ok_or_else(|| malformed("missing ']' after default value"))?;

        let name = line[..open].trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(malformed("expected a single parameter name"));
        }

        let domain = line[open + 1..close]
            .split(',')
            .map(|v| v.parse::<ParamValue>().map_err(|e| malformed(&e)))
            .collect::<Result<Vec<_>, _>>()?;
        let default = line[def_open + 1..def_close]
            .parse::<ParamValue>()
            .map_err(|e| malformed(&e))?;

        Parameter::new(name, domain, default)
    }
}

/// Render `point` as PCS text, using its values as the defaults.
pub fn render_pcs(space: &ParameterSpace, point: &Point) -> String {
    let mut out = String::new();
    for (param, value) in space.parameters().iter().zip(point.values()) {
        let domain: Vec<String> = param.domain.iter().map(ToString::to_string).collect();
        out.push_str(&format!("{} {{{}}}[{}]\n", param.name, domain.join(", "), value));
    }
    out
}

/// Write the configuration `point` back in PCS format.
pub fn write_pcs<P: AsRef<Path>>(path: P, space: &ParameterSpace, point: &Point) -> TuneResult<()> {
    space.validate_point(point)?;
    info!("Writing configuration to file {}", path.as_ref().display());
    fs::write(path, render_pcs(space, point))?;
    Ok(())
}

/// `dir/name.pcs` → `dir/name_upd.pcs`.
pub fn updated_pcs_path(pcs_path: &Path) -> PathBuf {
    let stem = pcs_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "params".to_string());
    pcs_path.with_file_name(format!("{stem}_upd.pcs"))
}

/// Parameters whose defaults differ between two spaces: `(name, before, after)`.
///
/// Parameters missing from `after` are ignored.
pub fn diff_defaults(before: &ParameterSpace, after: &ParameterSpace) -> Vec<(String, ParamValue, ParamValue)> {
    before
        .parameters()
        .iter()
        .filter_map(|p| {
            let other = after.get(after.index_of(&p.name)?)?;
            (other.default != p.default).then(|| (p.name.clone(), p.default, other.default))
        })
        .collect()
}
