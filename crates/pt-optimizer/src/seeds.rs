//! Named override sets evaluated alongside the default point.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

use pt_types::{ParamValue, ParameterSpace, Point, TuneResult};

/// A known-good configuration expressed as overrides of the default point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliarySeed {
    pub name: String,
    pub overrides: BTreeMap<String, ParamValue>,
}

impl AuxiliarySeed {
    pub fn new(name: &str, overrides: &[(&str, ParamValue)]) -> Self {
        Self {
            name: name.to_string(),
            overrides: overrides
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
        }
    }

    /// kissat's satisfiable-instance and unsatisfiable-instance presets.
    pub fn kissat_presets() -> Vec<Self> {
        vec![
            Self::new(
                "sat",
                &[("target", ParamValue::Int(2)), ("restartint", ParamValue::Int(50))],
            ),
            Self::new("unsat", &[("stable", ParamValue::Int(0))]),
        ]
    }

    /// The seed applied to `base`, or `None` if one of its parameters is not
    /// part of `space`. Values outside a present parameter's domain are errors.
    pub fn resolve(&self, space: &ParameterSpace, base: &Point) -> TuneResult<Option<Point>> {
        if let Some(missing) = self.overrides.keys().find(|name| space.index_of(name).is_none()) {
            debug!("Seed '{}' skipped, parameter '{}' is not tuned", self.name, missing);
            return Ok(None);
        }
        let point = space.with_overrides(base, self.overrides.iter().map(|(k, v)| (k.as_str(), *v)))?;
        info!("Seed '{}' : {}", self.name, point);
        Ok(Some(point))
    }
}
