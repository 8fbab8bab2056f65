//! Dependency constraints between governing and dependent parameters.
//!
//! When a governing parameter is at its disabled value, its dependent
//! parameters have no effect on the program, so points that vary them are
//! rejected: they would only be re-measurements of another point.

use serde::{Deserialize, Serialize};
use tracing::debug;

use pt_types::{ParamValue, ParameterSpace, Point};

/// One entry of the dependency table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRule {
    pub governing: String,
    pub disabled: ParamValue,
    pub dependents: Vec<String>,
}

impl DependencyRule {
    pub fn new(governing: &str, disabled: ParamValue, dependents: &[&str]) -> Self {
        Self {
            governing: governing.to_string(),
            disabled,
            dependents: dependents.iter().map(|d| d.to_string()).collect(),
        }
    }
}

/// The full governing → disabled value → dependents table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConstraintTable {
    pub rules: Vec<DependencyRule>,
}

impl ConstraintTable {
    pub fn new(rules: Vec<DependencyRule>) -> Self {
        Self { rules }
    }

    /// Dependencies between kissat options.
    pub fn kissat() -> Self {
        let off = ParamValue::Bool(false);
        Self::new(vec![
            DependencyRule::new("backbone", ParamValue::Int(0), &["backbonerounds"]),
            DependencyRule::new("definitions", off, &["definitioncores", "definitionticks"]),
            DependencyRule::new(
                "eliminate",
                off,
                &[
                    "eliminatebound",
                    "eliminateclslim",
                    "eliminateocclim",
                    "eliminaterounds",
                    "forward",
                ],
            ),
            DependencyRule::new("substitute", off, &["substituteeffort", "substituterounds"]),
            DependencyRule::new("vivify", off, &["vivifytier1", "vivifytier2"]),
        ])
    }
}

#[derive(Debug, Clone)]
struct ResolvedRule {
    governing: usize,
    disabled: ParamValue,
    dependents: Vec<usize>,
}

/// Admissibility check of points relative to the default point.
///
/// Built once per run: parameter names are resolved to indices, and names
/// absent from the active space are dropped.
#[derive(Debug, Clone)]
pub struct ConstraintValidator {
    rules: Vec<ResolvedRule>,
    reference: Point,
}

impl ConstraintValidator {
    pub fn new(space: &ParameterSpace, table: &ConstraintTable) -> Self {
        let rules = table
            .rules
            .iter()
            .filter_map(|rule| {
                let governing = space.index_of(&rule.governing)?;
                let dependents: Vec<usize> = rule
                    .dependents
                    .iter()
                    .filter_map(|name| space.index_of(name))
                    .collect();
                if dependents.is_empty() {
                    return None;
                }
                Some(ResolvedRule {
                    governing,
                    disabled: rule.disabled,
                    dependents,
                })
            })
            .collect::<Vec<_>>();
        debug!("{} dependency rules active", rules.len());

        Self {
            rules,
            reference: space.default_point(),
        }
    }

    /// A validator that accepts every point.
    pub fn permissive(space: &ParameterSpace) -> Self {
        Self::new(space, &ConstraintTable::default())
    }

    pub fn is_admissible(&self, point: &Point) -> bool {
        self.rules.iter().all(|rule| {
            point.get(rule.governing) != Some(&rule.disabled)
                || rule
                    .dependents
                    .iter()
                    .all(|&i| point.get(i) == self.reference.get(i))
        })
    }
}
