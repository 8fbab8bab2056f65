//! Parameter domain model: admissible discrete values and defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::DomainError;
use crate::point::Point;

/// A single discrete parameter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
}

impl ParamValue {
    pub fn is_bool(&self) -> bool {
        matches!(self, Self::Bool(_))
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
        }
    }
}

impl FromStr for ParamValue {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "true" => Ok(Self::Bool(true)),
            "false" => Ok(Self::Bool(false)),
            other => other
                .parse::<i64>()
                .map(Self::Int)
                .map_err(|_| format!("'{other}' is neither a boolean nor an integer")),
        }
    }
}

/// A tunable parameter with its ordered domain and default value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub default: ParamValue,
    pub domain: Vec<ParamValue>,
}

impl Parameter {
    /// Build a parameter, enforcing the domain invariants.
    pub fn new(
        name: impl Into<String>,
        domain: Vec<ParamValue>,
        default: ParamValue,
    ) -> Result<Self, DomainError> {
        let param = Self {
            name: name.into(),
            default,
            domain,
        };
        param.validate()?;
        Ok(param)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.domain.len() < 2 {
            return Err(DomainError::DomainTooSmall {
                name: self.name.clone(),
                size: self.domain.len(),
            });
        }
        let is_bool = self.domain[0].is_bool();
        if self.domain.iter().any(|v| v.is_bool() != is_bool) {
            return Err(DomainError::MixedValueTypes {
                name: self.name.clone(),
            });
        }
        for (i, value) in self.domain.iter().enumerate() {
            if self.domain[..i].contains(value) {
                return Err(DomainError::DuplicateValue {
                    name: self.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        if !self.domain.contains(&self.default) {
            return Err(DomainError::DefaultOutsideDomain {
                name: self.name.clone(),
                default: self.default.to_string(),
            });
        }
        Ok(())
    }

    /// Position of `value` within the domain.
    pub fn position(&self, value: &ParamValue) -> Option<usize> {
        self.domain.iter().position(|v| v == value)
    }

    pub fn contains(&self, value: &ParamValue) -> bool {
        self.domain.contains(value)
    }
}

/// The full, immutable parameter space of a run.
///
/// Holds the parameters in declaration order together with a name → index
/// table built once at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSpace {
    parameters: Vec<Parameter>,
    index: HashMap<String, usize>,
}

impl ParameterSpace {
    pub fn new(parameters: Vec<Parameter>) -> Result<Self, DomainError> {
        if parameters.is_empty() {
            return Err(DomainError::EmptySpace);
        }
        let mut index = HashMap::with_capacity(parameters.len());
        for (i, param) in parameters.iter().enumerate() {
            param.validate()?;
            if index.insert(param.name.clone(), i).is_some() {
                return Err(DomainError::DuplicateParameter {
                    name: param.name.clone(),
                });
            }
        }
        Ok(Self { parameters, index })
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn get(&self, index: usize) -> Option<&Parameter> {
        self.parameters.get(index)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn default_point(&self) -> Point {
        Point::from_values(self.parameters.iter().map(|p| p.default).collect())
    }

    /// Check that `point` has one admissible value per parameter.
    pub fn validate_point(&self, point: &Point) -> Result<(), DomainError> {
        if point.len() != self.len() {
            return Err(DomainError::LengthMismatch {
                expected: self.len(),
                actual: point.len(),
            });
        }
        for (param, value) in self.parameters.iter().zip(point.values()) {
            if !param.contains(value) {
                return Err(DomainError::ValueOutsideDomain {
                    name: param.name.clone(),
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Apply `name=value` overrides to a copy of `base`.
    ///
    /// Fails on unknown names or values outside the named parameter's domain.
    pub fn with_overrides<'a, I>(&self, base: &Point, overrides: I) -> Result<Point, DomainError>
    where
        I: IntoIterator<Item = (&'a str, ParamValue)>,
    {
        let mut values = base.values().to_vec();
        for (name, value) in overrides {
            let i = self
                .index_of(name)
                .ok_or_else(|| DomainError::UnknownParameter {
                    name: name.to_string(),
                })?;
            if !self.parameters[i].contains(&value) {
                return Err(DomainError::ValueOutsideDomain {
                    name: name.to_string(),
                    value: value.to_string(),
                });
            }
            values[i] = value;
        }
        Ok(Point::from_values(values))
    }

    /// Human-readable list of the parameters that differ between two points.
    pub fn describe_diff(&self, from: &Point, to: &Point) -> String {
        let changes: Vec<String> = self
            .parameters
            .iter()
            .zip(from.values().iter().zip(to.values()))
            .filter(|(_, (a, b))| a != b)
            .map(|(param, (a, b))| format!("  {} : {} -> {}", param.name, a, b))
            .collect();
        if changes.is_empty() {
            "The point is the default one".to_string()
        } else {
            format!("Difference from the default point :\n{}", changes.join("\n"))
        }
    }

    /// Command-line arguments `--name=value` for every parameter of `point`.
    pub fn to_args(&self, point: &Point) -> Vec<String> {
        self.parameters
            .iter()
            .zip(point.values())
            .map(|(param, value)| format!("--{}={}", param.name, value))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(values: &[i64]) -> Vec<ParamValue> {
        values.iter().copied().map(ParamValue::Int).collect()
    }

    fn bools() -> Vec<ParamValue> {
        vec![ParamValue::Bool(false), ParamValue::Bool(true)]
    }

    fn sample_space() -> ParameterSpace {
        ParameterSpace::new(vec![
            Parameter::new("eliminate", bools(), ParamValue::Bool(true)).unwrap(),
            Parameter::new("eliminaterounds", ints(&[1, 2, 4, 8]), ParamValue::Int(2)).unwrap(),
            Parameter::new("backbone", ints(&[0, 1, 2]), ParamValue::Int(1)).unwrap(),
        ])
        .unwrap()
    }

    #[test]
    fn parses_values() {
        assert_eq!("true".parse::<ParamValue>(), Ok(ParamValue::Bool(true)));
        assert_eq!(" 42".parse::<ParamValue>(), Ok(ParamValue::Int(42)));
        assert!("fast".parse::<ParamValue>().is_err());
    }

    #[test]
    fn rejects_small_domain() {
        let err = Parameter::new("x", ints(&[1]), ParamValue::Int(1)).unwrap_err();
        assert_eq!(
            err,
            DomainError::DomainTooSmall {
                name: "x".into(),
                size: 1
            }
        );
    }

    #[test]
    fn rejects_default_outside_domain() {
        let err = Parameter::new("x", ints(&[1, 2]), ParamValue::Int(3)).unwrap_err();
        assert!(matches!(err, DomainError::DefaultOutsideDomain { .. }));
    }

    #[test]
    fn rejects_mixed_types() {
        let domain = vec![ParamValue::Bool(true), ParamValue::Int(0)];
        let err = Parameter::new("x", domain, ParamValue::Int(0)).unwrap_err();
        assert!(matches!(err, DomainError::MixedValueTypes { .. }));
    }

    #[test]
    fn rejects_duplicate_names() {
        let p = Parameter::new("x", ints(&[1, 2]), ParamValue::Int(1)).unwrap();
        let err = ParameterSpace::new(vec![p.clone(), p]).unwrap_err();
        assert!(matches!(err, DomainError::DuplicateParameter { .. }));
    }

    #[test]
    fn default_point_and_index_lookup() {
        let space = sample_space();
        assert_eq!(space.len(), 3);
        assert_eq!(space.index_of("backbone"), Some(2));
        assert_eq!(space.index_of("missing"), None);
        assert_eq!(space.default_point().key(), "true-2-1");
    }

    #[test]
    fn overrides_are_validated() {
        let space = sample_space();
        let base = space.default_point();
        let p = space
            .with_overrides(&base, [("backbone", ParamValue::Int(0))])
            .unwrap();
        assert_eq!(p.key(), "true-2-0");

        let err = space
            .with_overrides(&base, [("backbone", ParamValue::Int(7))])
            .unwrap_err();
        assert!(matches!(err, DomainError::ValueOutsideDomain { .. }));
        let err = space
            .with_overrides(&base, [("nope", ParamValue::Int(0))])
            .unwrap_err();
        assert!(matches!(err, DomainError::UnknownParameter { .. }));
    }

    #[test]
    fn diff_lists_changed_parameters() {
        let space = sample_space();
        let base = space.default_point();
        assert_eq!(space.describe_diff(&base, &base), "The point is the default one");

        let changed = space
            .with_overrides(&base, [("eliminaterounds", ParamValue::Int(8))])
            .unwrap();
        let diff = space.describe_diff(&base, &changed);
        assert!(diff.contains("eliminaterounds : 2 -> 8"));
        assert!(!diff.contains("backbone"));
    }

    #[test]
    fn builds_command_line_args() {
        let space = sample_space();
        assert_eq!(
            space.to_args(&space.default_point()),
            vec!["--eliminate=true", "--eliminaterounds=2", "--backbone=1"]
        );
    }
}
