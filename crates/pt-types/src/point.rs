//! Points: one value per parameter, index-aligned with the parameter space.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::param::ParamValue;

/// Canonical deduplication key of a point (`v0-v1-...-vn`).
pub type PointKey = String;

/// An assignment of one value per parameter.
///
/// Points are plain values: every transformation produces a new point.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    values: Vec<ParamValue>,
}

impl Point {
    pub fn from_values(values: Vec<ParamValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[ParamValue] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ParamValue> {
        self.values.get(index)
    }

    /// Copy of this point with the value at `index` replaced.
    pub fn with_value(&self, index: usize, value: ParamValue) -> Self {
        let mut values = self.values.clone();
        values[index] = value;
        Self { values }
    }

    /// Two points are the same iff their keys are equal.
    pub fn key(&self) -> PointKey {
        self.values
            .iter()
            .map(ParamValue::to_string)
            .collect::<Vec<_>>()
            .join("-")
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, v) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v}")?;
        }
        write!(f, "]")
    }
}
