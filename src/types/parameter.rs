//! ParameterDescriptor — typed parameter descriptors and their expansion.
//!
//! See `params::expand` for the expansion contract (4.A).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared scalar kind of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarKind {
    Float,
    Int,
    Int64,
    Bool,
    String,
}

impl std::fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ScalarKind::Float => "float",
            ScalarKind::Int => "int",
            ScalarKind::Int64 => "int64",
            ScalarKind::Bool => "bool",
            ScalarKind::String => "string",
        };
        write!(f, "{s}")
    }
}

/// A concrete scalar value of one of the declared kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Float(f64),
    Int(i64),
    Bool(bool),
    String(String),
}

impl ScalarValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Float(v) => Some(*v),
            ScalarValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn kind(&self) -> ScalarKind {
        match self {
            ScalarValue::Float(_) => ScalarKind::Float,
            ScalarValue::Int(_) => ScalarKind::Int,
            ScalarValue::Bool(_) => ScalarKind::Bool,
            ScalarValue::String(_) => ScalarKind::String,
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Int(v) => write!(f, "{v}"),
            ScalarValue::Bool(v) => write!(f, "{v}"),
            ScalarValue::String(v) => write!(f, "{v}"),
        }
    }
}

/// Inclusive `[start, end]` range stepped by `step`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
}

/// A single tunable parameter: either an explicit value list or a range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    /// Name matching a backend tuning key.
    pub name: String,
    pub kind: ScalarKind,
    #[serde(default)]
    pub values: Option<Vec<ScalarValue>>,
    #[serde(default)]
    pub range: Option<ParamRange>,
}

/// A parameter-name → concrete-value assignment, ordered for deterministic
/// serialisation (one combination).
pub type ParamMap = BTreeMap<String, ScalarValue>;
