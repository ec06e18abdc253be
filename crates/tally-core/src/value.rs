//! Scalar values produced and consumed by formulas

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::convert::INT_MISSING;
use crate::types::DataType;

/// A single per-row value
///
/// Missing values are not a separate variant: each domain has its own
/// sentinel (see [`crate::convert`]).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    /// Integer value (`i32::MIN` is missing)
    Integer(i32),
    /// Decimal value (NaN is missing)
    Decimal(f64),
    /// Text value (empty string is missing)
    Text(String),
    /// Integer code carrying a display label, as stored by categorical
    /// and identifier columns
    Labeled { code: i32, label: String },
}

impl Value {
    /// Create a new text value
    pub fn text<S: Into<String>>(s: S) -> Self {
        Value::Text(s.into())
    }

    /// Create a new labeled value
    pub fn labeled<S: Into<String>>(code: i32, label: S) -> Self {
        Value::Labeled {
            code,
            label: label.into(),
        }
    }

    /// Check whether this value is its domain's missing sentinel
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Integer(v) => *v == INT_MISSING,
            Value::Decimal(v) => v.is_nan(),
            Value::Text(s) => s.is_empty(),
            Value::Labeled { code, .. } => *code == INT_MISSING,
        }
    }

    /// Truthiness used by the logical operators
    ///
    /// Labeled values are judged by their code. Callers check
    /// [`Value::is_missing`] first.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Integer(v) => *v != 0,
            Value::Decimal(v) => *v != 0.0,
            Value::Text(s) => !s.is_empty(),
            Value::Labeled { code, .. } => *code != 0,
        }
    }

    /// Whether this is a floating value (drives tolerant equality)
    pub fn is_decimal(&self) -> bool {
        matches!(self, Value::Decimal(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Value::Text(_))
    }

    pub fn is_labeled(&self) -> bool {
        matches!(self, Value::Labeled { .. })
    }

    /// The data type a value of this variant naturally stores as
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Integer(_) | Value::Labeled { .. } => DataType::Integer,
            Value::Decimal(_) => DataType::Decimal,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Get the type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Decimal(_) => "decimal",
            Value::Text(_) => "text",
            Value::Labeled { .. } => "labeled",
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_missing() {
            return Ok(());
        }
        match self {
            Value::Integer(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
            Value::Labeled { label, .. } => f.write_str(label),
        }
    }
}

/// One category of a categorical column: an integer code and its label
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Level {
    pub code: i32,
    pub label: String,
}

impl Level {
    pub fn new<S: Into<String>>(code: i32, label: S) -> Self {
        Self {
            code,
            label: label.into(),
        }
    }
}

impl<S: Into<String>> From<(i32, S)> for Level {
    fn from((code, label): (i32, S)) -> Self {
        Level::new(code, label)
    }
}
