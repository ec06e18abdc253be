//! Data type and measure type classifications

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Storage kind of a column or formula result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DataType {
    Integer,
    Decimal,
    Text,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Integer => "integer",
            DataType::Decimal => "decimal",
            DataType::Text => "text",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Statistical role of a column, independent of its storage kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MeasureType {
    Continuous,
    Ordinal,
    Nominal,
    /// Identifier column (row labels, participant ids)
    Id,
}

impl MeasureType {
    pub fn name(&self) -> &'static str {
        match self {
            MeasureType::Continuous => "continuous",
            MeasureType::Ordinal => "ordinal",
            MeasureType::Nominal => "nominal",
            MeasureType::Id => "id",
        }
    }

    /// Whether columns of this measure type carry categorical levels
    pub fn is_categorical(&self) -> bool {
        !matches!(self, MeasureType::Continuous)
    }
}

impl fmt::Display for MeasureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
