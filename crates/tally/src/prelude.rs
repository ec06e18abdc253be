//! Prelude module - common imports for tally users
//!
//! ```rust
//! use tally::prelude::*;
//! ```

pub use crate::{
    // Operators
    BinaryOperator,
    BoolOperator,
    // Calculation types
    CalculationOptions,
    CalculationStats,
    CompareOperator,

    ComputedColumn,
    DataColumn,
    // Main types
    Dataset,
    // Extension traits
    DatasetCalculationExt,
    DataType,

    // Error types
    Error,
    FormulaExpr,
    Level,
    MeasureType,
    Result,

    UnaryOperator,
    // Values
    Value,
    ValueSource,
};
