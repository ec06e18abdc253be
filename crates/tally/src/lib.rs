//! # tally
//!
//! Computed columns for tabular datasets.
//!
//! tally evaluates formulas over the columns of a [`Dataset`] and stores the
//! results as computed columns, which other formulas can reference in turn.
//!
//! ## Features
//!
//! - Missing values propagated through every operator and function
//! - Result data type, measure type and levels inferred from the formula
//! - Whole-column functions (`VMEAN`, `VSTDEV`, ...) computed once per column
//! - Recalculation limited to the columns downstream of an edit
//! - Row filters honoured by whole-column functions
//!
//! ## Example
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let mut dataset = Dataset::new(3);
//! dataset.add_column(DataColumn::decimal("score", [2.0, 4.0, 6.0])).unwrap();
//! dataset
//!     .add_computed_column(
//!         "z",
//!         FormulaExpr::call("Z", vec![FormulaExpr::column("score")]),
//!     )
//!     .unwrap();
//!
//! dataset.calculate().unwrap();
//! assert_eq!(dataset.value("z", 0).unwrap(), Value::Decimal(-1.0));
//! ```

pub mod calculation;
pub mod computed;
pub mod dataset;
pub mod error;
pub mod prelude;

pub use calculation::{CalculationOptions, CalculationStats, DatasetCalculationExt};
pub use computed::{ColumnStatus, ComputedColumn, ComputedSource};
pub use dataset::Dataset;
pub use error::{Error, Result};

// Re-export core types
pub use tally_core::{
    convert, ColumnResolver, DataColumn, DataType, Domain, Level, MeasureType, RowFilter, Value,
    ValueSource, INT_MISSING,
};

// Re-export formula types
pub use tally_formula::{
    default_registry, BinaryOperator, BoolOperator, CompareOperator, EvalContext, FormulaError,
    FormulaExpr, FormulaResult, FormulaTree, FunctionDef, FunctionRegistry, NodeId,
    UnaryOperator,
};
