//! Error types for the tally facade

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by dataset operations
#[derive(Debug, Error)]
pub enum Error {
    /// Error from column storage
    #[error(transparent)]
    Core(#[from] tally_core::Error),

    /// Error from formula compilation or evaluation
    #[error(transparent)]
    Formula(#[from] tally_formula::FormulaError),

    /// Values of a computed column cannot be set directly
    #[error("Column '{0}' is computed and cannot be edited")]
    ComputedColumn(String),

    /// Operation needs a computed column
    #[error("Column '{0}' is not a computed column")]
    NotComputed(String),

    /// Row filter mask does not match the row count
    #[error("Filter has {actual} rows, dataset has {expected}")]
    FilterLength { expected: usize, actual: usize },
}
