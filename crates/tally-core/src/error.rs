//! Error types for tally-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by value sources and column storage
#[derive(Debug, Error)]
pub enum Error {
    /// Row index out of bounds
    #[error("Row index {0} out of bounds (row count: {1})")]
    RowOutOfBounds(usize, usize),

    /// Column not found by name
    #[error("Column not found: {0}")]
    ColumnNotFound(String),

    /// Duplicate column name
    #[error("Column name already exists: {0}")]
    DuplicateColumnName(String),

    /// Value does not fit the column's data type
    #[error("Invalid value type: expected {expected}, got {actual}")]
    InvalidValueType {
        expected: &'static str,
        actual: &'static str,
    },

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
