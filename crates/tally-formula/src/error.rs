//! Formula error types

use thiserror::Error;

use crate::node::NodeId;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur while compiling or evaluating a formula
///
/// Value-level problems (missing data, failed conversions, division by
/// zero) never surface here; they become missing values.
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Unknown function
    #[error("Function {0}() does not exist")]
    UnknownFunction(String),

    /// Unknown column
    #[error("Column '{0}' does not exist")]
    UnknownColumn(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Invalid argument passed to a function implementation
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Handle refers to a node that has been released
    #[error("Node {0} has been released")]
    ReleasedNode(NodeId),

    /// Structurally malformed node
    #[error("Invalid node: {0}")]
    InvalidNode(String),

    /// Error raised by a value source
    #[error(transparent)]
    Source(#[from] tally_core::Error),
}
