//! Collaborator traits between the formula engine and dataset storage

use std::sync::Arc;

use crate::error::Result;
use crate::types::{DataType, MeasureType};
use crate::value::{Level, Value};

/// Supplies raw per-row values for a column reference in a formula
///
/// Implementations are simple synchronous lookups; any I/O the storage
/// layer performs happens behind this boundary.
pub trait ValueSource: Send + Sync {
    /// Column name, used in diagnostics and dependency tracking
    fn name(&self) -> &str;

    /// Value stored at a row
    fn value_at(&self, row: usize) -> Result<Value>;

    fn data_type(&self) -> DataType;

    fn measure_type(&self) -> MeasureType;

    /// Current levels, in code order
    fn levels(&self) -> Vec<Level>;

    fn has_levels(&self) -> bool {
        self.measure_type().is_categorical()
    }

    /// Whether values of this source depend on a whole-column function
    fn uses_column_formula(&self) -> bool {
        false
    }
}

/// Resolves column names appearing in a formula
pub trait ColumnResolver {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ValueSource>>;
}

/// Row filter of a dataset
pub trait RowFilter: Sync {
    /// Whether a row is excluded by the active filters
    fn is_filtered(&self, row: usize) -> bool;
}

impl RowFilter for [bool] {
    fn is_filtered(&self, row: usize) -> bool {
        self.get(row).copied().unwrap_or(false)
    }
}

impl RowFilter for Vec<bool> {
    fn is_filtered(&self, row: usize) -> bool {
        self.as_slice().is_filtered(row)
    }
}
