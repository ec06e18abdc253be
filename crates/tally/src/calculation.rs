//! Dataset calculation engine
//!
//! Refreshes computed columns in dependency order, with circular reference
//! detection and whole-column results shared between rows.
//!
//! # Example
//!
//! ```rust
//! use tally::prelude::*;
//!
//! let mut dataset = Dataset::new(3);
//! dataset.add_column(DataColumn::integer("x", [1, 2, 3])).unwrap();
//! dataset
//!     .add_computed_column(
//!         "doubled",
//!         FormulaExpr::binary(
//!             FormulaExpr::column("x"),
//!             BinaryOperator::Multiply,
//!             FormulaExpr::number(2.0),
//!         ),
//!     )
//!     .unwrap();
//!
//! let stats = dataset.calculate().unwrap();
//! assert_eq!(stats.columns_calculated, 1);
//! assert_eq!(dataset.value("doubled", 2).unwrap(), Value::Integer(6));
//! ```

use tally_formula::{CalculationOrder, ColumnKey, EvalContext};
use tracing::{debug, warn};

use crate::dataset::Dataset;
use crate::error::Result;

/// Options for dataset calculation
#[derive(Debug, Clone)]
pub struct CalculationOptions {
    /// Recalculate every computed column, even if not dirty
    pub force_full_calculation: bool,
    /// Whole-column functions skip rows excluded by the dataset's filter
    pub apply_filter: bool,
}

impl Default for CalculationOptions {
    fn default() -> Self {
        Self {
            force_full_calculation: false,
            apply_filter: true,
        }
    }
}

/// Statistics from a calculation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalculationStats {
    /// Total number of computed columns
    pub formula_count: usize,
    /// Number of columns calculated
    pub columns_calculated: usize,
    /// Number of clean columns left untouched
    pub columns_skipped: usize,
    /// Number of columns on or downstream of a circular reference
    pub circular_references: usize,
    /// Number of columns whose formula failed to compile or evaluate
    pub errors: usize,
}

/// Extension trait for Dataset to add calculation methods
pub trait DatasetCalculationExt {
    /// Calculate dirty computed columns with default options
    fn calculate(&mut self) -> Result<CalculationStats>;

    /// Calculate computed columns with custom options
    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats>;
}

impl DatasetCalculationExt for Dataset {
    fn calculate(&mut self) -> Result<CalculationStats> {
        self.calculate_with_options(&CalculationOptions::default())
    }

    fn calculate_with_options(&mut self, options: &CalculationOptions) -> Result<CalculationStats> {
        let engine = CalculationEngine::new(options.clone());
        engine.calculate_all(self)
    }
}

/// The calculation engine
struct CalculationEngine {
    options: CalculationOptions,
}

impl CalculationEngine {
    fn new(options: CalculationOptions) -> Self {
        Self { options }
    }

    /// Calculate all computed columns in the dataset
    fn calculate_all(&self, dataset: &mut Dataset) -> Result<CalculationStats> {
        let mut stats = CalculationStats::default();

        // Phase 1: Collect computed columns
        let columns: Vec<ColumnKey> = dataset
            .computed_names()
            .into_iter()
            .map(ColumnKey::new)
            .collect();
        stats.formula_count = columns.len();

        if columns.is_empty() {
            return Ok(stats);
        }

        // Phase 2: Order them, setting circular references aside
        let order = dataset.graph.calculation_order(&columns);
        stats.circular_references = order.circular.len();

        // Phase 3: Circular columns hold missing values
        self.fail_circular(dataset, &order, &mut stats);

        // Phase 4: Calculate the rest, precedents first
        self.calculate_columns(dataset, &order.order, &mut stats);

        debug!(
            formulas = stats.formula_count,
            calculated = stats.columns_calculated,
            skipped = stats.columns_skipped,
            circular = stats.circular_references,
            errors = stats.errors,
            "calculation finished"
        );
        Ok(stats)
    }

    fn fail_circular(
        &self,
        dataset: &mut Dataset,
        order: &CalculationOrder,
        stats: &mut CalculationStats,
    ) {
        let row_count = dataset.row_count();
        for key in &order.circular {
            if let Some(column) = dataset.computed.get_mut(key.name()) {
                if !column.is_dirty() && !self.options.force_full_calculation {
                    continue;
                }
                warn!(column = %key, "circular reference");
                column.fail("Circular reference".to_string(), row_count);
                stats.errors += 1;
            }
        }
    }

    fn calculate_columns(
        &self,
        dataset: &mut Dataset,
        order: &[ColumnKey],
        stats: &mut CalculationStats,
    ) {
        let row_count = dataset.row_count();
        let mut ctx = EvalContext::new(row_count);
        if self.options.apply_filter {
            if let Some(mask) = &dataset.filter {
                ctx = ctx.with_filter(mask);
            }
        }
        let force = self.options.force_full_calculation;

        for key in order {
            let Some(column) = dataset.computed.get_mut(key.name()) else {
                continue;
            };
            if !force && !column.is_dirty() {
                stats.columns_skipped += 1;
                continue;
            }

            let result = column.calculate(
                &dataset.sources,
                &dataset.registry,
                &ctx,
                self.options.apply_filter,
                force,
            );
            if let Err(e) = result {
                warn!(column = %key, error = %e, "formula failed");
                column.fail(e.to_string(), row_count);
                stats.errors += 1;
            }
            stats.columns_calculated += 1;
        }
    }
}
