//! Dataset of data and computed columns

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

use ahash::AHashMap;
use tally_core::{
    ColumnResolver, DataColumn, DataType, Level, MeasureType, RowFilter, Value, ValueSource,
};
use tally_formula::{default_registry, ColumnKey, DependencyGraph, FormulaExpr, FunctionRegistry};
use tracing::debug;

use crate::computed::ComputedColumn;
use crate::error::{Error, Result};

/// A data column shared between the dataset and the formulas reading it
#[derive(Debug)]
struct SharedColumn {
    name: String,
    column: RwLock<DataColumn>,
}

impl SharedColumn {
    fn read(&self) -> RwLockReadGuard<'_, DataColumn> {
        self.column.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_value(&self, row: usize, value: Value) -> tally_core::Result<()> {
        self.column
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_value(row, value)
    }
}

impl ValueSource for SharedColumn {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_at(&self, row: usize) -> tally_core::Result<Value> {
        self.read().value_at(row)
    }

    fn data_type(&self) -> DataType {
        self.read().data_type()
    }

    fn measure_type(&self) -> MeasureType {
        self.read().measure_type()
    }

    fn levels(&self) -> Vec<Level> {
        self.read().levels()
    }
}

/// Every column by name, as formulas resolve them
#[derive(Default)]
pub(crate) struct ColumnSources(AHashMap<String, Arc<dyn ValueSource>>);

impl ColumnResolver for ColumnSources {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ValueSource>> {
        self.0.get(name).cloned()
    }
}

/// A table of equally long columns, some of them computed from formulas
///
/// Computed values are refreshed by
/// [`DatasetCalculationExt::calculate`](crate::DatasetCalculationExt::calculate).
pub struct Dataset {
    row_count: usize,
    /// Column names in insertion order
    order: Vec<String>,
    data: AHashMap<String, Arc<SharedColumn>>,
    pub(crate) computed: AHashMap<String, ComputedColumn>,
    pub(crate) sources: ColumnSources,
    pub(crate) filter: Option<Vec<bool>>,
    pub(crate) graph: DependencyGraph,
    pub(crate) registry: Arc<FunctionRegistry>,
}

impl Dataset {
    /// Create an empty dataset using the built-in functions
    pub fn new(row_count: usize) -> Self {
        Self::with_registry(row_count, default_registry())
    }

    /// Create an empty dataset whose formulas resolve functions in `registry`
    pub fn with_registry(row_count: usize, registry: Arc<FunctionRegistry>) -> Self {
        Self {
            row_count,
            order: Vec::new(),
            data: AHashMap::new(),
            computed: AHashMap::new(),
            sources: ColumnSources::default(),
            filter: None,
            graph: DependencyGraph::new(),
            registry,
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// Column names in the order they were added
    pub fn column_names(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, name: &str) -> bool {
        self.sources.0.contains_key(name)
    }

    pub fn is_computed(&self, name: &str) -> bool {
        self.computed.contains_key(name)
    }

    pub fn computed_column(&self, name: &str) -> Option<&ComputedColumn> {
        self.computed.get(name)
    }

    /// Computed column names in the order they were added
    pub(crate) fn computed_names(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|name| self.computed.contains_key(name.as_str()))
            .cloned()
            .collect()
    }

    pub fn dependency_graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Whether any computed column has pending changes
    pub fn needs_calculation(&self) -> bool {
        self.computed.values().any(ComputedColumn::is_dirty)
    }

    /// Add a data column, padding or truncating it to the row count
    pub fn add_column(&mut self, mut column: DataColumn) -> Result<()> {
        let name = column.name().to_string();
        self.check_new_name(&name)?;
        column.resize(self.row_count);

        let shared = Arc::new(SharedColumn {
            name: name.clone(),
            column: RwLock::new(column),
        });
        self.sources
            .0
            .insert(name.clone(), Arc::clone(&shared) as Arc<dyn ValueSource>);
        self.data.insert(name.clone(), shared);
        self.order.push(name.clone());

        self.propagate_reparse(&name)?;
        Ok(())
    }

    /// Add a computed column; its values are missing until calculated
    pub fn add_computed_column<S: Into<String>>(
        &mut self,
        name: S,
        formula: FormulaExpr,
    ) -> Result<()> {
        let name = name.into();
        self.check_new_name(&name)?;

        let key = ColumnKey::new(name.as_str());
        self.graph
            .set_precedents(&key, formula.column_names().into_iter().map(ColumnKey::from));

        let column = ComputedColumn::new(name.clone(), formula, self.row_count);
        self.sources.0.insert(
            name.clone(),
            Arc::clone(column.source()) as Arc<dyn ValueSource>,
        );
        self.computed.insert(name.clone(), column);
        self.order.push(name.clone());
        debug!(column = %name, "added computed column");

        self.propagate_reparse(&name)?;
        Ok(())
    }

    /// Replace the formula of a computed column
    pub fn set_formula(&mut self, name: &str, formula: FormulaExpr) -> Result<()> {
        if !self.computed.contains_key(name) {
            return Err(self.not_computed(name));
        }
        let key = ColumnKey::new(name);
        self.graph
            .set_precedents(&key, formula.column_names().into_iter().map(ColumnKey::from));

        if let Some(column) = self.computed.get_mut(name) {
            column.set_formula(formula);
        }
        debug!(column = name, "formula changed");

        self.propagate_reparse(name)
    }

    /// Store a value in a data column
    pub fn set_value(&mut self, name: &str, row: usize, value: Value) -> Result<()> {
        let column = match self.data.get(name) {
            Some(column) => column,
            None if self.computed.contains_key(name) => {
                return Err(Error::ComputedColumn(name.to_string()))
            }
            None => return Err(tally_core::Error::ColumnNotFound(name.to_string()).into()),
        };
        column.set_value(row, value)?;
        self.propagate_recalc(name)
    }

    /// Current value of any column
    pub fn value(&self, name: &str, row: usize) -> Result<Value> {
        Ok(self.source(name)?.value_at(row)?)
    }

    /// Current values of any column
    pub fn values(&self, name: &str) -> Result<Vec<Value>> {
        let source = self.source(name)?;
        (0..self.row_count)
            .map(|row| source.value_at(row).map_err(Error::from))
            .collect()
    }

    /// Any column as the formulas see it
    pub fn source(&self, name: &str) -> Result<Arc<dyn ValueSource>> {
        self.resolve(name)
            .ok_or_else(|| tally_core::Error::ColumnNotFound(name.to_string()).into())
    }

    pub fn filter(&self) -> Option<&[bool]> {
        self.filter.as_deref()
    }

    /// Set or clear the row filter mask; `true` excludes a row
    pub fn set_filter(&mut self, filter: Option<Vec<bool>>) -> Result<()> {
        if let Some(mask) = &filter {
            if mask.len() != self.row_count {
                return Err(Error::FilterLength {
                    expected: self.row_count,
                    actual: mask.len(),
                });
            }
        }
        self.filter = filter;
        for column in self.computed.values_mut() {
            column.notify_filter();
        }
        Ok(())
    }

    fn check_new_name(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            return Err(tally_core::Error::DuplicateColumnName(name.to_string()).into());
        }
        Ok(())
    }

    fn not_computed(&self, name: &str) -> Error {
        if self.contains(name) {
            Error::NotComputed(name.to_string())
        } else {
            tally_core::Error::ColumnNotFound(name.to_string()).into()
        }
    }

    /// Names of `changed` and every computed column downstream of it
    fn affected(&self, changed: &str) -> (Vec<ColumnKey>, Vec<String>) {
        let key = ColumnKey::new(changed);
        let downstream = self.graph.get_recalc_order(std::slice::from_ref(&key));
        let mut names = vec![changed.to_string()];
        names.extend(downstream.iter().map(|k| k.name().to_string()));
        (downstream, names)
    }

    /// Values of `changed` are different: clear the results built on them
    fn propagate_recalc(&mut self, changed: &str) -> Result<()> {
        let (downstream, names) = self.affected(changed);
        for key in &downstream {
            if let Some(column) = self.computed.get_mut(key.name()) {
                for name in &names {
                    column.notify_recalc(name)?;
                }
            }
        }
        debug!(column = changed, dependents = downstream.len(), "values changed");
        Ok(())
    }

    /// Type or existence of `changed` is different: recompile dependents
    fn propagate_reparse(&mut self, changed: &str) -> Result<()> {
        let (downstream, names) = self.affected(changed);
        for key in &downstream {
            if let Some(column) = self.computed.get_mut(key.name()) {
                for name in &names {
                    column.notify_reparse(name)?;
                }
            }
        }
        Ok(())
    }
}

impl ColumnResolver for Dataset {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ValueSource>> {
        self.sources.resolve(name)
    }
}

impl RowFilter for Dataset {
    fn is_filtered(&self, row: usize) -> bool {
        self.filter.as_ref().map_or(false, |mask| mask.is_filtered(row))
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("row_count", &self.row_count)
            .field("columns", &self.order)
            .field("filtered", &self.filter.is_some())
            .finish()
    }
}
