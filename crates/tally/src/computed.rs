//! Computed columns
//!
//! A computed column owns its parsed formula and the compiled
//! [`FormulaTree`]. Its calculated values are published through a
//! [`ComputedSource`], which is what other formulas see when they reference
//! the column by name.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use tally_core::convert::{convert, missing_of, Domain};
use tally_core::{ColumnResolver, DataType, Level, MeasureType, Value, ValueSource};
use tally_formula::{EvalContext, FormulaExpr, FormulaResult, FormulaTree, FunctionRegistry, NodeId};
use tracing::{debug, trace};

/// What a computed column needs before its values can be read again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnStatus {
    /// Values are up to date
    Clean,
    /// Source values changed, the compiled tree is still valid
    NeedsRecalc,
    /// The formula, or the type of something it references, changed
    NeedsReparse,
}

/// Calculated state of a computed column
#[derive(Debug, Clone)]
struct ComputedState {
    values: Vec<Value>,
    data_type: DataType,
    measure_type: MeasureType,
    levels: Vec<Level>,
    uses_column_formula: bool,
}

/// Read side of a computed column, shared with the trees that reference it
#[derive(Debug)]
pub struct ComputedSource {
    name: String,
    state: RwLock<ComputedState>,
}

impl ComputedSource {
    fn new(name: String, row_count: usize) -> Self {
        Self {
            name,
            state: RwLock::new(ComputedState {
                values: vec![missing_of(Domain::Decimal); row_count],
                data_type: DataType::Decimal,
                measure_type: MeasureType::Continuous,
                levels: Vec::new(),
                uses_column_formula: false,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, ComputedState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ComputedState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of every calculated value
    pub fn values(&self) -> Vec<Value> {
        self.read().values.clone()
    }

    /// Replace every value with the missing value of the current data type
    fn clear(&self, row_count: usize) {
        let mut state = self.write();
        let missing = missing_for(state.data_type);
        state.values = vec![missing; row_count];
        state.uses_column_formula = false;
    }
}

impl ValueSource for ComputedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn value_at(&self, row: usize) -> tally_core::Result<Value> {
        let state = self.read();
        state
            .values
            .get(row)
            .cloned()
            .ok_or(tally_core::Error::RowOutOfBounds(row, state.values.len()))
    }

    fn data_type(&self) -> DataType {
        self.read().data_type
    }

    fn measure_type(&self) -> MeasureType {
        self.read().measure_type
    }

    fn levels(&self) -> Vec<Level> {
        self.read().levels.clone()
    }

    fn uses_column_formula(&self) -> bool {
        self.read().uses_column_formula
    }
}

/// A column whose values come from a formula
#[derive(Debug)]
pub struct ComputedColumn {
    formula: FormulaExpr,
    tree: FormulaTree,
    root: Option<NodeId>,
    status: ColumnStatus,
    error: Option<String>,
    source: Arc<ComputedSource>,
}

impl ComputedColumn {
    pub(crate) fn new(name: String, formula: FormulaExpr, row_count: usize) -> Self {
        Self {
            formula,
            tree: FormulaTree::default(),
            root: None,
            status: ColumnStatus::NeedsReparse,
            error: None,
            source: Arc::new(ComputedSource::new(name, row_count)),
        }
    }

    pub fn name(&self) -> &str {
        self.source.name()
    }

    pub fn formula(&self) -> &FormulaExpr {
        &self.formula
    }

    pub fn status(&self) -> ColumnStatus {
        self.status
    }

    /// Message of the last compile or evaluation failure
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The compiled tree and its root, once the formula has been compiled
    pub fn compiled(&self) -> Option<(&FormulaTree, NodeId)> {
        self.root.map(|root| (&self.tree, root))
    }

    pub fn source(&self) -> &Arc<ComputedSource> {
        &self.source
    }

    pub(crate) fn set_formula(&mut self, formula: FormulaExpr) {
        self.formula = formula;
        self.status = ColumnStatus::NeedsReparse;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.status != ColumnStatus::Clean
    }

    /// A referenced column's values changed
    ///
    /// Clears the whole-column results that read `column`.
    pub(crate) fn notify_recalc(&mut self, column: &str) -> FormulaResult<()> {
        if self.root.is_none() {
            return Ok(());
        }
        for id in self.tree.column_nodes(column) {
            self.tree.notify_recalc(id)?;
        }
        if self.status == ColumnStatus::Clean {
            self.status = ColumnStatus::NeedsRecalc;
        }
        Ok(())
    }

    /// A referenced column's formula changed; its type may have changed too
    pub(crate) fn notify_reparse(&mut self, column: &str) -> FormulaResult<()> {
        self.status = ColumnStatus::NeedsReparse;
        if self.root.is_none() {
            return Ok(());
        }
        for id in self.tree.column_nodes(column) {
            let roots = self.tree.notify_reparse(id)?;
            trace!(column = self.name(), source = column, roots = roots.len(), "reparse requested");
        }
        Ok(())
    }

    /// The row filter changed
    pub(crate) fn notify_filter(&mut self) {
        if self.root.is_none() {
            return;
        }
        self.tree.invalidate_all();
        if self.status == ColumnStatus::Clean && self.source.uses_column_formula() {
            self.status = ColumnStatus::NeedsRecalc;
        }
    }

    /// Fill every row with missing values, keeping the current data type
    pub(crate) fn fail(&mut self, message: String, row_count: usize) {
        self.source.clear(row_count);
        self.error = Some(message);
        self.status = ColumnStatus::Clean;
    }

    /// Compile when needed, then evaluate every row and publish the result
    pub(crate) fn calculate(
        &mut self,
        resolver: &dyn ColumnResolver,
        registry: &Arc<FunctionRegistry>,
        ctx: &EvalContext<'_>,
        filt: bool,
        force: bool,
    ) -> FormulaResult<()> {
        let root = match self.root {
            Some(root) if self.status != ColumnStatus::NeedsReparse => {
                if force {
                    self.tree.invalidate_all();
                }
                root
            }
            _ => self.compile(resolver, registry)?,
        };

        let tree = &self.tree;
        let data_type = tree.data_type(root)?;
        let measure_type = tree.measure_type(root)?;
        let levels = if tree.has_levels(root)? {
            tree.levels(root, ctx)?
        } else {
            Vec::new()
        };

        let mut values = Vec::with_capacity(ctx.row_count);
        for row in 0..ctx.row_count {
            values.push(tree.fvalue(root, row, ctx, filt)?);
        }

        let (values, levels) = match data_type {
            DataType::Text => label_values(values, levels),
            DataType::Integer => {
                let values = unify(values, Domain::Integer);
                let levels = if !levels.is_empty() || !measure_type.is_categorical() {
                    levels
                } else {
                    integer_levels(&values)
                };
                (values, levels)
            }
            DataType::Decimal => (unify(values, Domain::Decimal), Vec::new()),
        };

        trace!(
            column = self.name(),
            data_type = data_type.name(),
            measure_type = measure_type.name(),
            levels = levels.len(),
            "calculated column"
        );

        let mut state = self.source.write();
        state.values = values;
        state.data_type = data_type;
        state.measure_type = measure_type;
        state.levels = levels;
        state.uses_column_formula = tree.uses_column_formula(root)?;
        drop(state);

        self.error = None;
        self.status = ColumnStatus::Clean;
        Ok(())
    }

    fn compile(
        &mut self,
        resolver: &dyn ColumnResolver,
        registry: &Arc<FunctionRegistry>,
    ) -> FormulaResult<NodeId> {
        self.root = None;
        self.tree = FormulaTree::new(Arc::clone(registry));
        let root = self.tree.compile(&self.formula, resolver)?;
        debug!(column = self.name(), nodes = self.tree.len(), "recompiled column");
        self.root = Some(root);
        Ok(root)
    }
}

fn missing_for(data_type: DataType) -> Value {
    match data_type {
        DataType::Text => missing_of(Domain::Labeled),
        data_type => missing_of(Domain::for_data_type(data_type)),
    }
}

fn unify(values: Vec<Value>, domain: Domain) -> Vec<Value> {
    values.iter().map(|v| convert(v, domain)).collect()
}

/// Store text results as labeled values
///
/// Labels the formula did not predict get codes after the known ones, in
/// order of first appearance.
fn label_values(values: Vec<Value>, mut levels: Vec<Level>) -> (Vec<Value>, Vec<Level>) {
    let mut codes: AHashMap<String, i32> = levels
        .iter()
        .map(|level| (level.label.clone(), level.code))
        .collect();
    let mut next = levels.iter().map(|l| l.code + 1).max().unwrap_or(0);

    let values = values
        .iter()
        .map(|value| {
            let Value::Text(label) = convert(value, Domain::Text) else {
                return missing_of(Domain::Labeled);
            };
            if label.is_empty() {
                return missing_of(Domain::Labeled);
            }
            let code = match codes.get(&label) {
                Some(code) => *code,
                None => {
                    let code = next;
                    next += 1;
                    codes.insert(label.clone(), code);
                    levels.push(Level::new(code, label.clone()));
                    code
                }
            };
            Value::labeled(code, label)
        })
        .collect();

    (values, levels)
}

fn integer_levels(values: &[Value]) -> Vec<Level> {
    let mut distinct: Vec<i32> = values
        .iter()
        .filter(|v| !v.is_missing())
        .filter_map(|v| match v {
            Value::Integer(i) => Some(*i),
            _ => None,
        })
        .collect();
    distinct.sort_unstable();
    distinct.dedup();
    distinct
        .into_iter()
        .map(|v| Level::new(v, v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_label_values_extends_levels() {
        let known = vec![Level::new(0, "low"), Level::new(1, "high")];
        let values = vec![
            Value::text("high"),
            Value::text("mid"),
            Value::text(""),
            Value::text("mid"),
        ];

        let (values, levels) = label_values(values, known);

        assert_eq!(
            values,
            vec![
                Value::labeled(1, "high"),
                Value::labeled(2, "mid"),
                missing_of(Domain::Labeled),
                Value::labeled(2, "mid"),
            ]
        );
        assert_eq!(levels.last(), Some(&Level::new(2, "mid")));
    }

    #[test]
    fn test_integer_levels_sorted_distinct() {
        let values = vec![
            Value::Integer(3),
            Value::Integer(1),
            Value::Integer(tally_core::INT_MISSING),
            Value::Integer(3),
        ];
        assert_eq!(
            integer_levels(&values),
            vec![Level::new(1, "1"), Level::new(3, "3")]
        );
    }

    #[test]
    fn test_source_before_calculation() {
        let column = ComputedColumn::new("c".into(), FormulaExpr::number(1.0), 2);
        assert_eq!(column.status(), ColumnStatus::NeedsReparse);
        assert!(column.source().value_at(1).unwrap().is_missing());
        assert!(column.source().value_at(2).is_err());
    }
}
