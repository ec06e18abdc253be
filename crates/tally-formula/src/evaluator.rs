//! Formula evaluator
//!
//! Point evaluation of nodes (`fvalue`) and the per-node queries the host
//! needs: result types, levels, atomicity and whole-column dependency.

use tally_core::convert::{convert, convert_opt};
use tally_core::{missing_of, DataType, Domain, Level, MeasureType, RowFilter, Value, INT_MISSING};
use tracing::trace;

use crate::ast::{BoolOperator, CompareOperator};
use crate::call::{derive_types, discover_levels, CallNode};
use crate::error::{FormulaError, FormulaResult};
use crate::functions::{Evaluation, ParamDefault};
use crate::node::{NodeId, NodeKind};
use crate::operators;
use crate::tree::FormulaTree;
use crate::view::ColumnView;

/// Dataset facts an evaluation needs
#[derive(Clone, Copy)]
pub struct EvalContext<'a> {
    /// Total number of rows
    pub row_count: usize,
    /// Active row filter, consulted when column views are filtered
    pub filter: Option<&'a dyn RowFilter>,
}

impl<'a> EvalContext<'a> {
    pub fn new(row_count: usize) -> Self {
        Self {
            row_count,
            filter: None,
        }
    }

    pub fn with_filter(mut self, filter: &'a dyn RowFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn is_filtered(&self, row: usize) -> bool {
        self.filter.map_or(false, |f| f.is_filtered(row))
    }
}

impl FormulaTree {
    /// Evaluate a node at one row
    ///
    /// `filt` applies the row filter to whole-column functions below this
    /// node; row-wise function arguments are always evaluated unfiltered.
    pub fn fvalue(
        &self,
        id: NodeId,
        index: usize,
        ctx: &EvalContext<'_>,
        filt: bool,
    ) -> FormulaResult<Value> {
        match &self.node(id)?.kind {
            NodeKind::Literal(value) => Ok(value.clone()),
            NodeKind::Column(column) => Ok(column.source().value_at(index)?),
            NodeKind::Unary { op, operand } => {
                let value = self.fvalue(*operand, index, ctx, filt)?;
                Ok(operators::unary(*op, value))
            }
            NodeKind::Bool { op, values } => self.eval_bool(*op, values, index, ctx, filt),
            NodeKind::Binary { op, left, right } => {
                let data_type = self.data_type(id)?;
                let l = self.fvalue(*left, index, ctx, filt)?;
                let r = self.fvalue(*right, index, ctx, filt)?;
                Ok(operators::binary(*op, data_type, &l, &r))
            }
            NodeKind::Compare {
                left,
                ops,
                comparators,
            } => self.eval_compare(*left, ops, comparators, index, ctx, filt),
            NodeKind::Call(call) => self.eval_call(id, call, index, ctx, filt),
        }
    }

    /// Lazy sequence of a node's values over all rows
    pub fn column_values<'t, 'c>(
        &'t self,
        id: NodeId,
        ctx: &EvalContext<'c>,
        filt: bool,
    ) -> FormulaResult<ColumnView<'t, 'c>> {
        self.node(id)?;
        Ok(ColumnView::new(self, id, *ctx, filt))
    }

    /// Tri-state AND/OR, left to right, stopping at the deciding operand
    fn eval_bool(
        &self,
        op: BoolOperator,
        values: &[NodeId],
        index: usize,
        ctx: &EvalContext<'_>,
        filt: bool,
    ) -> FormulaResult<Value> {
        let (mut carry, deciding) = match op {
            BoolOperator::And => (1, false),
            BoolOperator::Or => (0, true),
        };
        for value in values {
            let value = self.fvalue(*value, index, ctx, filt)?;
            if value.is_missing() {
                carry = INT_MISSING;
                continue;
            }
            if value.is_truthy() == deciding {
                return Ok(Value::Integer(i32::from(deciding)));
            }
        }
        Ok(Value::Integer(carry))
    }

    fn eval_compare(
        &self,
        left: NodeId,
        ops: &[CompareOperator],
        comparators: &[NodeId],
        index: usize,
        ctx: &EvalContext<'_>,
        filt: bool,
    ) -> FormulaResult<Value> {
        let mut v1 = self.fvalue(left, index, ctx, filt)?;
        if v1.is_missing() {
            return Ok(Value::Integer(INT_MISSING));
        }
        for (op, comparator) in ops.iter().zip(comparators) {
            let v2 = self.fvalue(*comparator, index, ctx, filt)?;
            if v2.is_missing() {
                return Ok(Value::Integer(INT_MISSING));
            }
            if !operators::compare(&v1, *op, &v2) {
                return Ok(Value::Integer(0));
            }
            v1 = v2;
        }
        Ok(Value::Integer(1))
    }

    fn eval_call(
        &self,
        id: NodeId,
        call: &CallNode,
        index: usize,
        ctx: &EvalContext<'_>,
        filt: bool,
    ) -> FormulaResult<Value> {
        let def = call.function();
        let domain = Domain::for_data_type(self.call_types(call)?.0);

        match def.evaluation {
            Evaluation::Offset => {
                let (value, offset) = match call.args() {
                    [value, offset, ..] => (*value, *offset),
                    _ => {
                        return Err(FormulaError::InvalidNode(format!(
                            "{} requires a value and an offset",
                            def.name
                        )))
                    }
                };
                let offset = convert(&self.fvalue(offset, index, ctx, false)?, Domain::Integer);
                let target = match offset {
                    Value::Integer(n) if n != INT_MISSING => index as i64 - i64::from(n),
                    _ => return Ok(missing_of(domain)),
                };
                if target < 0 || target >= ctx.row_count as i64 {
                    return Ok(missing_of(domain));
                }
                let value = self.fvalue(value, target as usize, ctx, false)?;
                Ok(convert(&value, domain))
            }
            Evaluation::ColumnWise(function) => {
                let value = call.memo().get_or_try_init(|| -> FormulaResult<Value> {
                    let mut columns = Vec::with_capacity(call.args().len());
                    for (i, arg) in call.args().iter().enumerate() {
                        let arg_domain = def.arg_domain(i);
                        let column = self
                            .column_values(*arg, ctx, filt)?
                            .iter()
                            .map(|v| v.map(|v| convert_opt(v, arg_domain)))
                            .collect::<FormulaResult<Vec<_>>>()?;
                        columns.push(column);
                    }
                    let rows = columns.first().map_or(0, Vec::len);
                    for param in def.params.iter().skip(columns.len()) {
                        if let ParamDefault::Value(default) = &param.default {
                            let default = convert_opt(default.clone(), param.domain);
                            columns.push(vec![default; rows]);
                        }
                    }
                    let result = convert(&function(&columns)?, domain);
                    trace!(node = %id, function = def.name, rows, "memoized column-wise result");
                    Ok(result)
                })?;
                Ok(value.clone())
            }
            Evaluation::RowWise(function) => {
                let mut args = Vec::with_capacity(def.params.len().max(call.args().len()));
                for (i, arg) in call.args().iter().enumerate() {
                    let value = self.fvalue(*arg, index, ctx, false)?;
                    args.push(convert_opt(value, def.arg_domain(i)));
                }
                for param in def.params.iter().skip(args.len()) {
                    if let ParamDefault::Value(default) = &param.default {
                        args.push(convert_opt(default.clone(), param.domain));
                    }
                }
                Ok(convert(&function(index, &args)?, domain))
            }
        }
    }

    fn call_types(&self, call: &CallNode) -> FormulaResult<(DataType, MeasureType)> {
        call.types()
            .get_or_try_init(|| {
                let def = call.function();
                if call.args().is_empty() || def.returns.is_empty() {
                    return Ok((def.data_type, def.measure_type));
                }
                let mut deriving = Vec::with_capacity(def.returns.len());
                for &i in &def.returns {
                    if let Some(arg) = call.args().get(i) {
                        deriving.push((self.data_type(*arg)?, self.measure_type(*arg)?));
                    }
                }
                Ok(derive_types(&deriving))
            })
            .copied()
    }

    /// Whether a node is built from literals only
    pub fn is_atomic(&self, id: NodeId) -> FormulaResult<bool> {
        match &self.node(id)?.kind {
            NodeKind::Literal(_) => Ok(true),
            NodeKind::Column(_) | NodeKind::Call(_) => Ok(false),
            kind => {
                for child in kind.children() {
                    if !self.is_atomic(child)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }

    pub fn data_type(&self, id: NodeId) -> FormulaResult<DataType> {
        match &self.node(id)?.kind {
            NodeKind::Literal(value) => Ok(value.data_type()),
            NodeKind::Column(column) => Ok(column.source().data_type()),
            NodeKind::Unary { op, operand } => {
                Ok(operators::unary_data_type(*op, self.data_type(*operand)?))
            }
            NodeKind::Bool { .. } | NodeKind::Compare { .. } => Ok(DataType::Integer),
            NodeKind::Binary { op, left, right } => Ok(operators::binary_data_type(
                *op,
                self.data_type(*left)?,
                self.data_type(*right)?,
            )),
            NodeKind::Call(call) => Ok(self.call_types(call)?.0),
        }
    }

    pub fn measure_type(&self, id: NodeId) -> FormulaResult<MeasureType> {
        match &self.node(id)?.kind {
            NodeKind::Literal(Value::Integer(_)) => Ok(MeasureType::Ordinal),
            NodeKind::Literal(Value::Decimal(_)) => Ok(MeasureType::Continuous),
            NodeKind::Literal(_) => Ok(MeasureType::Nominal),
            NodeKind::Column(column) => Ok(column.source().measure_type()),
            NodeKind::Unary { op, operand } => Ok(operators::unary_measure_type(
                *op,
                self.data_type(*operand)?,
                self.measure_type(*operand)?,
            )),
            NodeKind::Bool { .. } | NodeKind::Compare { .. } => Ok(MeasureType::Nominal),
            NodeKind::Binary { op, left, right } => Ok(operators::binary_measure_type(
                *op,
                self.measure_type(*left)?,
                self.measure_type(*right)?,
                self.data_type(id)?,
            )),
            NodeKind::Call(call) => Ok(self.call_types(call)?.1),
        }
    }

    pub fn has_levels(&self, id: NodeId) -> FormulaResult<bool> {
        match &self.node(id)?.kind {
            NodeKind::Literal(value) => Ok(value.is_text()),
            NodeKind::Column(column) => Ok(column.source().has_levels()),
            NodeKind::Compare { .. } | NodeKind::Call(_) => Ok(true),
            _ => Ok(false),
        }
    }

    /// Levels of a node; calls discover theirs by scanning their column
    pub fn levels(&self, id: NodeId, ctx: &EvalContext<'_>) -> FormulaResult<Vec<Level>> {
        match &self.node(id)?.kind {
            NodeKind::Literal(Value::Text(s)) => Ok(vec![Level::new(0, s.clone())]),
            NodeKind::Column(column) => Ok(column.source().levels()),
            NodeKind::Compare { .. } => Ok(vec![Level::new(1, "true"), Level::new(0, "false")]),
            NodeKind::Call(call) => self.call_levels(id, call, ctx),
            _ => Ok(Vec::new()),
        }
    }

    fn call_levels(
        &self,
        id: NodeId,
        call: &CallNode,
        ctx: &EvalContext<'_>,
    ) -> FormulaResult<Vec<Level>> {
        let def = call.function();
        if def.level_args.is_empty() || call.args().is_empty() {
            return Ok(Vec::new());
        }
        let (data_type, measure_type) = self.call_types(call)?;
        if data_type != DataType::Text || measure_type == MeasureType::Id {
            return Ok(Vec::new());
        }

        let mut candidates = Vec::new();
        for &i in &def.level_args {
            let Some(&arg) = call.args().get(i) else {
                continue;
            };
            if self.has_levels(arg)? {
                candidates.extend(self.levels(arg, ctx)?.into_iter().map(|l| l.label));
            }
        }

        discover_levels(candidates, self.column_values(id, ctx, false)?.iter())
    }

    /// Whether the node's values depend on a whole-column function
    pub fn uses_column_formula(&self, id: NodeId) -> FormulaResult<bool> {
        let node = self.node(id)?;
        match &node.kind {
            NodeKind::Literal(_) => return Ok(false),
            NodeKind::Column(column) => return Ok(column.source().uses_column_formula()),
            NodeKind::Call(call) if call.function().is_column_wise() => return Ok(true),
            _ => {}
        }
        for child in node.kind.children() {
            if self.uses_column_formula(child)? {
                return Ok(true);
            }
        }
        Ok(false)
    }
}
