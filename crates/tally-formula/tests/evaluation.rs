//! Evaluation tests over formula trees backed by in-memory columns

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tally_core::{
    ColumnResolver, DataColumn, DataType, Domain, Level, MeasureType, Value, ValueSource,
    INT_MISSING,
};
use tally_formula::{
    BinaryOperator, CompareOperator, EvalContext, FormulaError, FormulaExpr, FormulaTree,
    FunctionDef, FunctionRegistry, NodeKind, ParamDef,
};

/// Column source counting how often it is read
struct RecordingSource {
    column: DataColumn,
    reads: AtomicUsize,
}

impl RecordingSource {
    fn new(column: DataColumn) -> Self {
        Self {
            column,
            reads: AtomicUsize::new(0),
        }
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl ValueSource for RecordingSource {
    fn name(&self) -> &str {
        self.column.name()
    }

    fn value_at(&self, row: usize) -> tally_core::Result<Value> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.column.value_at(row)
    }

    fn data_type(&self) -> DataType {
        self.column.data_type()
    }

    fn measure_type(&self) -> MeasureType {
        self.column.measure_type()
    }

    fn levels(&self) -> Vec<Level> {
        self.column.levels()
    }
}

#[derive(Default)]
struct Columns(HashMap<String, Arc<dyn ValueSource>>);

impl Columns {
    fn with(mut self, column: DataColumn) -> Self {
        self.0.insert(column.name().to_string(), Arc::new(column));
        self
    }

    fn with_source(mut self, source: Arc<dyn ValueSource>) -> Self {
        self.0.insert(source.name().to_string(), source);
        self
    }
}

impl ColumnResolver for Columns {
    fn resolve(&self, name: &str) -> Option<Arc<dyn ValueSource>> {
        self.0.get(name).cloned()
    }
}

fn col(name: &str) -> FormulaExpr {
    FormulaExpr::column(name)
}

fn num(n: f64) -> FormulaExpr {
    FormulaExpr::number(n)
}

fn bin(left: FormulaExpr, op: BinaryOperator, right: FormulaExpr) -> FormulaExpr {
    FormulaExpr::binary(left, op, right)
}

fn eval_all(tree: &FormulaTree, root: tally_formula::NodeId, rows: usize) -> Vec<Value> {
    let ctx = EvalContext::new(rows);
    tree.column_values(root, &ctx, false).unwrap().to_vec().unwrap()
}

#[test]
fn test_missing_propagates_through_arithmetic() {
    let columns = Columns::default().with(DataColumn::decimal("x", [1.5, f64::NAN]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&bin(col("x"), BinaryOperator::Add, num(1.0)), &columns)
        .unwrap();

    let values = eval_all(&tree, root, 2);
    assert_eq!(values[0], Value::Decimal(2.5));
    assert!(values[1].is_missing());
    assert_eq!(tree.data_type(root).unwrap(), DataType::Decimal);
    assert_eq!(tree.measure_type(root).unwrap(), MeasureType::Continuous);
}

#[test]
fn test_division_by_zero_is_missing() {
    let columns = Columns::default().with(DataColumn::integer("x", [4, 0]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&bin(num(8.0), BinaryOperator::Divide, col("x")), &columns)
        .unwrap();

    let values = eval_all(&tree, root, 2);
    assert_eq!(values[0], Value::Decimal(2.0));
    assert!(values[1].is_missing());
}

#[test]
fn test_and_short_circuits() {
    let source = Arc::new(RecordingSource::new(DataColumn::integer("r", [1])));
    let columns = Columns::default().with_source(source.clone());
    let mut tree = FormulaTree::with_default_registry();
    let ctx = EvalContext::new(1);

    let root = tree
        .compile(&FormulaExpr::and(vec![num(0.0), col("r")]), &columns)
        .unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(0));
    assert_eq!(source.reads(), 0);

    let root = tree
        .compile(&FormulaExpr::or(vec![num(1.0), col("r")]), &columns)
        .unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(1));
    assert_eq!(source.reads(), 0);

    let root = tree
        .compile(&FormulaExpr::and(vec![num(1.0), col("r")]), &columns)
        .unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(1));
    assert_eq!(source.reads(), 1);
}

#[test]
fn test_boolean_missing_carry() {
    let columns = Columns::default().with(DataColumn::integer("m", [INT_MISSING]));
    let mut tree = FormulaTree::with_default_registry();
    let ctx = EvalContext::new(1);

    // missing does not stop the scan; a later false still decides
    let root = tree
        .compile(&FormulaExpr::and(vec![col("m"), num(0.0)]), &columns)
        .unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(0));

    let root = tree
        .compile(&FormulaExpr::and(vec![col("m"), num(1.0)]), &columns)
        .unwrap();
    assert!(tree.fvalue(root, 0, &ctx, false).unwrap().is_missing());

    let root = tree
        .compile(&FormulaExpr::or(vec![col("m"), num(0.0)]), &columns)
        .unwrap();
    assert!(tree.fvalue(root, 0, &ctx, false).unwrap().is_missing());
}

#[test]
fn test_comparison_chains() {
    let columns = Columns::default().with(DataColumn::decimal("x", [f64::NAN]));
    let mut tree = FormulaTree::with_default_registry();
    let ctx = EvalContext::new(1);
    let chain = |a: FormulaExpr, b: FormulaExpr, c: FormulaExpr| {
        FormulaExpr::compare(
            a,
            vec![(CompareOperator::LessThan, b), (CompareOperator::LessThan, c)],
        )
    };

    let root = tree.compile(&chain(num(1.0), num(2.0), num(0.0)), &columns).unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(0));

    let root = tree.compile(&chain(num(1.0), num(2.0), num(3.0)), &columns).unwrap();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(1));
    assert!(tree.is_atomic(root).unwrap());

    let root = tree.compile(&chain(num(1.0), col("x"), num(3.0)), &columns).unwrap();
    assert_eq!(
        tree.fvalue(root, 0, &ctx, false).unwrap(),
        Value::Integer(INT_MISSING)
    );
    assert!(!tree.is_atomic(root).unwrap());
    assert_eq!(
        tree.levels(root, &ctx).unwrap(),
        vec![Level::new(1, "true"), Level::new(0, "false")]
    );
}

#[test]
fn test_float_equality_uses_tolerance() {
    let columns = Columns::default();
    let mut tree = FormulaTree::with_default_registry();
    let expr = FormulaExpr::compare(
        bin(num(0.1), BinaryOperator::Add, num(0.2)),
        vec![(CompareOperator::Equal, num(0.3))],
    );
    let root = tree.compile(&expr, &columns).unwrap();
    assert_eq!(
        tree.fvalue(root, 0, &EvalContext::new(1), false).unwrap(),
        Value::Integer(1)
    );
}

static COUNTED_CALLS: AtomicUsize = AtomicUsize::new(0);

fn fn_counted(args: &[Vec<Value>]) -> tally_formula::FormulaResult<Value> {
    COUNTED_CALLS.fetch_add(1, Ordering::SeqCst);
    Ok(Value::Integer(args[0].len() as i32))
}

#[test]
fn test_column_wise_result_is_memoized_until_invalidated() {
    let mut registry = FunctionRegistry::new();
    registry.register(
        FunctionDef::column_wise(
            "COUNTED",
            vec![ParamDef::new("values", Domain::Decimal)],
            fn_counted,
        )
        .returns(DataType::Integer, MeasureType::Continuous, &[]),
    );
    let columns = Columns::default().with(DataColumn::decimal("x", [1.0, 2.0, 3.0]));
    let mut tree = FormulaTree::new(Arc::new(registry));
    let root = tree
        .compile(&FormulaExpr::call("COUNTED", vec![col("x")]), &columns)
        .unwrap();
    let ctx = EvalContext::new(3);

    assert!(tree.needs_recalc(root).unwrap());
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Integer(3));
    assert_eq!(tree.fvalue(root, 2, &ctx, false).unwrap(), Value::Integer(3));
    assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 1);
    assert!(!tree.needs_recalc(root).unwrap());
    assert!(tree.uses_column_formula(root).unwrap());

    // invalidation from the column leaf reaches the call
    let leaf = tree.column_nodes("x")[0];
    assert_eq!(tree.notify_recalc(leaf).unwrap(), vec![root]);
    assert!(tree.needs_recalc(root).unwrap());
    tree.fvalue(root, 1, &ctx, false).unwrap();
    assert_eq!(COUNTED_CALLS.load(Ordering::SeqCst), 2);
}

#[test]
fn test_whole_column_functions_respect_filter() {
    let columns = Columns::default().with(DataColumn::decimal("x", [10.0, 1.0, 2.0]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&FormulaExpr::call("VSUM", vec![col("x")]), &columns)
        .unwrap();
    let mask = vec![true, false, false];
    let ctx = EvalContext::new(3).with_filter(&mask);

    assert_eq!(tree.fvalue(root, 0, &ctx, true).unwrap(), Value::Decimal(3.0));

    tree.invalidate_all();
    assert_eq!(tree.fvalue(root, 0, &ctx, false).unwrap(), Value::Decimal(13.0));

    let filtered: Vec<Value> = tree
        .column_values(root, &ctx, true)
        .unwrap()
        .iter()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(filtered.len(), 2);
}

#[test]
fn test_row_wise_defaults_are_padded() {
    let columns = Columns::default().with(DataColumn::decimal("x", [2.46]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&FormulaExpr::call("ROUND", vec![col("x")]), &columns)
        .unwrap();
    assert_eq!(eval_all(&tree, root, 1), vec![Value::Decimal(2.0)]);
    assert!(!tree.uses_column_formula(root).unwrap());
    // row-wise calls never hold a memo
    assert!(tree.needs_recalc(root).unwrap());
}

#[test]
fn test_sub_functions_are_synthesized_and_released() {
    let columns = Columns::default().with(DataColumn::decimal("x", [1.0, 2.0, 3.0]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&FormulaExpr::call("Z", vec![col("x")]), &columns)
        .unwrap();

    let call = match tree.node(root).unwrap().kind() {
        NodeKind::Call(call) => call,
        other => panic!("expected call, got {:?}", other),
    };
    assert_eq!(call.args().len(), 3);
    assert_eq!(call.user_args().len(), 1);
    let x = call.user_args()[0];
    let synthesized = call.synthesized_args().to_vec();

    // x feeds Z itself and both sub-functions
    let mut parents = tree.parents(x).unwrap().to_vec();
    parents.sort();
    let mut expected = vec![root, synthesized[0], synthesized[1]];
    expected.sort();
    assert_eq!(parents, expected);

    let values = eval_all(&tree, root, 3);
    assert_eq!(values, vec![Value::Decimal(-1.0), Value::Decimal(0.0), Value::Decimal(1.0)]);
    assert!(tree.uses_column_formula(root).unwrap());

    assert!(tree.release(x).is_err());
    tree.release(root).unwrap();
    assert!(tree.is_empty());
    assert!(matches!(
        tree.fvalue(root, 0, &EvalContext::new(3), false),
        Err(FormulaError::ReleasedNode(_))
    ));
}

#[test]
fn test_explicit_sub_function_arguments() {
    let columns = Columns::default().with(DataColumn::decimal("x", [4.0]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(
            &FormulaExpr::call("Z", vec![col("x"), num(2.0), num(0.5)]),
            &columns,
        )
        .unwrap();
    assert_eq!(eval_all(&tree, root, 1), vec![Value::Decimal(4.0)]);
    assert!(!tree.uses_column_formula(root).unwrap());

    // a partial set of sub-function arguments is not completed
    let err = tree
        .compile(&FormulaExpr::call("Z", vec![col("x"), num(2.0)]), &columns)
        .unwrap_err();
    assert!(matches!(err, FormulaError::ArgumentCount { .. }));
    assert_eq!(tree.len(), 4);
}

#[test]
fn test_offset_lags_rows() {
    let columns = Columns::default().with(DataColumn::integer("x", [10, 20, 30]));
    let mut tree = FormulaTree::with_default_registry();
    let root = tree
        .compile(&FormulaExpr::call("OFFSET", vec![col("x"), num(1.0)]), &columns)
        .unwrap();

    assert_eq!(tree.data_type(root).unwrap(), DataType::Integer);
    assert_eq!(
        eval_all(&tree, root, 3),
        vec![Value::Integer(INT_MISSING), Value::Integer(10), Value::Integer(20)]
    );

    let lead = tree
        .compile(&FormulaExpr::call("OFFSET", vec![col("x"), num(-1.0)]), &columns)
        .unwrap();
    assert_eq!(
        eval_all(&tree, lead, 3),
        vec![Value::Integer(20), Value::Integer(30), Value::Integer(INT_MISSING)]
    );
}

#[test]
fn test_levels_are_discovered_from_used_values() {
    let columns = Columns::default().with(DataColumn::integer("x", [1, 2, 3]));
    let mut tree = FormulaTree::with_default_registry();
    let expr = FormulaExpr::call(
        "IF",
        vec![
            FormulaExpr::compare(col("x"), vec![(CompareOperator::GreaterThan, num(1.0))]),
            FormulaExpr::text("big"),
            FormulaExpr::text("small"),
        ],
    );
    let root = tree.compile(&expr, &columns).unwrap();
    let ctx = EvalContext::new(3);

    assert_eq!(tree.data_type(root).unwrap(), DataType::Text);
    assert_eq!(tree.measure_type(root).unwrap(), MeasureType::Nominal);
    assert!(tree.has_levels(root).unwrap());

    let levels = tree.levels(root, &ctx).unwrap();
    assert_eq!(levels, vec![Level::new(0, "small"), Level::new(1, "big")]);
    assert_eq!(tree.levels(root, &ctx).unwrap(), levels);

    // unused candidates are dropped
    let levels = tree.levels(root, &EvalContext::new(1)).unwrap();
    assert_eq!(levels, vec![Level::new(0, "small")]);
}

#[test]
fn test_call_type_inference() {
    let columns = Columns::default()
        .with(DataColumn::integer("n", [1]).with_measure_type(MeasureType::Ordinal))
        .with(DataColumn::decimal("d", [1.0]));
    let mut tree = FormulaTree::with_default_registry();

    let root = tree
        .compile(&FormulaExpr::call("ABS", vec![col("n")]), &columns)
        .unwrap();
    assert_eq!(tree.data_type(root).unwrap(), DataType::Integer);
    assert_eq!(tree.measure_type(root).unwrap(), MeasureType::Ordinal);

    let root = tree
        .compile(
            &FormulaExpr::call("IF", vec![col("n"), col("d"), col("n")]),
            &columns,
        )
        .unwrap();
    assert_eq!(tree.data_type(root).unwrap(), DataType::Decimal);
    assert_eq!(tree.measure_type(root).unwrap(), MeasureType::Continuous);

    // no deriving argument supplied: static metadata
    let root = tree.compile(&FormulaExpr::call("ROW", vec![]), &columns).unwrap();
    assert_eq!(tree.data_type(root).unwrap(), DataType::Integer);
    assert_eq!(tree.fvalue(root, 4, &EvalContext::new(5), false).unwrap(), Value::Integer(5));
}

#[test]
fn test_literals() {
    let columns = Columns::default();
    let mut tree = FormulaTree::with_default_registry();
    let ctx = EvalContext::new(1);

    let int = tree.compile(&num(3.0), &columns).unwrap();
    assert_eq!(tree.data_type(int).unwrap(), DataType::Integer);
    assert_eq!(tree.measure_type(int).unwrap(), MeasureType::Ordinal);
    assert!(!tree.has_levels(int).unwrap());

    let dec = tree.compile(&num(3.5), &columns).unwrap();
    assert_eq!(tree.data_type(dec).unwrap(), DataType::Decimal);
    assert_eq!(tree.measure_type(dec).unwrap(), MeasureType::Continuous);

    let text = tree.compile(&FormulaExpr::text("hi"), &columns).unwrap();
    assert_eq!(tree.data_type(text).unwrap(), DataType::Text);
    assert_eq!(tree.levels(text, &ctx).unwrap(), vec![Level::new(0, "hi")]);
    assert!(tree.is_atomic(text).unwrap());
}

#[test]
fn test_compile_errors_leave_no_nodes() {
    let columns = Columns::default().with(DataColumn::integer("x", [1]));
    let mut tree = FormulaTree::with_default_registry();

    let err = tree
        .compile(&FormulaExpr::call("NOPE", vec![col("x")]), &columns)
        .unwrap_err();
    assert!(matches!(err, FormulaError::UnknownFunction(name) if name == "NOPE"));

    let err = tree
        .compile(&bin(col("x"), BinaryOperator::Add, col("missing")), &columns)
        .unwrap_err();
    assert!(matches!(err, FormulaError::UnknownColumn(name) if name == "missing"));

    let err = tree
        .compile(&FormulaExpr::call("ABS", vec![col("x"), col("x")]), &columns)
        .unwrap_err();
    assert!(matches!(err, FormulaError::ArgumentCount { .. }));

    assert!(tree.is_empty());
}

#[test]
fn test_notifications_reach_every_root() {
    let columns = Columns::default().with(DataColumn::integer("x", [1]));
    let mut tree = FormulaTree::with_default_registry();
    let x = tree.compile(&col("x"), &columns).unwrap();
    let one = tree.number(1.0);
    let a = tree.binary(BinaryOperator::Add, x, one).unwrap();
    let b = tree.unary(tally_formula::UnaryOperator::Negate, x).unwrap();

    let mut roots = tree.notify_reparse(x).unwrap();
    roots.sort();
    assert_eq!(roots, vec![a, b]);
    assert_eq!(tree.notify_recalc(one).unwrap(), vec![a]);
    assert!(!tree.needs_recalc(a).unwrap());

    tree.release(a).unwrap();
    assert!(tree.is_live(x));
    assert!(!tree.is_live(one));
    tree.release(b).unwrap();
    assert!(tree.is_empty());
}
