//! Function registry and built-in functions
//!
//! A function is described by a [`FunctionDef`]: its declared parameters,
//! whether it is evaluated per row or over whole columns, the static result
//! type, and the argument positions that drive result-type derivation and
//! level discovery. The evaluator only relies on this metadata and the
//! calling contract; the bodies live in the submodules.

pub mod logical;
pub mod math;
pub mod reference;
pub mod statistical;
pub mod text;

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::Lazy;
use tally_core::{DataType, Domain, MeasureType, Value};

use crate::error::FormulaResult;

/// Row-wise implementation: receives the row index and one converted value
/// per argument
pub type RowFn = fn(usize, &[Value]) -> FormulaResult<Value>;

/// Column-wise implementation: receives every argument as a full column of
/// converted values
pub type ColumnFn = fn(&[Vec<Value>]) -> FormulaResult<Value>;

/// How a function is evaluated
#[derive(Clone, Copy)]
pub enum Evaluation {
    RowWise(RowFn),
    /// Computed once over whole columns and memoized
    ColumnWise(ColumnFn),
    /// Lag/lead: the evaluator re-evaluates the first argument at
    /// `row - offset`
    Offset,
}

impl fmt::Debug for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Evaluation::RowWise(_) => f.write_str("RowWise"),
            Evaluation::ColumnWise(_) => f.write_str("ColumnWise"),
            Evaluation::Offset => f.write_str("Offset"),
        }
    }
}

/// Default of a declared parameter
#[derive(Debug, Clone, PartialEq)]
pub enum ParamDefault {
    Required,
    /// Plain value used when the argument is omitted
    Value(Value),
    /// Sub-function called with the shared leading arguments when omitted
    Function(&'static str),
}

/// Declared parameter of a function (the implicit row index excluded)
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub name: &'static str,
    /// Domain arguments are converted into; `None` passes them through
    pub domain: Option<Domain>,
    pub default: ParamDefault,
}

impl ParamDef {
    pub fn new(name: &'static str, domain: Domain) -> Self {
        Self {
            name,
            domain: Some(domain),
            default: ParamDefault::Required,
        }
    }

    pub fn untyped(name: &'static str) -> Self {
        Self {
            name,
            domain: None,
            default: ParamDefault::Required,
        }
    }

    pub fn with_default<V: Into<Value>>(mut self, value: V) -> Self {
        self.default = ParamDefault::Value(value.into());
        self
    }

    pub fn with_sub_function(mut self, name: &'static str) -> Self {
        self.default = ParamDefault::Function(name);
        self
    }
}

/// Function definition
#[derive(Debug, Clone)]
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    pub params: Vec<ParamDef>,
    /// Last parameter repeats
    pub variadic: bool,
    pub evaluation: Evaluation,
    /// Result type when it does not depend on the arguments
    pub data_type: DataType,
    pub measure_type: MeasureType,
    /// Argument positions whose types determine the result type
    pub returns: Vec<usize>,
    /// Argument positions whose levels seed level discovery
    pub level_args: Vec<usize>,
}

impl FunctionDef {
    pub fn row_wise(name: &'static str, params: Vec<ParamDef>, implementation: RowFn) -> Self {
        Self::with_evaluation(name, params, Evaluation::RowWise(implementation))
    }

    pub fn column_wise(
        name: &'static str,
        params: Vec<ParamDef>,
        implementation: ColumnFn,
    ) -> Self {
        Self::with_evaluation(name, params, Evaluation::ColumnWise(implementation))
    }

    pub fn with_evaluation(
        name: &'static str,
        params: Vec<ParamDef>,
        evaluation: Evaluation,
    ) -> Self {
        Self {
            name,
            params,
            variadic: false,
            evaluation,
            data_type: DataType::Decimal,
            measure_type: MeasureType::Continuous,
            returns: Vec::new(),
            level_args: Vec::new(),
        }
    }

    /// Static result type, optionally derived from argument positions
    pub fn returns(mut self, data_type: DataType, measure_type: MeasureType, args: &[usize]) -> Self {
        self.data_type = data_type;
        self.measure_type = measure_type;
        self.returns = args.to_vec();
        self
    }

    pub fn levels(mut self, args: &[usize]) -> Self {
        self.level_args = args.to_vec();
        self
    }

    pub fn variadic(mut self) -> Self {
        self.variadic = true;
        self
    }

    pub fn is_column_wise(&self) -> bool {
        matches!(self.evaluation, Evaluation::ColumnWise(_))
    }

    pub fn is_row_wise(&self) -> bool {
        !self.is_column_wise()
    }

    /// Index of the first of the trailing parameters whose default is a
    /// sub-function; the parameters before it are the shared arguments
    pub fn sub_function_start(&self) -> usize {
        let trailing = self
            .params
            .iter()
            .rev()
            .take_while(|p| matches!(p.default, ParamDefault::Function(_)))
            .count();
        self.params.len() - trailing
    }

    /// Fewest arguments accepted once sub-functions have been synthesized
    pub fn min_args(&self) -> usize {
        self.params
            .iter()
            .rposition(|p| !matches!(p.default, ParamDefault::Value(_)))
            .map_or(0, |i| i + 1)
    }

    /// Most arguments accepted (`None` = unlimited)
    pub fn max_args(&self) -> Option<usize> {
        if self.variadic {
            None
        } else {
            Some(self.params.len())
        }
    }

    /// Declared domain for an argument position; trailing arguments reuse
    /// the last declared domain
    pub fn arg_domain(&self, index: usize) -> Option<Domain> {
        if self.params.is_empty() {
            return None;
        }
        let i = index.min(self.params.len() - 1);
        self.params[i].domain
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, Arc<FunctionDef>>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_statistical_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_reference_functions();

        registry
    }

    /// Create a registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: AHashMap::new(),
        }
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> Option<Arc<FunctionDef>> {
        self.functions.get(&name.to_uppercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_uppercase())
    }

    /// Register a function, replacing any previous one with the same name
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), Arc::new(def));
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn register_math_functions(&mut self) {
        use Domain::{Decimal, Integer};

        // ABS keeps the type of its argument
        self.register(
            FunctionDef::row_wise("ABS", vec![ParamDef::new("value", Decimal)], math::fn_abs)
                .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );
        self.register(FunctionDef::row_wise(
            "EXP",
            vec![ParamDef::new("value", Decimal)],
            math::fn_exp,
        ));
        self.register(FunctionDef::row_wise(
            "LN",
            vec![ParamDef::new("value", Decimal)],
            math::fn_ln,
        ));
        self.register(FunctionDef::row_wise(
            "LOG10",
            vec![ParamDef::new("value", Decimal)],
            math::fn_log10,
        ));
        self.register(FunctionDef::row_wise(
            "SQRT",
            vec![ParamDef::new("value", Decimal)],
            math::fn_sqrt,
        ));
        self.register(
            FunctionDef::row_wise("INT", vec![ParamDef::new("value", Decimal)], math::fn_int)
                .returns(DataType::Integer, MeasureType::Continuous, &[]),
        );
        self.register(FunctionDef::row_wise(
            "ROUND",
            vec![
                ParamDef::new("value", Decimal),
                ParamDef::new("digits", Integer).with_default(0),
            ],
            math::fn_round,
        ));
        self.register(FunctionDef::row_wise(
            "BOXCOX",
            vec![
                ParamDef::new("value", Decimal),
                ParamDef::new("lambda", Decimal).with_default(0.0),
            ],
            math::fn_boxcox,
        ));

        // Z and SCALE standardise against whole-column statistics
        for name in ["Z", "SCALE"] {
            self.register(FunctionDef::row_wise(
                name,
                vec![
                    ParamDef::new("value", Decimal),
                    ParamDef::new("mean", Decimal).with_sub_function("VMEAN"),
                    ParamDef::new("sd", Decimal).with_sub_function("VSTDEV"),
                ],
                math::fn_z,
            ));
        }
    }

    fn register_statistical_functions(&mut self) {
        use Domain::Decimal;

        // Row-wise, across arguments
        self.register(
            FunctionDef::row_wise("SUM", vec![ParamDef::new("values", Decimal)], statistical::fn_sum)
                .variadic(),
        );
        self.register(
            FunctionDef::row_wise(
                "MEAN",
                vec![ParamDef::new("values", Decimal)],
                statistical::fn_mean,
            )
            .variadic(),
        );
        self.register(
            FunctionDef::row_wise("MIN", vec![ParamDef::new("values", Decimal)], statistical::fn_min)
                .variadic()
                .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );
        self.register(
            FunctionDef::row_wise("MAX", vec![ParamDef::new("values", Decimal)], statistical::fn_max)
                .variadic()
                .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );

        // Whole-column
        self.register(
            FunctionDef::column_wise(
                "VSUM",
                vec![ParamDef::new("values", Decimal)],
                statistical::fn_vsum,
            )
            .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );
        self.register(FunctionDef::column_wise(
            "VMEAN",
            vec![ParamDef::new("values", Decimal)],
            statistical::fn_vmean,
        ));
        self.register(FunctionDef::column_wise(
            "VMED",
            vec![ParamDef::new("values", Decimal)],
            statistical::fn_vmed,
        ));
        self.register(
            FunctionDef::column_wise(
                "VMIN",
                vec![ParamDef::new("values", Decimal)],
                statistical::fn_vmin,
            )
            .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );
        self.register(
            FunctionDef::column_wise(
                "VMAX",
                vec![ParamDef::new("values", Decimal)],
                statistical::fn_vmax,
            )
            .returns(DataType::Decimal, MeasureType::Continuous, &[0]),
        );
        self.register(FunctionDef::column_wise(
            "VVAR",
            vec![ParamDef::new("values", Decimal)],
            statistical::fn_vvar,
        ));
        self.register(FunctionDef::column_wise(
            "VSTDEV",
            vec![ParamDef::new("values", Decimal)],
            statistical::fn_vstdev,
        ));
        self.register(FunctionDef::column_wise(
            "VSE",
            vec![ParamDef::new("values", Decimal)],
            statistical::fn_vse,
        ));
        self.register(
            FunctionDef::column_wise("VN", vec![ParamDef::untyped("values")], statistical::fn_vn)
                .returns(DataType::Integer, MeasureType::Continuous, &[]),
        );
        self.register(
            FunctionDef::column_wise(
                "VROWS",
                vec![ParamDef::untyped("values")],
                statistical::fn_vrows,
            )
            .returns(DataType::Integer, MeasureType::Continuous, &[]),
        );
    }

    fn register_logical_functions(&mut self) {
        self.register(
            FunctionDef::row_wise(
                "IF",
                vec![
                    ParamDef::new("condition", Domain::Integer),
                    ParamDef::untyped("then").with_default(1),
                    ParamDef::untyped("otherwise").with_default(Value::Integer(tally_core::INT_MISSING)),
                ],
                logical::fn_if,
            )
            .returns(DataType::Integer, MeasureType::Nominal, &[1, 2])
            .levels(&[1, 2]),
        );
        self.register(
            FunctionDef::row_wise(
                "IFMISS",
                vec![
                    ParamDef::untyped("value"),
                    ParamDef::untyped("then").with_default(1),
                    ParamDef::untyped("otherwise").with_default(Value::Integer(tally_core::INT_MISSING)),
                ],
                logical::fn_ifmiss,
            )
            .returns(DataType::Integer, MeasureType::Nominal, &[1, 2])
            .levels(&[1, 2]),
        );
        self.register(
            FunctionDef::row_wise(
                "NOT",
                vec![ParamDef::new("value", Domain::Integer)],
                logical::fn_not,
            )
            .returns(DataType::Integer, MeasureType::Nominal, &[]),
        );
    }

    fn register_text_functions(&mut self) {
        self.register(
            FunctionDef::row_wise("TEXT", vec![ParamDef::new("value", Domain::Text)], text::fn_text)
                .returns(DataType::Text, MeasureType::Nominal, &[])
                .levels(&[0]),
        );
        self.register(FunctionDef::row_wise(
            "VALUE",
            vec![ParamDef::new("value", Domain::Decimal)],
            text::fn_value,
        ));
        self.register(
            FunctionDef::row_wise(
                "CONCAT",
                vec![ParamDef::new("values", Domain::Text)],
                text::fn_concat,
            )
            .variadic()
            .returns(DataType::Text, MeasureType::Nominal, &[]),
        );
    }

    fn register_reference_functions(&mut self) {
        self.register(
            FunctionDef::row_wise("ROW", Vec::new(), reference::fn_row)
                .returns(DataType::Integer, MeasureType::Continuous, &[]),
        );
        self.register(
            FunctionDef::with_evaluation(
                "OFFSET",
                vec![
                    ParamDef::untyped("value"),
                    ParamDef::new("offset", Domain::Integer),
                ],
                Evaluation::Offset,
            )
            .returns(DataType::Decimal, MeasureType::Continuous, &[0])
            .levels(&[0]),
        );
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static DEFAULT_REGISTRY: Lazy<Arc<FunctionRegistry>> = Lazy::new(|| Arc::new(FunctionRegistry::new()));

/// Shared registry holding the built-in functions
pub fn default_registry() -> Arc<FunctionRegistry> {
    Arc::clone(&DEFAULT_REGISTRY)
}

/// Argument as a decimal, missing when absent
pub(crate) fn decimal_arg(args: &[Value], index: usize) -> f64 {
    match args.get(index) {
        Some(Value::Decimal(v)) => *v,
        Some(Value::Integer(v)) if !args[index].is_missing() => f64::from(*v),
        _ => f64::NAN,
    }
}

/// Non-missing decimals of a column
pub(crate) fn present(values: &[Value]) -> Vec<f64> {
    values
        .iter()
        .filter_map(|v| match v {
            Value::Decimal(d) if !d.is_nan() => Some(*d),
            Value::Integer(i) if !v.is_missing() => Some(f64::from(*i)),
            _ => None,
        })
        .collect()
}

/// Missing sentinel of the same domain as `value`
pub(crate) fn missing_like(value: &Value) -> Value {
    let domain = match value {
        Value::Integer(_) => Domain::Integer,
        Value::Decimal(_) => Domain::Decimal,
        Value::Text(_) => Domain::Text,
        Value::Labeled { .. } => Domain::Labeled,
    };
    tally_core::missing_of(domain)
}
