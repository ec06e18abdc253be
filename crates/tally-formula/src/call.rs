//! Function call nodes
//!
//! A call owns its argument nodes, a shared handle to the function's
//! descriptor, and two lazily filled cells: the memoized whole-column
//! result and the inferred result types. The memo is the only state a node
//! gains after construction; it is cleared by explicit invalidation.

use std::fmt;
use std::sync::Arc;

use ahash::AHashMap;
use once_cell::sync::OnceCell;
use tally_core::convert::convert;
use tally_core::{DataType, Domain, Level, MeasureType, Value};

use crate::error::{FormulaError, FormulaResult};
use crate::functions::{FunctionDef, ParamDefault};
use crate::node::NodeId;

pub struct CallNode {
    function: Arc<FunctionDef>,
    args: Vec<NodeId>,
    /// Trailing arguments that were synthesized as sub-function calls
    synthesized: usize,
    memo: OnceCell<Value>,
    types: OnceCell<(DataType, MeasureType)>,
}

impl CallNode {
    pub(crate) fn new(function: Arc<FunctionDef>, args: Vec<NodeId>, synthesized: usize) -> Self {
        Self {
            function,
            args,
            synthesized,
            memo: OnceCell::new(),
            types: OnceCell::new(),
        }
    }

    pub fn function(&self) -> &FunctionDef {
        &self.function
    }

    pub fn name(&self) -> &'static str {
        self.function.name
    }

    /// All arguments, synthesized ones last
    pub fn args(&self) -> &[NodeId] {
        &self.args
    }

    /// Arguments written in the formula
    pub fn user_args(&self) -> &[NodeId] {
        &self.args[..self.args.len() - self.synthesized]
    }

    /// Arguments added as sub-function calls
    pub fn synthesized_args(&self) -> &[NodeId] {
        &self.args[self.args.len() - self.synthesized..]
    }

    /// Whether a whole-column result is currently cached
    pub fn is_memoized(&self) -> bool {
        self.memo.get().is_some()
    }

    pub(crate) fn memo(&self) -> &OnceCell<Value> {
        &self.memo
    }

    pub(crate) fn types(&self) -> &OnceCell<(DataType, MeasureType)> {
        &self.types
    }

    /// Drop the cached whole-column result; returns whether one was cached
    pub(crate) fn invalidate(&mut self) -> bool {
        self.memo.take().is_some()
    }
}

impl fmt::Debug for CallNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallNode")
            .field("function", &self.function.name)
            .field("args", &self.args)
            .field("synthesized", &self.synthesized)
            .field("memo", &self.memo.get())
            .finish()
    }
}

/// Sub-functions to synthesize for a call with `supplied` arguments
///
/// Sub-function parameters are filled only when the caller stopped at or
/// before the first of them; otherwise the caller supplies them all.
pub(crate) fn synthesis_plan(def: &FunctionDef, supplied: usize) -> Vec<&'static str> {
    let start = def.sub_function_start();
    if supplied > start {
        return Vec::new();
    }
    def.params[start..]
        .iter()
        .filter_map(|p| match p.default {
            ParamDefault::Function(name) => Some(name),
            _ => None,
        })
        .collect()
}

/// Validate the final argument count of a call
pub(crate) fn check_arity(def: &FunctionDef, count: usize) -> FormulaResult<()> {
    let min = def.min_args();
    let max = def.max_args();
    if count >= min && max.map_or(true, |max| count <= max) {
        return Ok(());
    }
    let expected = match max {
        None => format!("at least {}", min),
        Some(max) if max == min => min.to_string(),
        Some(max) => format!("{} to {}", min, max),
    };
    Err(FormulaError::ArgumentCount {
        function: def.name.to_string(),
        expected,
        actual: count,
    })
}

/// Result types from the types of the type-deriving arguments
///
/// Decimal wins over integer; text wins over both and ends the scan.
pub(crate) fn derive_types(deriving: &[(DataType, MeasureType)]) -> (DataType, MeasureType) {
    let mut data_type = DataType::Integer;
    for (dt, _) in deriving {
        match dt {
            DataType::Decimal => data_type = DataType::Decimal,
            DataType::Text => {
                data_type = DataType::Text;
                break;
            }
            DataType::Integer => {}
        }
    }

    let has = |m: MeasureType| deriving.iter().any(|(_, mt)| *mt == m);
    let measure_type = if data_type == DataType::Decimal {
        MeasureType::Continuous
    } else if has(MeasureType::Id) {
        MeasureType::Id
    } else if has(MeasureType::Ordinal) {
        MeasureType::Ordinal
    } else {
        MeasureType::Nominal
    };

    (data_type, measure_type)
}

/// Keep the candidate labels that occur in `values`, coded by first use
pub(crate) fn discover_levels<I>(candidates: Vec<String>, values: I) -> FormulaResult<Vec<Level>>
where
    I: IntoIterator<Item = FormulaResult<Value>>,
{
    let mut seen: AHashMap<String, bool> = AHashMap::with_capacity(candidates.len());
    for label in candidates {
        seen.entry(label).or_insert(false);
    }

    let mut used = Vec::new();
    for value in values {
        let value = value?;
        if value.is_missing() {
            continue;
        }
        let Value::Text(label) = convert(&value, Domain::Text) else {
            continue;
        };
        if let Some(flag) = seen.get_mut(&label) {
            if !*flag {
                *flag = true;
                used.push(label);
            }
        }
    }

    Ok((0..).zip(used).map(|(code, label)| Level::new(code, label)).collect())
}
