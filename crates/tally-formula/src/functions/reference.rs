//! Row reference functions
//!
//! `OFFSET` has no body here: the evaluator re-evaluates its first argument
//! at another row.

use tally_core::{Value, INT_MISSING};

use crate::error::FormulaResult;

/// ROW() - one-based row number
pub fn fn_row(row: usize, _args: &[Value]) -> FormulaResult<Value> {
    let number = i32::try_from(row + 1).unwrap_or(INT_MISSING);
    Ok(Value::Integer(number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_is_one_based() {
        assert_eq!(fn_row(0, &[]).unwrap(), Value::Integer(1));
        assert_eq!(fn_row(41, &[]).unwrap(), Value::Integer(42));
    }
}
