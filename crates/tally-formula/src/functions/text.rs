//! Text functions
//!
//! Arguments arrive already converted into their declared domain, so these
//! bodies mostly pass values through.

use tally_core::Value;

use crate::error::{FormulaError, FormulaResult};

/// TEXT(value) - the value formatted as text
pub fn fn_text(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    args.first()
        .cloned()
        .ok_or_else(|| FormulaError::Argument("TEXT requires a value".into()))
}

/// VALUE(value) - the value parsed as a number; unparseable text is missing
pub fn fn_value(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    args.first()
        .cloned()
        .ok_or_else(|| FormulaError::Argument("VALUE requires a value".into()))
}

/// CONCAT(value1, value2, ...) - missing values contribute nothing
pub fn fn_concat(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let mut result = String::new();
    for arg in args {
        if let Value::Text(s) = arg {
            result.push_str(s);
        }
    }
    Ok(Value::Text(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat() {
        let args = [Value::text("a"), Value::text(""), Value::text("bc")];
        assert_eq!(fn_concat(0, &args).unwrap(), Value::text("abc"));
        assert_eq!(fn_concat(0, &[]).unwrap(), Value::text(""));
    }

    #[test]
    fn test_pass_through() {
        assert_eq!(fn_text(0, &[Value::text("7")]).unwrap(), Value::text("7"));
        assert_eq!(fn_value(0, &[Value::Decimal(7.5)]).unwrap(), Value::Decimal(7.5));
        assert!(fn_value(0, &[]).is_err());
    }
}
