//! Logical functions

use tally_core::{Value, INT_MISSING};

use super::missing_like;
use crate::error::{FormulaError, FormulaResult};

fn arg<'a>(function: &str, args: &'a [Value], index: usize) -> FormulaResult<&'a Value> {
    args.get(index).ok_or_else(|| {
        FormulaError::Argument(format!("{} is missing argument {}", function, index + 1))
    })
}

/// IF(condition, [then], [otherwise])
///
/// A missing condition yields a missing value of the `then` branch's type.
pub fn fn_if(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let condition = arg("IF", args, 0)?;
    let then = arg("IF", args, 1)?;
    let otherwise = arg("IF", args, 2)?;

    if condition.is_missing() {
        Ok(missing_like(then))
    } else if condition.is_truthy() {
        Ok(then.clone())
    } else {
        Ok(otherwise.clone())
    }
}

/// IFMISS(value, [then], [otherwise]) - `then` when `value` is missing
pub fn fn_ifmiss(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let value = arg("IFMISS", args, 0)?;
    let then = arg("IFMISS", args, 1)?;
    let otherwise = arg("IFMISS", args, 2)?;

    if value.is_missing() {
        Ok(then.clone())
    } else {
        Ok(otherwise.clone())
    }
}

/// NOT(value)
pub fn fn_not(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let value = arg("NOT", args, 0)?;
    if value.is_missing() {
        return Ok(Value::Integer(INT_MISSING));
    }
    Ok(Value::Integer(i32::from(!value.is_truthy())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_if() {
        let pick = |cond: i32| {
            fn_if(0, &[Value::Integer(cond), Value::text("yes"), Value::text("no")]).unwrap()
        };
        assert_eq!(pick(1), Value::text("yes"));
        assert_eq!(pick(0), Value::text("no"));
        assert_eq!(pick(INT_MISSING), Value::text(""));
    }

    #[test]
    fn test_if_requires_padded_args() {
        assert!(fn_if(0, &[Value::Integer(1)]).is_err());
    }

    #[test]
    fn test_ifmiss() {
        let args = [Value::Decimal(f64::NAN), Value::Integer(0), Value::Integer(1)];
        assert_eq!(fn_ifmiss(0, &args).unwrap(), Value::Integer(0));
        let args = [Value::Decimal(2.0), Value::Integer(0), Value::Integer(1)];
        assert_eq!(fn_ifmiss(0, &args).unwrap(), Value::Integer(1));
    }

    #[test]
    fn test_not() {
        assert_eq!(fn_not(0, &[Value::Integer(0)]).unwrap(), Value::Integer(1));
        assert_eq!(fn_not(0, &[Value::Integer(5)]).unwrap(), Value::Integer(0));
        assert_eq!(
            fn_not(0, &[Value::Integer(INT_MISSING)]).unwrap(),
            Value::Integer(INT_MISSING)
        );
    }
}
