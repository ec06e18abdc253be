//! Math functions

use tally_core::{Value, INT_MISSING};

use super::decimal_arg;
use crate::error::FormulaResult;

/// ABS(value)
pub fn fn_abs(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Decimal(decimal_arg(args, 0).abs()))
}

/// EXP(value)
pub fn fn_exp(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(Value::Decimal(decimal_arg(args, 0).exp()))
}

/// LN(value) - missing for non-positive values
pub fn fn_ln(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let v = decimal_arg(args, 0);
    Ok(Value::Decimal(if v > 0.0 { v.ln() } else { f64::NAN }))
}

/// LOG10(value) - missing for non-positive values
pub fn fn_log10(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let v = decimal_arg(args, 0);
    Ok(Value::Decimal(if v > 0.0 { v.log10() } else { f64::NAN }))
}

/// SQRT(value) - missing for negative values
pub fn fn_sqrt(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let v = decimal_arg(args, 0);
    Ok(Value::Decimal(if v >= 0.0 { v.sqrt() } else { f64::NAN }))
}

/// INT(value) - truncates towards zero
pub fn fn_int(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let v = decimal_arg(args, 0);
    let t = v.trunc();
    if !t.is_finite() || t <= f64::from(i32::MIN) || t > f64::from(i32::MAX) {
        return Ok(Value::Integer(INT_MISSING));
    }
    Ok(Value::Integer(t as i32))
}

/// ROUND(value, [digits])
pub fn fn_round(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let v = decimal_arg(args, 0);
    let digits = match args.get(1) {
        Some(d @ Value::Integer(n)) if !d.is_missing() => *n,
        _ => return Ok(Value::Decimal(f64::NAN)),
    };
    let factor = 10f64.powi(digits);
    Ok(Value::Decimal((v * factor).round() / factor))
}

/// BOXCOX(value, [lambda]) - Box-Cox transform, `ln(x)` when lambda is 0
pub fn fn_boxcox(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let x = decimal_arg(args, 0);
    let lambda = decimal_arg(args, 1);
    if x.is_nan() || lambda.is_nan() || x <= 0.0 {
        return Ok(Value::Decimal(f64::NAN));
    }
    let result = if lambda == 0.0 {
        x.ln()
    } else {
        (x.powf(lambda) - 1.0) / lambda
    };
    Ok(Value::Decimal(result))
}

/// Z(value, mean, sd) - standard score; the statistics default to the
/// whole-column VMEAN and VSTDEV of `value`
pub fn fn_z(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    let x = decimal_arg(args, 0);
    let mean = decimal_arg(args, 1);
    let sd = decimal_arg(args, 2);
    if sd == 0.0 {
        return Ok(Value::Decimal(f64::NAN));
    }
    Ok(Value::Decimal((x - mean) / sd))
}
