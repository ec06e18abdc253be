//! Statistical functions
//!
//! `SUM`, `MEAN`, `MIN` and `MAX` work across the arguments of a single row.
//! The `V`-prefixed functions are column-wise: they receive whole columns
//! and produce one value that the evaluator memoizes.

use tally_core::Value;

use super::present;
use crate::error::FormulaResult;

fn decimal(v: Option<f64>) -> Value {
    Value::Decimal(v.unwrap_or(f64::NAN))
}

/// First argument column, or an empty one for a call without arguments
fn first_column(args: &[Vec<Value>]) -> &[Value] {
    args.first().map(Vec::as_slice).unwrap_or(&[])
}

fn sum(numbers: &[f64]) -> Option<f64> {
    if numbers.is_empty() {
        None
    } else {
        Some(numbers.iter().sum())
    }
}

fn mean(numbers: &[f64]) -> Option<f64> {
    sum(numbers).map(|s| s / numbers.len() as f64)
}

/// Sample variance (n - 1 denominator)
fn variance(numbers: &[f64]) -> Option<f64> {
    if numbers.len() < 2 {
        return None;
    }
    let m = mean(numbers)?;
    let ss: f64 = numbers.iter().map(|x| (x - m).powi(2)).sum();
    Some(ss / (numbers.len() - 1) as f64)
}

fn median(mut numbers: Vec<f64>) -> Option<f64> {
    if numbers.is_empty() {
        return None;
    }
    numbers.sort_by(|a, b| a.total_cmp(b));
    let len = numbers.len();
    if len % 2 == 1 {
        Some(numbers[len / 2])
    } else {
        Some((numbers[len / 2 - 1] + numbers[len / 2]) / 2.0)
    }
}

fn min(numbers: &[f64]) -> Option<f64> {
    numbers.iter().copied().reduce(f64::min)
}

fn max(numbers: &[f64]) -> Option<f64> {
    numbers.iter().copied().reduce(f64::max)
}

/// SUM(value1, value2, ...) - missing values are ignored
pub fn fn_sum(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(decimal(sum(&present(args))))
}

/// MEAN(value1, value2, ...) - missing values are ignored
pub fn fn_mean(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(decimal(mean(&present(args))))
}

pub fn fn_min(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(decimal(min(&present(args))))
}

pub fn fn_max(_row: usize, args: &[Value]) -> FormulaResult<Value> {
    Ok(decimal(max(&present(args))))
}

/// VSUM(column)
pub fn fn_vsum(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(sum(&present(first_column(args)))))
}

/// VMEAN(column)
pub fn fn_vmean(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(mean(&present(first_column(args)))))
}

/// VMED(column)
pub fn fn_vmed(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(median(present(first_column(args)))))
}

pub fn fn_vmin(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(min(&present(first_column(args)))))
}

pub fn fn_vmax(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(max(&present(first_column(args)))))
}

/// VVAR(column) - sample variance
pub fn fn_vvar(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(variance(&present(first_column(args)))))
}

/// VSTDEV(column) - sample standard deviation
pub fn fn_vstdev(args: &[Vec<Value>]) -> FormulaResult<Value> {
    Ok(decimal(variance(&present(first_column(args))).map(f64::sqrt)))
}

/// VSE(column) - standard error of the mean
pub fn fn_vse(args: &[Vec<Value>]) -> FormulaResult<Value> {
    let numbers = present(first_column(args));
    let se = variance(&numbers).map(|v| (v / numbers.len() as f64).sqrt());
    Ok(decimal(se))
}

/// VN(column) - number of non-missing values
pub fn fn_vn(args: &[Vec<Value>]) -> FormulaResult<Value> {
    let n = first_column(args).iter().filter(|v| !v.is_missing()).count();
    Ok(Value::Integer(i32::try_from(n).unwrap_or(i32::MAX)))
}

/// VROWS(column) - number of rows, missing values included
pub fn fn_vrows(args: &[Vec<Value>]) -> FormulaResult<Value> {
    let n = first_column(args).len();
    Ok(Value::Integer(i32::try_from(n).unwrap_or(i32::MAX)))
}
