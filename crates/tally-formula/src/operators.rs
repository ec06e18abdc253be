//! Value-level semantics of the unary, binary and relational operators
//!
//! These functions see already-evaluated operands; the tree decides which
//! operands to evaluate and in what order.

use std::cmp::Ordering;

use tally_core::convert::{convert, format_decimal, is_close};
use tally_core::{missing_of, DataType, Domain, MeasureType, Value, INT_MISSING};

use crate::ast::{BinaryOperator, CompareOperator, UnaryOperator};

/// Apply a unary operator
pub fn unary(op: UnaryOperator, value: Value) -> Value {
    match op {
        UnaryOperator::Negate => {
            if value.is_missing() {
                return value;
            }
            match value {
                Value::Integer(v) => Value::Integer(v.checked_neg().unwrap_or(INT_MISSING)),
                Value::Labeled { code, .. } => {
                    Value::Integer(code.checked_neg().unwrap_or(INT_MISSING))
                }
                Value::Decimal(v) => Value::Decimal(-v),
                Value::Text(_) => missing_of(Domain::Text),
            }
        }
        UnaryOperator::Plus => {
            if value.is_missing() {
                return value;
            }
            match value {
                Value::Labeled { code, .. } => Value::Integer(code),
                Value::Text(_) => convert(&value, Domain::Decimal),
                other => other,
            }
        }
        UnaryOperator::Not => {
            if value.is_missing() {
                return Value::Integer(INT_MISSING);
            }
            Value::Integer(i32::from(!value.is_truthy()))
        }
        UnaryOperator::Invert => {
            if value.is_missing() {
                Value::Integer(0)
            } else {
                value
            }
        }
    }
}

pub fn unary_data_type(op: UnaryOperator, operand: DataType) -> DataType {
    match op {
        UnaryOperator::Plus if operand == DataType::Text => DataType::Decimal,
        UnaryOperator::Not => DataType::Integer,
        _ => operand,
    }
}

pub fn unary_measure_type(
    op: UnaryOperator,
    operand_type: DataType,
    operand: MeasureType,
) -> MeasureType {
    match op {
        UnaryOperator::Plus if operand_type == DataType::Text => MeasureType::Continuous,
        UnaryOperator::Not => MeasureType::Nominal,
        _ => operand,
    }
}

/// Result data type of a binary operation
pub fn binary_data_type(op: BinaryOperator, left: DataType, right: DataType) -> DataType {
    if op == BinaryOperator::Power {
        DataType::Decimal
    } else if left == DataType::Text || right == DataType::Text {
        DataType::Text
    } else if left == DataType::Decimal || right == DataType::Decimal {
        DataType::Decimal
    } else {
        DataType::Integer
    }
}

/// Result measure type of a binary operation
pub fn binary_measure_type(
    op: BinaryOperator,
    left: MeasureType,
    right: MeasureType,
    data_type: DataType,
) -> MeasureType {
    let either = |m: MeasureType| left == m || right == m;

    if op == BinaryOperator::Power {
        MeasureType::Continuous
    } else if either(MeasureType::Id) && data_type == DataType::Text {
        MeasureType::Id
    } else if either(MeasureType::Continuous) && data_type != DataType::Text {
        MeasureType::Continuous
    } else if either(MeasureType::Nominal) {
        MeasureType::Nominal
    } else {
        MeasureType::Ordinal
    }
}

/// Apply a binary operator in the domain of the result data type
///
/// Text `+` concatenates even when a side is missing; every other operation
/// with a missing operand yields the domain's missing value.
pub fn binary(op: BinaryOperator, data_type: DataType, left: &Value, right: &Value) -> Value {
    let domain = Domain::for_data_type(data_type);
    let left = convert(left, domain);
    let right = convert(right, domain);

    if let (Value::Text(l), Value::Text(r)) = (&left, &right) {
        if op == BinaryOperator::Add {
            return Value::Text(format!("{}{}", l, r));
        }
        return missing_of(Domain::Text);
    }

    if left.is_missing() || right.is_missing() {
        return missing_of(domain);
    }

    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => integer_op(op, l, r),
        (Value::Decimal(l), Value::Decimal(r)) => Value::Decimal(decimal_op(op, l, r)),
        _ => missing_of(domain),
    }
}

fn integer_op(op: BinaryOperator, l: i32, r: i32) -> Value {
    let result = match op {
        BinaryOperator::Add => l.checked_add(r),
        BinaryOperator::Subtract => l.checked_sub(r),
        BinaryOperator::Multiply => l.checked_mul(r),
        BinaryOperator::Divide => {
            // true division, the value stays fractional
            return if r == 0 {
                Value::Integer(INT_MISSING)
            } else {
                Value::Decimal(f64::from(l) / f64::from(r))
            };
        }
        BinaryOperator::Modulo => floored_rem(l, r),
        BinaryOperator::Power | BinaryOperator::BitXor => match u32::try_from(r) {
            Ok(exp) => l.checked_pow(exp),
            Err(_) => return Value::Decimal(f64::from(l).powf(f64::from(r))),
        },
    };
    Value::Integer(result.unwrap_or(INT_MISSING))
}

/// Remainder taking the sign of the divisor
fn floored_rem(l: i32, r: i32) -> Option<i32> {
    if r == 0 {
        return None;
    }
    let rem = l.checked_rem(r)?;
    if rem != 0 && (rem < 0) != (r < 0) {
        Some(rem + r)
    } else {
        Some(rem)
    }
}

fn decimal_op(op: BinaryOperator, l: f64, r: f64) -> f64 {
    match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide if r == 0.0 => f64::NAN,
        BinaryOperator::Divide => l / r,
        BinaryOperator::Modulo if r == 0.0 => f64::NAN,
        BinaryOperator::Modulo => {
            let rem = l % r;
            if rem != 0.0 && (rem < 0.0) != (r < 0.0) {
                rem + r
            } else {
                rem
            }
        }
        BinaryOperator::Power | BinaryOperator::BitXor => l.powf(r),
    }
}

/// Operand as seen by a relational test
enum Scalar<'a> {
    Int(i32),
    Float(f64),
    Str(&'a str),
}

impl<'a> Scalar<'a> {
    fn plain(value: &'a Value) -> Self {
        match value {
            Value::Integer(v) => Scalar::Int(*v),
            Value::Decimal(v) => Scalar::Float(*v),
            Value::Text(s) => Scalar::Str(s),
            Value::Labeled { code, .. } => Scalar::Int(*code),
        }
    }

    /// Labeled values compare by label against text, by code otherwise
    fn against(value: &'a Value, other: &Value) -> Self {
        match value {
            Value::Labeled { label, .. } if other.is_text() => Scalar::Str(label),
            _ => Scalar::plain(value),
        }
    }

    fn text(&self) -> String {
        match self {
            Scalar::Int(v) => v.to_string(),
            Scalar::Float(v) => format_decimal(*v),
            Scalar::Str(s) => (*s).to_string(),
        }
    }
}

/// Single relational test; callers have already rejected missing operands
pub fn compare(left: &Value, op: CompareOperator, right: &Value) -> bool {
    let l = Scalar::against(left, right);
    let r = Scalar::against(right, left);

    let ordering = match (&l, &r) {
        (Scalar::Int(a), Scalar::Int(b)) => a.cmp(b),
        (Scalar::Str(a), Scalar::Str(b)) => a.cmp(b),
        (Scalar::Str(_), _) | (_, Scalar::Str(_)) => l.text().cmp(&r.text()),
        (a, b) => {
            let (a, b) = (as_f64(a), as_f64(b));
            match op {
                CompareOperator::Equal => return is_close(a, b),
                CompareOperator::NotEqual => return !is_close(a, b),
                _ => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            }
        }
    };

    match op {
        CompareOperator::Equal => ordering == Ordering::Equal,
        CompareOperator::NotEqual => ordering != Ordering::Equal,
        CompareOperator::LessThan => ordering == Ordering::Less,
        CompareOperator::LessEqual => ordering != Ordering::Greater,
        CompareOperator::GreaterThan => ordering == Ordering::Greater,
        CompareOperator::GreaterEqual => ordering != Ordering::Less,
    }
}

fn as_f64(scalar: &Scalar<'_>) -> f64 {
    match scalar {
        Scalar::Int(v) => f64::from(*v),
        Scalar::Float(v) => *v,
        Scalar::Str(_) => f64::NAN,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_unary() {
        assert_eq!(unary(UnaryOperator::Negate, Value::Integer(3)), Value::Integer(-3));
        assert_eq!(
            unary(UnaryOperator::Negate, Value::Integer(INT_MISSING)),
            Value::Integer(INT_MISSING)
        );
        assert_eq!(unary(UnaryOperator::Plus, Value::text("2.5")), Value::Decimal(2.5));
        assert_eq!(unary(UnaryOperator::Not, Value::Integer(0)), Value::Integer(1));
        assert_eq!(unary(UnaryOperator::Not, Value::Decimal(0.5)), Value::Integer(0));
        assert_eq!(unary(UnaryOperator::Invert, Value::Decimal(f64::NAN)), Value::Integer(0));
        assert_eq!(unary(UnaryOperator::Invert, Value::Integer(7)), Value::Integer(7));
    }

    #[test]
    fn test_unary_types() {
        assert_eq!(unary_data_type(UnaryOperator::Plus, DataType::Text), DataType::Decimal);
        assert_eq!(unary_data_type(UnaryOperator::Not, DataType::Decimal), DataType::Integer);
        assert_eq!(unary_data_type(UnaryOperator::Negate, DataType::Decimal), DataType::Decimal);
        assert_eq!(
            unary_measure_type(UnaryOperator::Not, DataType::Decimal, MeasureType::Continuous),
            MeasureType::Nominal
        );
    }

    #[test]
    fn test_missing_propagation() {
        let missing = Value::Integer(INT_MISSING);
        let result = binary(BinaryOperator::Add, DataType::Integer, &missing, &Value::Integer(1));
        assert!(result.is_missing());
        let result = binary(
            BinaryOperator::Multiply,
            DataType::Decimal,
            &Value::Decimal(2.0),
            &Value::Decimal(f64::NAN),
        );
        assert!(result.is_missing());
    }

    #[test]
    fn test_division_by_zero_is_missing() {
        let zero = Value::Integer(0);
        assert!(binary(BinaryOperator::Divide, DataType::Integer, &Value::Integer(4), &zero).is_missing());
        assert!(binary(BinaryOperator::Modulo, DataType::Integer, &Value::Integer(4), &zero).is_missing());
        let zero = Value::Decimal(0.0);
        assert!(binary(BinaryOperator::Divide, DataType::Decimal, &Value::Decimal(1.0), &zero).is_missing());
    }

    #[test]
    fn test_integer_arithmetic() {
        let two = Value::Integer(2);
        let seven = Value::Integer(7);
        assert_eq!(binary(BinaryOperator::Subtract, DataType::Integer, &two, &seven), Value::Integer(-5));
        assert_eq!(binary(BinaryOperator::Divide, DataType::Integer, &seven, &two), Value::Decimal(3.5));
        assert_eq!(binary(BinaryOperator::Modulo, DataType::Integer, &Value::Integer(-7), &two), Value::Integer(1));
        assert_eq!(binary(BinaryOperator::BitXor, DataType::Integer, &two, &seven), Value::Integer(128));
        assert_eq!(
            binary(BinaryOperator::Add, DataType::Integer, &Value::Integer(i32::MAX), &two),
            Value::Integer(INT_MISSING)
        );
    }

    #[test]
    fn test_mixed_operands_unify() {
        let result = binary(
            BinaryOperator::Add,
            DataType::Decimal,
            &Value::Integer(1),
            &Value::Decimal(0.5),
        );
        assert_eq!(result, Value::Decimal(1.5));
        let result = binary(BinaryOperator::Power, DataType::Decimal, &Value::Integer(2), &Value::Integer(-1));
        assert_eq!(result, Value::Decimal(0.5));
    }

    #[test]
    fn test_text_concatenation() {
        let result = binary(BinaryOperator::Add, DataType::Text, &Value::text("a"), &Value::Integer(1));
        assert_eq!(result, Value::text("a1"));
        let result = binary(BinaryOperator::Add, DataType::Text, &Value::text(""), &Value::text("b"));
        assert_eq!(result, Value::text("b"));
        let result = binary(BinaryOperator::Subtract, DataType::Text, &Value::text("a"), &Value::text("b"));
        assert!(result.is_missing());
    }

    #[test]
    fn test_binary_types() {
        use DataType::*;
        assert_eq!(binary_data_type(BinaryOperator::Add, Integer, Integer), Integer);
        assert_eq!(binary_data_type(BinaryOperator::Add, Integer, Decimal), Decimal);
        assert_eq!(binary_data_type(BinaryOperator::Add, Decimal, Text), Text);
        assert_eq!(binary_data_type(BinaryOperator::Power, Integer, Integer), Decimal);
        assert_eq!(binary_data_type(BinaryOperator::BitXor, Integer, Integer), Integer);

        assert_eq!(
            binary_measure_type(BinaryOperator::Add, MeasureType::Id, MeasureType::Nominal, Text),
            MeasureType::Id
        );
        assert_eq!(
            binary_measure_type(BinaryOperator::Add, MeasureType::Continuous, MeasureType::Nominal, Integer),
            MeasureType::Continuous
        );
        assert_eq!(
            binary_measure_type(BinaryOperator::Add, MeasureType::Continuous, MeasureType::Nominal, Text),
            MeasureType::Nominal
        );
        assert_eq!(
            binary_measure_type(BinaryOperator::Add, MeasureType::Ordinal, MeasureType::Ordinal, Integer),
            MeasureType::Ordinal
        );
        assert_eq!(
            binary_measure_type(BinaryOperator::Power, MeasureType::Nominal, MeasureType::Nominal, Decimal),
            MeasureType::Continuous
        );
    }

    #[test]
    fn test_float_equality_is_tolerant() {
        let sum = Value::Decimal(0.1 + 0.2);
        assert!(compare(&sum, CompareOperator::Equal, &Value::Decimal(0.3)));
        assert!(!compare(&sum, CompareOperator::NotEqual, &Value::Decimal(0.3)));
        assert!(compare(&Value::Integer(3), CompareOperator::Equal, &Value::Decimal(3.0)));
        assert!(compare(&Value::Integer(3), CompareOperator::LessThan, &Value::Decimal(3.5)));
    }

    #[test]
    fn test_labeled_comparisons() {
        let red = Value::labeled(1, "red");
        let blue = Value::labeled(2, "blue");
        // codes between labeled values
        assert!(compare(&red, CompareOperator::LessThan, &blue));
        // label against text
        assert!(compare(&red, CompareOperator::Equal, &Value::text("red")));
        assert!(compare(&Value::text("blue"), CompareOperator::Equal, &blue));
        // code against numbers
        assert!(compare(&red, CompareOperator::Equal, &Value::Integer(1)));
        assert!(!compare(&blue, CompareOperator::Equal, &Value::text("2")));
    }
}
