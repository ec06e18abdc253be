//! Missing values and conversion between value domains
//!
//! Every conversion is total: anything that cannot be represented in the
//! target domain becomes that domain's missing sentinel.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::types::DataType;
use crate::value::Value;

/// Missing sentinel of the integer domain
pub const INT_MISSING: i32 = i32::MIN;

/// Relative tolerance used for floating equality
pub const REL_TOLERANCE: f64 = 1e-9;

/// Target domain of a conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Domain {
    Integer,
    Decimal,
    Text,
    Labeled,
}

impl Domain {
    /// The domain values of a data type are unified into
    pub fn for_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Integer => Domain::Integer,
            DataType::Decimal => Domain::Decimal,
            DataType::Text => Domain::Text,
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Domain::Integer => "integer",
            Domain::Decimal => "decimal",
            Domain::Text => "text",
            Domain::Labeled => "labeled",
        };
        f.write_str(name)
    }
}

/// The missing sentinel of a domain
pub fn missing_of(domain: Domain) -> Value {
    match domain {
        Domain::Integer => Value::Integer(INT_MISSING),
        Domain::Decimal => Value::Decimal(f64::NAN),
        Domain::Text => Value::Text(String::new()),
        Domain::Labeled => Value::labeled(INT_MISSING, ""),
    }
}

/// Check whether a value is missing in its own domain
pub fn is_missing(value: &Value) -> bool {
    value.is_missing()
}

/// Convert a value into a domain, mapping missing to missing
pub fn convert(value: &Value, domain: Domain) -> Value {
    if value.is_missing() {
        return missing_of(domain);
    }

    match domain {
        Domain::Integer => Value::Integer(to_int(value)),
        Domain::Decimal => Value::Decimal(to_f64(value)),
        Domain::Text => Value::Text(to_text(value)),
        Domain::Labeled => match value {
            Value::Labeled { .. } => value.clone(),
            Value::Text(s) => Value::labeled(to_int(value), s.clone()),
            other => Value::labeled(to_int(other), to_text(other)),
        },
    }
}

/// Convert when a domain is declared, pass through when untyped
pub fn convert_opt(value: Value, domain: Option<Domain>) -> Value {
    match domain {
        Some(domain) => convert(&value, domain),
        None => value,
    }
}

fn to_int(value: &Value) -> i32 {
    match value {
        Value::Integer(v) => *v,
        Value::Decimal(v) => f64_to_int(*v),
        Value::Labeled { code, .. } => *code,
        Value::Text(s) => {
            let s = s.trim();
            if let Ok(v) = s.parse::<i32>() {
                v
            } else if let Ok(v) = s.parse::<f64>() {
                f64_to_int(v)
            } else {
                INT_MISSING
            }
        }
    }
}

fn to_f64(value: &Value) -> f64 {
    match value {
        Value::Integer(v) => int_to_f64(*v),
        Value::Decimal(v) => *v,
        Value::Labeled { code, .. } => int_to_f64(*code),
        Value::Text(s) => s.trim().parse::<f64>().unwrap_or(f64::NAN),
    }
}

fn to_text(value: &Value) -> String {
    match value {
        Value::Integer(v) => v.to_string(),
        Value::Decimal(v) => format_decimal(*v),
        Value::Text(s) => s.clone(),
        Value::Labeled { label, .. } => label.clone(),
    }
}

fn int_to_f64(v: i32) -> f64 {
    if v == INT_MISSING {
        f64::NAN
    } else {
        f64::from(v)
    }
}

fn f64_to_int(v: f64) -> i32 {
    if !v.is_finite() {
        return INT_MISSING;
    }
    let t = v.trunc();
    if t <= f64::from(i32::MIN) || t > f64::from(i32::MAX) {
        INT_MISSING
    } else {
        t as i32
    }
}

/// Render a decimal without trailing zeros when it is integral
pub fn format_decimal(v: f64) -> String {
    if v.is_nan() {
        String::new()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Tolerant floating equality (relative tolerance [`REL_TOLERANCE`])
pub fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if a.is_infinite() || b.is_infinite() {
        return false;
    }
    (a - b).abs() <= REL_TOLERANCE * a.abs().max(b.abs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_int_conversions() {
        assert_eq!(convert(&Value::Decimal(3.7), Domain::Integer), Value::Integer(3));
        assert_eq!(convert(&Value::Decimal(-3.7), Domain::Integer), Value::Integer(-3));
        assert_eq!(convert(&Value::text(" 42 "), Domain::Integer), Value::Integer(42));
        assert_eq!(convert(&Value::text("2.5"), Domain::Integer), Value::Integer(2));
        assert_eq!(
            convert(&Value::text("abc"), Domain::Integer),
            Value::Integer(INT_MISSING)
        );
        assert_eq!(
            convert(&Value::Decimal(1e12), Domain::Integer),
            Value::Integer(INT_MISSING)
        );
        assert_eq!(convert(&Value::labeled(4, "four"), Domain::Integer), Value::Integer(4));
    }

    #[test]
    fn test_decimal_conversions() {
        assert_eq!(convert(&Value::Integer(2), Domain::Decimal), Value::Decimal(2.0));
        assert_eq!(convert(&Value::text("0.25"), Domain::Decimal), Value::Decimal(0.25));
        assert!(convert(&Value::text("x"), Domain::Decimal).is_missing());
        assert!(convert(&Value::Integer(INT_MISSING), Domain::Decimal).is_missing());
    }

    #[test]
    fn test_text_conversions() {
        assert_eq!(convert(&Value::Integer(12), Domain::Text), Value::text("12"));
        assert_eq!(convert(&Value::Decimal(2.0), Domain::Text), Value::text("2"));
        assert_eq!(convert(&Value::Decimal(2.5), Domain::Text), Value::text("2.5"));
        assert_eq!(convert(&Value::labeled(1, "low"), Domain::Text), Value::text("low"));
        assert_eq!(convert(&Value::Decimal(f64::NAN), Domain::Text), Value::text(""));
    }

    #[test]
    fn test_labeled_conversions() {
        assert_eq!(convert(&Value::Integer(3), Domain::Labeled), Value::labeled(3, "3"));
        assert_eq!(convert(&Value::text("7"), Domain::Labeled), Value::labeled(7, "7"));
        assert!(convert(&Value::text(""), Domain::Labeled).is_missing());
    }

    #[test]
    fn test_untyped_passthrough() {
        assert_eq!(convert_opt(Value::text("a"), None), Value::text("a"));
        assert_eq!(
            convert_opt(Value::text("5"), Some(Domain::Integer)),
            Value::Integer(5)
        );
    }

    #[test]
    fn test_is_close() {
        assert!(is_close(0.1 + 0.2, 0.3));
        assert!(0.1 + 0.2 != 0.3);
        assert!(!is_close(1.0, 1.001));
        assert!(is_close(f64::INFINITY, f64::INFINITY));
        assert!(!is_close(0.0, 1e-12));
    }

    fn domains() -> impl Strategy<Value = Domain> {
        prop_oneof![
            Just(Domain::Integer),
            Just(Domain::Decimal),
            Just(Domain::Text),
            Just(Domain::Labeled),
        ]
    }

    proptest! {
        #[test]
        fn prop_missing_maps_to_missing(from in domains(), to in domains()) {
            prop_assert!(convert(&missing_of(from), to).is_missing());
        }

        #[test]
        fn prop_integers_survive_decimal(v in (i32::MIN + 1)..i32::MAX) {
            let dec = convert(&Value::Integer(v), Domain::Decimal);
            prop_assert_eq!(convert(&dec, Domain::Integer), Value::Integer(v));
        }

        #[test]
        fn prop_text_conversion_is_total(s in ".*", to in domains()) {
            let _ = convert(&Value::Text(s), to);
        }
    }
}
