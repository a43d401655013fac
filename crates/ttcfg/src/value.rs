//! value representation
//!
//! Module parameters and logging options are reported with one of these types
//! - boolean (`true`/`false`)
//! - integer (arbitrary precision)
//! - float (f64)
//! - string (utf-8, unquoted)
//! - raw (anything that is not a plain literal or expression, e.g. aggregates, bit strings, enumerated values)
//!
//! Additionally:
//! - integers that fit into an `i64` are serialized as numbers, larger ones as strings
//! - raw values are serialized as their source text with macros already substituted
//!
use crate::expr::Evaluated;
use crate::numeric::NumericValue;
use num_bigint::BigInt;
use num_traits::ToPrimitive;
use serde::Serializer;
use std::fmt::{Display, Formatter};

/// All possible value types
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Integer(BigInt),
    Float(f64),
    String(String),
    Raw(String),
}

impl Value {
    /// Value for resolved source text that is not an expression
    pub fn from_raw(text: &str) -> Self {
        match text.trim() {
            "true" => Value::Boolean(true),
            "false" => Value::Boolean(false),
            other => Value::Raw(other.to_string()),
        }
    }
}

impl From<Evaluated> for Value {
    fn from(value: Evaluated) -> Self {
        match value {
            Evaluated::Number(NumericValue::Integer(value)) => Value::Integer(value),
            Evaluated::Number(NumericValue::Float(value)) => Value::Float(value),
            Evaluated::Text(value) => Value::String(value),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value.into())
    }
}

/// Config file text of the value
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Boolean(value) => write!(f, "{value}"),
            Value::Integer(value) => write!(f, "{value}"),
            Value::Float(value) => write!(f, "{}", NumericValue::Float(*value)),
            Value::String(value) => f.write_str(&crate::expr::quote(value)),
            Value::Raw(value) => f.write_str(value),
        }
    }
}

impl serde::ser::Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Integer(value) => match value.to_i64() {
                Some(value) => serializer.serialize_i64(value),
                None => serializer.collect_str(value),
            },
            Value::Float(value) if value.is_finite() => serializer.serialize_f64(*value),
            Value::Float(_) => serializer.serialize_f64(0.0),
            Value::String(value) | Value::Raw(value) => serializer.serialize_str(value),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn serialization() {
        let big: BigInt = "123456789012345678901234567890".parse().expect("bigint");
        let values = vec![
            Value::from(true),
            Value::from(42),
            Value::Integer(big),
            Value::Float(1.5),
            Value::from("text"),
            Value::from_raw(" { 1, 2 } "),
        ];

        assert_eq!(
            serde_json::to_string(&values).expect("json"),
            r#"[true,42,"123456789012345678901234567890",1.5,"text","{ 1, 2 }"]"#
        );
    }

    #[test]
    fn display_as_config_text() {
        assert_eq!(Value::from("a\"b").to_string(), "\"a\\\"b\"");
        assert_eq!(Value::Float(f64::INFINITY).to_string(), "0.0");
        assert_eq!(Value::from_raw("false"), Value::Boolean(false));
        assert_eq!(Value::from_raw("'01'B").to_string(), "'01'B");
    }
}
