//! numeric scalar used by expression evaluation
//!
//! A [NumericValue] is either an arbitrary-precision integer or a double. Once an operation mixes the two, the
//! receiver is widened to a float and stays one. Operations mutate the receiver in place.
//!
//! Integer division truncates toward zero (the behavior of [num_bigint::BigInt]'s `/`).
use num_bigint::{BigInt, Sign};
use num_traits::{ToPrimitive, Zero};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[derive(Debug, Clone)]
pub enum NumericValue {
    Integer(BigInt),
    Float(f64),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum NumericError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("`{0}` is not a numeric literal")]
    InvalidLiteral(String),
}

impl NumericValue {
    pub fn is_float(&self) -> bool {
        matches!(self, NumericValue::Float(_))
    }

    pub fn is_zero(&self) -> bool {
        match self {
            NumericValue::Integer(value) => value.is_zero(),
            NumericValue::Float(value) => *value == 0.0,
        }
    }

    pub fn to_f64(&self) -> f64 {
        match self {
            NumericValue::Integer(value) => big_to_f64(value),
            NumericValue::Float(value) => *value,
        }
    }

    /// The integer value, `None` for floats
    pub fn to_integer(&self) -> Option<&BigInt> {
        match self {
            NumericValue::Integer(value) => Some(value),
            NumericValue::Float(_) => None,
        }
    }

    pub fn add(&mut self, rhs: &NumericValue) {
        self.combine(rhs, |a, b| *a += b, |a, b| a + b);
    }

    pub fn sub(&mut self, rhs: &NumericValue) {
        self.combine(rhs, |a, b| *a -= b, |a, b| a - b);
    }

    pub fn mul(&mut self, rhs: &NumericValue) {
        self.combine(rhs, |a, b| *a *= b, |a, b| a * b);
    }

    /// Multiply by a small constant (used for unary minus)
    pub fn mul_int(&mut self, factor: i64) {
        match self {
            NumericValue::Integer(value) => *value *= factor,
            NumericValue::Float(value) => *value *= factor as f64,
        }
    }

    /// Divide in place
    ///
    /// Fails on a zero divisor of either kind; the receiver is left untouched in that case.
    pub fn div(&mut self, rhs: &NumericValue) -> Result<(), NumericError> {
        if rhs.is_zero() {
            return Err(NumericError::DivisionByZero);
        }

        self.combine(rhs, |a, b| *a /= b, |a, b| a / b);
        Ok(())
    }

    fn combine(
        &mut self,
        rhs: &NumericValue,
        integer_op: impl FnOnce(&mut BigInt, &BigInt),
        float_op: impl FnOnce(f64, f64) -> f64,
    ) {
        if let (NumericValue::Integer(lhs), NumericValue::Integer(rhs)) = (&mut *self, rhs) {
            integer_op(lhs, rhs);
            return;
        }

        let result = float_op(self.to_f64(), rhs.to_f64());
        *self = NumericValue::Float(result);
    }
}

fn big_to_f64(value: &BigInt) -> f64 {
    value.to_f64().unwrap_or(match value.sign() {
        Sign::Minus => f64::NEG_INFINITY,
        _ => f64::INFINITY,
    })
}

impl FromStr for NumericValue {
    type Err = NumericError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();

        if let Ok(value) = text.parse::<BigInt>() {
            return Ok(NumericValue::Integer(value));
        }

        // f64::from_str would also accept "inf" and "NaN"
        let lexically_float = !text.is_empty()
            && text.chars().any(|c| c.is_ascii_digit())
            && text
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));

        match text.parse::<f64>() {
            Ok(value) if lexically_float => Ok(NumericValue::Float(value)),
            _ => Err(NumericError::InvalidLiteral(text.to_string())),
        }
    }
}

impl From<i64> for NumericValue {
    fn from(value: i64) -> Self {
        NumericValue::Integer(value.into())
    }
}

impl From<BigInt> for NumericValue {
    fn from(value: BigInt) -> Self {
        NumericValue::Integer(value)
    }
}

impl From<f64> for NumericValue {
    fn from(value: f64) -> Self {
        NumericValue::Float(value)
    }
}

impl Display for NumericValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            NumericValue::Integer(value) => write!(f, "{value}"),
            // not valid config tokens
            NumericValue::Float(value) if !value.is_finite() => f.write_str("0.0"),
            NumericValue::Float(value) => write!(f, "{value:?}"),
        }
    }
}

impl PartialEq for NumericValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for NumericValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (NumericValue::Integer(a), NumericValue::Integer(b)) => Some(a.cmp(b)),
            _ => self.to_f64().partial_cmp(&other.to_f64()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn num(text: &str) -> NumericValue {
        text.parse().expect("valid literal")
    }

    #[test]
    fn parse_prefers_integer() {
        assert!(!num("42").is_float());
        assert!(!num("-17").is_float());
        assert!(num("4.2").is_float());
        assert!(num("1e3").is_float());
        assert_eq!(
            num("123456789012345678901234567890").to_string(),
            "123456789012345678901234567890"
        );
    }

    #[test]
    fn parse_rejects_non_numbers() {
        for text in ["", "abc", "inf", "NaN", "infinity", "1.2.3"] {
            assert!(text.parse::<NumericValue>().is_err(), "{text:?}");
        }
    }

    #[test]
    fn add_then_sub_is_identity() {
        let a = num("98765432109876543210987654321");
        let b = num("12345678901234567890");

        let mut value = a.clone();
        value.add(&b);
        value.sub(&b);

        assert_eq!(value, a);
        assert!(!value.is_float());
    }

    #[test]
    fn mixing_widens_to_float() {
        let mut value = num("3");
        value.add(&num("0.5"));
        assert!(value.is_float());
        assert_eq!(value.to_string(), "3.5");

        // stays a float even when the remaining operands are integers
        value.mul(&num("2"));
        assert!(value.is_float());
        assert_eq!(value.to_string(), "7.0");
        assert_eq!(value.to_integer(), None);
    }

    #[test]
    fn integer_division_truncates_toward_zero() {
        let cases = [("7", "2", 3), ("-7", "2", -3), ("7", "-2", -3), ("-7", "-2", 3)];
        for (a, b, expected) in cases {
            let mut value = num(a);
            value.div(&num(b)).expect("non-zero divisor");
            assert_eq!(value.to_integer(), Some(&BigInt::from(expected)), "{a} / {b}");
        }
    }

    #[test]
    fn division_by_zero_fails() {
        for divisor in ["0", "0.0", "-0.0"] {
            let mut value = num("1.0");
            assert_eq!(value.div(&num(divisor)), Err(NumericError::DivisionByZero));
            assert_eq!(value.to_string(), "1.0");
        }

        let mut value = num("10");
        assert_eq!(value.div(&num("0")), Err(NumericError::DivisionByZero));
    }

    #[test]
    fn overflowing_float_prints_as_zero() {
        let mut value = num("1e308");
        value.mul(&num("10.0"));
        assert_eq!(value.to_f64(), f64::INFINITY);
        assert_eq!(value.to_string(), "0.0");

        value.mul_int(-1);
        assert_eq!(value.to_string(), "0.0");
    }

    #[test]
    fn mul_int_negates() {
        let mut value = num("5");
        value.mul_int(-1);
        assert_eq!(value.to_string(), "-5");

        let mut value = num("2.5");
        value.mul_int(-1);
        assert_eq!(value.to_string(), "-2.5");
    }

    #[test]
    fn comparison_across_kinds() {
        assert_eq!(num("2"), num("2.0"));
        assert!(num("2") < num("2.5"));
        assert!(num("-1.5") < num("-1"));
        assert!(num("100000000000000000000") > num("99999999999999999999"));
    }
}
