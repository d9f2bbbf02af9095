//! # Exact Amounts
//!
//! [`Amount`] wraps an arbitrary-precision decimal. Arithmetic checks
//! (quantity × rate == amount, subtotal == Σ lines) compare exact values,
//! so `2 × 10.10 == 20.20` holds and `0.1 + 0.2 == 0.3` holds.
//!
//! ## Wire Format
//!
//! Serialized as a JSON string (`"1250.50"`). On input, strings and JSON
//! integers are accepted. JSON floats are accepted by reading their
//! shortest round-trip decimal form (`0.1` becomes exactly `0.1`, not the
//! nearest binary fraction); NaN and infinities are rejected.

use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::AmountError;

/// An exact decimal monetary value or quantity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(BigDecimal);

impl Amount {
    /// Parse a decimal string such as `"1250.50"` or `"-3"`.
    pub fn parse(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        BigDecimal::from_str(trimmed)
            .map(Self)
            .map_err(|e| AmountError::Invalid {
                input: input.to_string(),
                reason: e.to_string(),
            })
    }

    /// Build an amount from a whole number.
    pub fn from_int(value: i64) -> Self {
        Self(BigDecimal::from(value))
    }

    /// Build an amount from a float via its shortest round-trip decimal form.
    pub fn from_f64(value: f64) -> Result<Self, AmountError> {
        if !value.is_finite() {
            return Err(AmountError::NonFinite(value.to_string()));
        }
        Self::parse(&value.to_string())
    }

    /// Zero.
    pub fn zero() -> Self {
        Self(BigDecimal::from(0))
    }

    /// Borrow the underlying decimal for arithmetic.
    pub fn as_decimal(&self) -> &BigDecimal {
        &self.0
    }

    /// Whether the amount is strictly greater than zero.
    pub fn is_positive(&self) -> bool {
        self.0 > BigDecimal::from(0)
    }

    /// Canonical string form with trailing fractional zeros removed.
    ///
    /// `"100.00"` and `"100"` produce the same key, which keeps cache keys
    /// stable across differently formatted inputs.
    pub fn canonical_string(&self) -> String {
        let text = self.0.to_string();
        if !text.contains('.') || text.contains(['e', 'E']) {
            return text;
        }
        let trimmed = text.trim_end_matches('0').trim_end_matches('.');
        match trimmed {
            "" | "-" | "-0" => "0".to_string(),
            t => t.to_string(),
        }
    }

    /// Render as a JSON number for wire payloads that expect one.
    ///
    /// Falls back to a JSON string if the value cannot be represented.
    pub fn to_json_number(&self) -> serde_json::Value {
        let text = self.canonical_string();
        match text.parse::<serde_json::Number>() {
            Ok(n) => serde_json::Value::Number(n),
            Err(_) => serde_json::Value::String(text),
        }
    }
}

impl From<BigDecimal> for Amount {
    fn from(value: BigDecimal) -> Self {
        Self(value)
    }
}

impl From<i64> for Amount {
    fn from(value: i64) -> Self {
        Self::from_int(value)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(AmountVisitor)
    }
}

struct AmountVisitor;

impl<'de> Visitor<'de> for AmountVisitor {
    type Value = Amount;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal string or a JSON number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Amount, E> {
        Amount::parse(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Amount, E> {
        Ok(Amount::from_int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Amount, E> {
        Ok(Amount(BigDecimal::from(v)))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Amount, E> {
        Amount::from_f64(v).map_err(E::custom)
    }
}
