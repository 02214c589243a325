//! Decimal normalization for response bodies.
//!
//! The store hands numbers back as arbitrary-precision decimals. JSON
//! clients expect plain numbers, so every decimal is collapsed to the
//! narrowest native form right before serialization:
//!
//! | Decimal | Emitted as |
//! |---|---|
//! | `10`, `10.0`, `-3` | integer (`i64`, then `u64`, then `i128`) |
//! | `10.5`, `0.25` | `f64` |
//! | integral but wider than 128 bits | `f64` |
//!
//! Nothing else in the crate converts numbers. Stored items and request
//! bodies keep their decimals untouched; this runs only on the way out.

use bigdecimal::{BigDecimal, ToPrimitive};
use serde::{Serialize, Serializer};

/// A decimal collapsed to a native JSON number.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Normalized {
    Int(i64),
    UInt(u64),
    Wide(i128),
    Float(f64),
}

/// Collapses `value` to an integer when its fractional part is zero,
/// otherwise to a float.
pub fn normalize(value: &BigDecimal) -> Normalized {
    if value.is_integer() {
        if let Some(n) = value.to_i64() {
            return Normalized::Int(n);
        }
        if let Some(n) = value.to_u64() {
            return Normalized::UInt(n);
        }
        let (digits, _) = value.with_scale(0).into_bigint_and_exponent();
        if let Some(n) = digits.to_i128() {
            return Normalized::Wide(n);
        }
    }
    // A finite decimal always has an f64 approximation; NaN only guards the
    // impossible case and serializes as `null`.
    Normalized::Float(value.to_f64().unwrap_or(f64::NAN))
}

impl Serialize for Normalized {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Int(n)   => serializer.serialize_i64(n),
            Self::UInt(n)  => serializer.serialize_u64(n),
            Self::Wide(n)  => serializer.serialize_i128(n),
            Self::Float(n) => serializer.serialize_f64(n),
        }
    }
}
