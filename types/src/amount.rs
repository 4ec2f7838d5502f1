//! Fixed-point token amounts.
//!
//! An amount is a raw `u128` integer plus an implicit number of fractional
//! digits (`decimals`). `1.5` tokens at 18 decimals is stored as
//! `1_500_000_000_000_000_000` raw. No floating point is ever involved.
//!
//! Arithmetic between two amounts requires both to carry the same scale.
//! Converting between scales goes through [`FixedPointAmount::rescale`],
//! which refuses to drop precision.

use primitive_types::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AmountError;

/// Largest supported number of fractional digits. `10^36` still fits in a
/// `u128` with room for whole units.
pub const MAX_DECIMALS: u8 = 36;

/// A token quantity as an integer scaled by `10^decimals`.
///
/// Serialized as `{"raw": "<decimal string>", "decimals": n}` so JSON
/// consumers never see a number wider than 64 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountRepr", into = "AmountRepr")]
pub struct FixedPointAmount {
    raw: u128,
    decimals: u8,
}

#[derive(Serialize, Deserialize)]
struct AmountRepr {
    raw: String,
    decimals: u8,
}

impl From<FixedPointAmount> for AmountRepr {
    fn from(amount: FixedPointAmount) -> Self {
        Self {
            raw: amount.raw.to_string(),
            decimals: amount.decimals,
        }
    }
}

impl TryFrom<AmountRepr> for FixedPointAmount {
    type Error = AmountError;

    fn try_from(repr: AmountRepr) -> Result<Self, Self::Error> {
        let raw = repr.raw.parse().map_err(|_| AmountError::Parse(repr.raw.clone()))?;
        Self::from_raw(raw, repr.decimals)
    }
}

impl FixedPointAmount {
    /// Build an amount from raw scaled units.
    pub fn from_raw(raw: u128, decimals: u8) -> Result<Self, AmountError> {
        if decimals > MAX_DECIMALS {
            return Err(AmountError::InvalidDecimals(decimals));
        }
        Ok(Self { raw, decimals })
    }

    /// Zero at the given scale.
    pub fn zero(decimals: u8) -> Result<Self, AmountError> {
        Self::from_raw(0, decimals)
    }

    /// Build an amount from whole token units (`from_units(100, 18)` is 100 tokens).
    pub fn from_units(units: u128, decimals: u8) -> Result<Self, AmountError> {
        let factor = pow10(decimals)?;
        let raw = units.checked_mul(factor).ok_or(AmountError::Overflow)?;
        Self::from_raw(raw, decimals)
    }

    /// Parse a human-readable decimal string such as `"12.5"` at the given scale.
    ///
    /// More fractional digits than `decimals` is a `PrecisionLoss`, not a
    /// silent truncation.
    pub fn parse_units(s: &str, decimals: u8) -> Result<Self, AmountError> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Parse(s.to_string()));
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::Parse(s.to_string()));
        }
        let frac = frac.trim_end_matches('0');
        if frac.len() > decimals as usize {
            return Err(AmountError::PrecisionLoss);
        }

        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        let mut raw = whole_units
            .checked_mul(pow10(decimals)?)
            .ok_or(AmountError::Overflow)?;
        if !frac.is_empty() {
            let frac_value: u128 = frac.parse().map_err(|_| AmountError::Parse(s.to_string()))?;
            let shift = pow10(decimals - frac.len() as u8)?;
            let frac_raw = frac_value.checked_mul(shift).ok_or(AmountError::Overflow)?;
            raw = raw.checked_add(frac_raw).ok_or(AmountError::Overflow)?;
        }
        Self::from_raw(raw, decimals)
    }

    /// Another amount at the same scale.
    pub fn with_raw(&self, raw: u128) -> Self {
        Self { raw, ..*self }
    }

    pub fn raw(&self) -> u128 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw == 0
    }

    /// Fails with `ScaleMismatch` unless `other` carries the same scale.
    pub fn ensure_same_scale(&self, other: &Self) -> Result<(), AmountError> {
        if self.decimals != other.decimals {
            return Err(AmountError::ScaleMismatch {
                expected: self.decimals,
                actual: other.decimals,
            });
        }
        Ok(())
    }

    pub fn add(self, other: Self) -> Result<Self, AmountError> {
        self.ensure_same_scale(&other)?;
        let raw = self.raw.checked_add(other.raw).ok_or(AmountError::Overflow)?;
        Ok(Self { raw, ..self })
    }

    pub fn sub(self, other: Self) -> Result<Self, AmountError> {
        self.ensure_same_scale(&other)?;
        let raw = self.raw.checked_sub(other.raw).ok_or(AmountError::Underflow)?;
        Ok(Self { raw, ..self })
    }

    /// `self * numerator / denominator`, keeping the scale of `self`.
    pub fn mul_div(self, numerator: u128, denominator: u128) -> Result<Self, AmountError> {
        let raw = mul_div(self.raw, numerator, denominator)?;
        Ok(Self { raw, ..self })
    }

    /// Convert to another scale. Scaling down must be exact.
    pub fn rescale(self, new_decimals: u8) -> Result<Self, AmountError> {
        if new_decimals > MAX_DECIMALS {
            return Err(AmountError::InvalidDecimals(new_decimals));
        }
        let raw = if new_decimals >= self.decimals {
            let factor = pow10(new_decimals - self.decimals)?;
            self.raw.checked_mul(factor).ok_or(AmountError::Overflow)?
        } else {
            let factor = pow10(self.decimals - new_decimals)?;
            if self.raw % factor != 0 {
                return Err(AmountError::PrecisionLoss);
            }
            self.raw / factor
        };
        Ok(Self {
            raw,
            decimals: new_decimals,
        })
    }
}

impl PartialOrd for FixedPointAmount {
    /// Amounts at different scales are not comparable.
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        if self.decimals != other.decimals {
            return None;
        }
        Some(self.raw.cmp(&other.raw))
    }
}

impl fmt::Display for FixedPointAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.decimals == 0 {
            return write!(f, "{}", self.raw);
        }
        // decimals is bounded by MAX_DECIMALS, so the factor always fits.
        let factor = 10u128.pow(self.decimals as u32);
        let whole = self.raw / factor;
        let frac = self.raw % factor;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let frac = format!("{:0width$}", frac, width = self.decimals as usize);
        write!(f, "{}.{}", whole, frac.trim_end_matches('0'))
    }
}

/// `a * b / denom` through a 256-bit intermediate, rounding down.
///
/// Only the final quotient has to fit in a `u128`.
pub fn mul_div(a: u128, b: u128, denom: u128) -> Result<u128, AmountError> {
    if denom == 0 {
        return Err(AmountError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let quotient = product / U256::from(denom);
    if quotient > U256::from(u128::MAX) {
        return Err(AmountError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// `a * b / denom` through a 256-bit intermediate, rounding up.
pub fn mul_div_ceil(a: u128, b: u128, denom: u128) -> Result<u128, AmountError> {
    if denom == 0 {
        return Err(AmountError::DivisionByZero);
    }
    let product = U256::from(a) * U256::from(b);
    let denom = U256::from(denom);
    let mut quotient = product / denom;
    if !(product % denom).is_zero() {
        quotient += U256::one();
    }
    if quotient > U256::from(u128::MAX) {
        return Err(AmountError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// `10^exp` for `exp <= MAX_DECIMALS`.
pub fn pow10(exp: u8) -> Result<u128, AmountError> {
    if exp > MAX_DECIMALS {
        return Err(AmountError::InvalidDecimals(exp));
    }
    Ok(10u128.pow(exp as u32))
}
