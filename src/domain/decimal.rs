//! Lossless decimal numeric type backed by rust_decimal.
//!
//! Provides exact conversion between raw on-chain integer amounts and
//! token-scaled decimal amounts, plus canonical string formatting.

use alloy_primitives::U256;
use rust_decimal::Decimal as RustDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Largest scale rust_decimal can represent.
pub const MAX_DECIMALS: u8 = 28;

/// Exclusive upper bound of the 96-bit rust_decimal mantissa.
const MANTISSA_LIMIT: u128 = 1 << 96;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("token decimals {0} cannot be represented (max {MAX_DECIMALS})")]
    UnsupportedDecimals(u8),
    #[error("raw amount {raw} with {decimals} decimals overflows the decimal range")]
    Overflow { raw: U256, decimals: u8 },
    #[error("integer overflow in {0}")]
    IntegerOverflow(&'static str),
    #[error("negative amount {0} cannot be converted to a raw token amount")]
    Negative(Decimal),
}

/// Lossless decimal numeric type for token amounts and exchange rates.
///
/// Serializes to a JSON string so persisted values never pass through a float.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    pub fn new(value: RustDecimal) -> Self {
        Decimal(value)
    }

    /// Parse a Decimal from a string losslessly.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s).map(Decimal)
    }

    /// Format without exponent notation and without trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalize())
    }

    pub fn inner(&self) -> RustDecimal {
        self.0
    }

    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Scale a raw token amount down by `10^decimals`.
    ///
    /// The result is exact whenever all digits fit in the 96-bit mantissa.
    /// Otherwise only the lowest fractional digits are truncated; an integer
    /// part that cannot be represented is an [`MathError::Overflow`].
    pub fn from_raw(raw: U256, decimals: u8) -> Result<Self, MathError> {
        if decimals > MAX_DECIMALS {
            return Err(MathError::UnsupportedDecimals(decimals));
        }

        let limit = U256::from(MANTISSA_LIMIT);
        let ten = U256::from(10u8);
        let mut mantissa = raw;
        let mut scale = u32::from(decimals);
        while mantissa >= limit {
            if scale == 0 {
                return Err(MathError::Overflow { raw, decimals });
            }
            mantissa /= ten;
            scale -= 1;
        }

        let mantissa =
            u128::try_from(mantissa).map_err(|_| MathError::Overflow { raw, decimals })?;
        let value = RustDecimal::try_from_i128_with_scale(mantissa as i128, scale)
            .map_err(|_| MathError::Overflow { raw, decimals })?;
        Ok(Decimal(value))
    }

    /// Scale back up to a raw token amount, truncating unrepresentable
    /// fractional digits toward zero.
    pub fn to_raw(&self, decimals: u8) -> Result<U256, MathError> {
        if self.is_negative() {
            return Err(MathError::Negative(*self));
        }

        let mantissa = U256::from(self.0.mantissa().unsigned_abs());
        let scale = self.0.scale();
        let target = u32::from(decimals);
        if target >= scale {
            let factor = pow10(target - scale).ok_or(MathError::IntegerOverflow("to_raw"))?;
            mantissa
                .checked_mul(factor)
                .ok_or(MathError::IntegerOverflow("to_raw"))
        } else {
            let factor = pow10(scale - target).ok_or(MathError::IntegerOverflow("to_raw"))?;
            Ok(mantissa / factor)
        }
    }
}

/// `10^exp` as a U256, `None` once it no longer fits.
pub fn pow10(exp: u32) -> Option<U256> {
    let ten = U256::from(10u8);
    (0..exp).try_fold(U256::from(1u8), |acc, _| acc.checked_mul(ten))
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<RustDecimal> for Decimal {
    fn from(value: RustDecimal) -> Self {
        Decimal(value)
    }
}

impl From<Decimal> for RustDecimal {
    fn from(value: Decimal) -> Self {
        value.0
    }
}

impl std::ops::Add for Decimal {
    type Output = Decimal;

    fn add(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 + rhs.0)
    }
}

impl std::ops::Mul for Decimal {
    type Output = Decimal;

    fn mul(self, rhs: Decimal) -> Decimal {
        Decimal(self.0 * rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_from_raw_scales_by_decimals() {
        let value = Decimal::from_raw(U256::from(1_500_000_000_000_000_000u128), 18).unwrap();
        assert_eq!(value, dec("1.5"));

        let value = Decimal::from_raw(U256::from(1_050_000u64), 6).unwrap();
        assert_eq!(value.to_canonical_string(), "1.05");

        let value = Decimal::from_raw(U256::from(42u64), 0).unwrap();
        assert_eq!(value, dec("42"));
    }

    #[test]
    fn test_from_raw_smallest_unit_is_exact() {
        let value = Decimal::from_raw(U256::from(1u8), 18).unwrap();
        assert_eq!(value.to_canonical_string(), "0.000000000000000001");
    }

    #[test]
    fn test_from_raw_integer_roundtrip() {
        for (raw, decimals) in [
            (U256::ZERO, 18u8),
            (U256::from(1u8), 18),
            (U256::from(123_456_789u64), 6),
            (U256::from(10u128.pow(27)), 18),
            (U256::from(u64::MAX), 8),
        ] {
            let value = Decimal::from_raw(raw, decimals).unwrap();
            assert_eq!(value.to_raw(decimals).unwrap(), raw, "raw {raw} decimals {decimals}");
        }
    }

    #[test]
    fn test_from_raw_truncates_only_beyond_mantissa() {
        // 2^100 does not fit in 96 bits; the two lowest fractional digits are dropped.
        let raw = U256::from(1u8) << 100;
        let value = Decimal::from_raw(raw, 18).unwrap();
        assert_eq!(value.to_canonical_string(), "1267650600228.2294014967032053");
        assert!(value.to_raw(18).unwrap() <= raw);
    }

    #[test]
    fn test_from_raw_integer_overflow_is_explicit() {
        let raw = U256::MAX;
        assert!(matches!(
            Decimal::from_raw(raw, 0),
            Err(MathError::Overflow { .. })
        ));
    }

    #[test]
    fn test_from_raw_rejects_unsupported_decimals() {
        assert_eq!(
            Decimal::from_raw(U256::from(1u8), 30),
            Err(MathError::UnsupportedDecimals(30))
        );
    }

    #[test]
    fn test_to_raw_truncates_instead_of_rounding() {
        assert_eq!(dec("1.999999").to_raw(2).unwrap(), U256::from(199u64));
        assert_eq!(dec("0.009").to_raw(2).unwrap(), U256::ZERO);
        assert_eq!(dec("2.5").to_raw(0).unwrap(), U256::from(2u8));
    }

    #[test]
    fn test_to_raw_rejects_negative() {
        assert!(matches!(
            dec("-1").to_raw(18),
            Err(MathError::Negative(_))
        ));
    }

    #[test]
    fn test_decimal_json_serialization_is_string() {
        let json = serde_json::to_value(dec("123.456")).unwrap();
        assert!(json.is_string());
        let back: Decimal = serde_json::from_value(json).unwrap();
        assert_eq!(back, dec("123.456"));
    }

    #[test]
    fn test_decimal_canonical_no_exponent() {
        let formatted = dec("1500.000").to_canonical_string();
        assert!(!formatted.contains('e'));
        assert_eq!(formatted, "1500");
    }

    #[test]
    fn test_pow10() {
        assert_eq!(pow10(0), Some(U256::from(1u8)));
        assert_eq!(pow10(18), Some(U256::from(10u128.pow(18))));
        assert_eq!(pow10(78), None);
    }
}
