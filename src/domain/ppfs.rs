//! Price-per-full-share conversions.
//!
//! A vault's ppfs is `balance() * 1e18 / totalSupply()`: underlying raw units
//! per 10^18 raw shares. Share tokens always carry 18 decimals.

use super::decimal::{pow10, Decimal, MathError, MAX_DECIMALS};
use alloy_primitives::U256;

/// Decimals of the ppfs fixed-point convention and of every share token.
pub const PPFS_DECIMALS: u8 = 18;

/// Decimal underlying amount per whole share.
///
/// With 18-decimal underlying tokens this is `ppfs / 10^18`; in general the
/// share scale cancels against the ppfs scale, leaving `ppfs / 10^decimals`.
pub fn ppfs_to_rate(ppfs: U256, underlying_decimals: u8) -> Result<Decimal, MathError> {
    if underlying_decimals > MAX_DECIMALS {
        return Err(MathError::UnsupportedDecimals(underlying_decimals));
    }
    Decimal::from_raw(ppfs, underlying_decimals)
}

/// Raw underlying amount held by `raw_shares`, rounded down like the vault
/// contract itself.
pub fn raw_shares_to_raw_underlying(
    ppfs: U256,
    raw_shares: U256,
    underlying_decimals: u8,
) -> Result<U256, MathError> {
    if underlying_decimals > MAX_DECIMALS {
        return Err(MathError::UnsupportedDecimals(underlying_decimals));
    }
    let scale =
        pow10(u32::from(PPFS_DECIMALS)).ok_or(MathError::IntegerOverflow("ppfs scale"))?;
    let product = raw_shares
        .checked_mul(ppfs)
        .ok_or(MathError::IntegerOverflow("raw_shares_to_raw_underlying"))?;
    Ok(product / scale)
}
