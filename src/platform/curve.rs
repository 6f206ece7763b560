//! Curve pools whose LP token is the pool contract itself. Meta pools are
//! not decomposed further.

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::ICurvePool;
use crate::chain::{CallBatch, ChainReader};
use crate::domain::Vault;
use alloy_primitives::U256;

/// Upper bound when probing `coins(i)`; pools do not expose their coin count.
pub const CURVE_MAX_COINS: usize = 8;

/// Every pool has at least this many coins; a revert below it is fatal.
const CURVE_MIN_COINS: usize = 2;

pub(super) async fn breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let pool = want(vault)?;
    let mut batch = CallBatch::new();
    let supply = batch.add(pool, ICurvePool::totalSupplyCall {});
    let coin_handles: Vec<_> = (0..CURVE_MAX_COINS)
        .map(|i| batch.add(pool, ICurvePool::coinsCall { i: U256::from(i) }))
        .collect();
    let results = batch.execute(reader, block).await?;

    let supply = results.get(supply)?;
    let mut coins = Vec::with_capacity(CURVE_MAX_COINS);
    for (i, handle) in coin_handles.into_iter().enumerate() {
        if i < CURVE_MIN_COINS {
            coins.push(results.get(handle)?);
            continue;
        }
        match results.try_get(handle)? {
            Some(coin) => coins.push(coin),
            None => break,
        }
    }

    let mut batch = CallBatch::new();
    let balance_handles: Vec<_> = (0..coins.len())
        .map(|i| batch.add(pool, ICurvePool::balancesCall { i: U256::from(i) }))
        .collect();
    let results = batch.execute(reader, block).await?;

    let held = vault.raw_underlying_balance;
    coins
        .into_iter()
        .zip(balance_handles)
        .map(|(coin, handle)| {
            let reserve = results.get(handle)?;
            Ok(TokenBalance::new(coin, proportional(reserve, held, supply)?))
        })
        .collect()
}
