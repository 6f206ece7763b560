//! Two-token constant-product pools.

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::{ISolidlyPool, IUniV2Pair};
use crate::chain::{CallBatch, ChainReader};
use crate::domain::Vault;

pub(super) async fn solidly_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let pool = want(vault)?;
    let mut batch = CallBatch::new();
    let metadata = batch.add(pool, ISolidlyPool::metadataCall {});
    let supply = batch.add(pool, ISolidlyPool::totalSupplyCall {});
    let results = batch.execute(reader, block).await?;

    let metadata = results.get(metadata)?;
    let supply = results.get(supply)?;
    let held = vault.raw_underlying_balance;
    Ok(vec![
        TokenBalance::new(metadata.t0, proportional(metadata.r0, held, supply)?),
        TokenBalance::new(metadata.t1, proportional(metadata.r1, held, supply)?),
    ])
}

/// Lynex and Nile pairs expose reserves and tokens individually.
pub(super) async fn pair_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let pair = want(vault)?;
    let mut batch = CallBatch::new();
    let supply = batch.add(pair, IUniV2Pair::totalSupplyCall {});
    let reserve0 = batch.add(pair, IUniV2Pair::reserve0Call {});
    let reserve1 = batch.add(pair, IUniV2Pair::reserve1Call {});
    let token0 = batch.add(pair, IUniV2Pair::token0Call {});
    let token1 = batch.add(pair, IUniV2Pair::token1Call {});
    let results = batch.execute(reader, block).await?;

    let supply = results.get(supply)?;
    let held = vault.raw_underlying_balance;
    Ok(vec![
        TokenBalance::new(
            results.get(token0)?,
            proportional(results.get(reserve0)?, held, supply)?,
        ),
        TokenBalance::new(
            results.get(token1)?,
            proportional(results.get(reserve1)?, held, supply)?,
        ),
    ])
}
