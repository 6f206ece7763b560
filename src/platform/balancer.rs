//! Balancer pools, staked through Aura.

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::{IBalancerPool, IBalancerVault};
use crate::chain::{CallBatch, ChainReader, ChainError};
use crate::domain::Vault;

pub(super) async fn breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let pool = want(vault)?;
    let mut batch = CallBatch::new();
    let balancer_vault = batch.add(pool, IBalancerPool::getVaultCall {});
    let pool_id = batch.add(pool, IBalancerPool::getPoolIdCall {});
    let supply = batch.add(pool, IBalancerPool::getActualSupplyCall {});
    let results = batch.execute(reader, block).await?;

    let balancer_vault = results.get(balancer_vault)?;
    let pool_id = results.get(pool_id)?;
    let supply = results.get(supply)?;

    let mut batch = CallBatch::new();
    let tokens = batch.add(
        balancer_vault,
        IBalancerVault::getPoolTokensCall { poolId: pool_id },
    );
    let pool_tokens = batch.execute(reader, block).await?.get(tokens)?;
    if pool_tokens.tokens.len() != pool_tokens.balances.len() {
        return Err(ChainError::Decode {
            target: balancer_vault,
            function: "getPoolTokens(bytes32)",
            message: format!(
                "{} tokens but {} balances",
                pool_tokens.tokens.len(),
                pool_tokens.balances.len()
            ),
        }
        .into());
    }

    let held = vault.raw_underlying_balance;
    pool_tokens
        .tokens
        .iter()
        .zip(pool_tokens.balances.iter())
        // composable pools list their own BPT among the tokens
        .filter(|(token, _)| **token != pool)
        .map(|(token, balance)| Ok(TokenBalance::new(*token, proportional(*balance, held, supply)?)))
        .collect()
}
