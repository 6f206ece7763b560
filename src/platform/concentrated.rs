//! Managed concentrated-liquidity positions (Gamma hypervisors, ICHI vaults).

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::{IGammaHypervisor, IIchiVault};
use crate::chain::{CallBatch, ChainReader};
use crate::domain::Vault;

pub(super) async fn gamma_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let hypervisor = want(vault)?;
    let mut batch = CallBatch::new();
    let supply = batch.add(hypervisor, IGammaHypervisor::totalSupplyCall {});
    let amounts = batch.add(hypervisor, IGammaHypervisor::getTotalAmountsCall {});
    let token0 = batch.add(hypervisor, IGammaHypervisor::token0Call {});
    let token1 = batch.add(hypervisor, IGammaHypervisor::token1Call {});
    let results = batch.execute(reader, block).await?;

    let supply = results.get(supply)?;
    let amounts = results.get(amounts)?;
    let held = vault.raw_underlying_balance;
    Ok(vec![
        TokenBalance::new(results.get(token0)?, proportional(amounts.total0, held, supply)?),
        TokenBalance::new(results.get(token1)?, proportional(amounts.total1, held, supply)?),
    ])
}

/// ICHI vaults split liquidity into a base and a limit position.
pub(super) async fn ichi_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let ichi = want(vault)?;
    let mut batch = CallBatch::new();
    let supply = batch.add(ichi, IIchiVault::totalSupplyCall {});
    let base = batch.add(ichi, IIchiVault::getBasePositionCall {});
    let limit = batch.add(ichi, IIchiVault::getLimitPositionCall {});
    let token0 = batch.add(ichi, IIchiVault::token0Call {});
    let token1 = batch.add(ichi, IIchiVault::token1Call {});
    let results = batch.execute(reader, block).await?;

    let supply = results.get(supply)?;
    let base = results.get(base)?;
    let limit = results.get(limit)?;
    let amount0 = base
        .amount0
        .checked_add(limit.amount0)
        .ok_or(BreakdownError::Overflow("ichi amount0"))?;
    let amount1 = base
        .amount1
        .checked_add(limit.amount1)
        .ok_or(BreakdownError::Overflow("ichi amount1"))?;

    let held = vault.raw_underlying_balance;
    Ok(vec![
        TokenBalance::new(results.get(token0)?, proportional(amount0, held, supply)?),
        TokenBalance::new(results.get(token1)?, proportional(amount1, held, supply)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::chain::MockChainReader;
    use crate::registry::Platform;
    use alloy_primitives::U256;

    #[tokio::test]
    async fn test_gamma_total_amounts() {
        let reader = MockChainReader::new()
            .with_response(WANT, IGammaHypervisor::totalSupplyCall {}, U256::from(200u64))
            .with_response(
                WANT,
                IGammaHypervisor::getTotalAmountsCall {},
                (U256::from(1_000u64), U256::from(3_000u64)),
            )
            .with_response(WANT, IGammaHypervisor::token0Call {}, TOKEN0)
            .with_response(WANT, IGammaHypervisor::token1Call {}, TOKEN1);
        let vault = running_vault(Platform::Gamma, 50);
        let balances = gamma_breakdown(&reader, &vault, 1).await.unwrap();
        assert_eq!(
            balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(250u64)),
                TokenBalance::new(TOKEN1, U256::from(750u64)),
            ]
        );
    }

    #[tokio::test]
    async fn test_ichi_sums_base_and_limit_positions() {
        let reader = MockChainReader::new()
            .with_response(WANT, IIchiVault::totalSupplyCall {}, U256::from(10u64))
            .with_response(
                WANT,
                IIchiVault::getBasePositionCall {},
                (7u128, U256::from(60u64), U256::from(6u64)),
            )
            .with_response(
                WANT,
                IIchiVault::getLimitPositionCall {},
                (1u128, U256::from(40u64), U256::from(4u64)),
            )
            .with_response(WANT, IIchiVault::token0Call {}, TOKEN0)
            .with_response(WANT, IIchiVault::token1Call {}, TOKEN1);
        // 3 of 10 shares of (100, 10)
        let vault = running_vault(Platform::IchiLynex, 3);
        let balances = ichi_breakdown(&reader, &vault, 1).await.unwrap();
        assert_eq!(
            balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(30u64)),
                TokenBalance::new(TOKEN1, U256::from(3u64)),
            ]
        );
        assert_eq!(reader.round_trips(), 1);
    }
}
