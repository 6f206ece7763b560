//! Concentrated liquidity managers.

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::IBeefyClmManager;
use crate::chain::{CallBatch, ChainReader};
use crate::domain::Vault;

/// The vault is the manager: its whole position belongs to its holders.
pub(super) async fn manager_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let mut batch = CallBatch::new();
    let wants = batch.add(vault.address, IBeefyClmManager::wantsCall {});
    let balances = batch.add(vault.address, IBeefyClmManager::balancesCall {});
    let results = batch.execute(reader, block).await?;

    let wants = results.get(wants)?;
    let balances = results.get(balances)?;
    Ok(vec![
        TokenBalance::new(wants.token0, balances.amount0),
        TokenBalance::new(wants.token1, balances.amount1),
    ])
}

/// The vault holds manager shares; it owns `balance / supply` of the
/// manager's position.
pub(super) async fn wrapper_breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let manager = want(vault)?;
    let mut batch = CallBatch::new();
    let wants = batch.add(manager, IBeefyClmManager::wantsCall {});
    let balances = batch.add(manager, IBeefyClmManager::balancesCall {});
    let supply = batch.add(manager, IBeefyClmManager::totalSupplyCall {});
    let results = batch.execute(reader, block).await?;

    let wants = results.get(wants)?;
    let balances = results.get(balances)?;
    let supply = results.get(supply)?;
    let held = vault.raw_underlying_balance;
    Ok(vec![
        TokenBalance::new(wants.token0, proportional(balances.amount0, held, supply)?),
        TokenBalance::new(wants.token1, proportional(balances.amount1, held, supply)?),
    ])
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::chain::MockChainReader;
    use crate::registry::Platform;
    use alloy_primitives::U256;

    fn manager_reader(manager: alloy_primitives::Address) -> MockChainReader {
        MockChainReader::new()
            .with_response(manager, IBeefyClmManager::wantsCall {}, (TOKEN0, TOKEN1))
            .with_response(
                manager,
                IBeefyClmManager::balancesCall {},
                (U256::from(500u64), U256::from(900u64)),
            )
            .with_response(manager, IBeefyClmManager::totalSupplyCall {}, U256::from(1_000u64))
    }

    #[tokio::test]
    async fn test_manager_reports_its_full_position() {
        let reader = manager_reader(VAULT);
        let vault = running_vault(Platform::BeefyClm, 1_000);
        let balances = manager_breakdown(&reader, &vault, 1).await.unwrap();
        assert_eq!(
            balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(500u64)),
                TokenBalance::new(TOKEN1, U256::from(900u64)),
            ]
        );
        assert_eq!(reader.round_trips(), 1);
    }

    #[tokio::test]
    async fn test_wrapper_scales_by_its_manager_share() {
        let reader = manager_reader(WANT);
        let vault = running_vault(Platform::BeefyClmVault, 250);
        let balances = wrapper_breakdown(&reader, &vault, 1).await.unwrap();
        assert_eq!(
            balances,
            vec![
                TokenBalance::new(TOKEN0, U256::from(125u64)),
                TokenBalance::new(TOKEN1, U256::from(225u64)),
            ]
        );
    }
}
