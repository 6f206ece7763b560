//! Pendle markets, staked through Equilibria. The vault's LP is valued in the
//! SY token's yield token only.

use super::{proportional, want, BreakdownError, TokenBalance};
use crate::chain::abi::{IPendleMarket, IPendleSy};
use crate::chain::{CallBatch, ChainReader};
use crate::domain::Vault;
use alloy_primitives::{address, Address, I256, U256};

/// Router passed to `readState`; the same deployment on every network.
pub const PENDLE_ROUTER: Address = address!("00000000005bbb0ef59571e58418f9a4357b68a0");

pub(super) async fn breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    let market = want(vault)?;
    let mut batch = CallBatch::new();
    let tokens = batch.add(market, IPendleMarket::readTokensCall {});
    let state = batch.add(
        market,
        IPendleMarket::readStateCall {
            router: PENDLE_ROUTER,
        },
    );
    let results = batch.execute(reader, block).await?;

    let sy = results.get(tokens)?.sy;
    let state = results.get(state)?;
    let total_sy = non_negative(market, "totalSy", state.totalSy)?;
    let total_lp = non_negative(market, "totalLp", state.totalLp)?;

    let mut batch = CallBatch::new();
    let yield_token = batch.add(sy, IPendleSy::yieldTokenCall {});
    let yield_token = batch.execute(reader, block).await?.get(yield_token)?;

    Ok(vec![TokenBalance::new(
        yield_token,
        proportional(total_sy, vault.raw_underlying_balance, total_lp)?,
    )])
}

fn non_negative(contract: Address, field: &'static str, value: I256) -> Result<U256, BreakdownError> {
    if value.is_negative() {
        return Err(BreakdownError::NegativeState { contract, field });
    }
    Ok(value.into_raw())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::chain::MockChainReader;
    use crate::registry::Platform;

    const SY: Address = address!("00000000000000000000000000000000000000d1");

    fn state(total_sy: i64, total_lp: i64) -> IPendleMarket::MarketState {
        IPendleMarket::MarketState {
            totalPt: I256::try_from(5_000i64).unwrap(),
            totalSy: I256::try_from(total_sy).unwrap(),
            totalLp: I256::try_from(total_lp).unwrap(),
            treasury: Address::ZERO,
            scalarRoot: I256::ZERO,
            expiry: U256::from(1_750_000_000u64),
            lnFeeRateRoot: U256::ZERO,
            reserveFeePercent: U256::ZERO,
            lastLnImpliedRate: U256::ZERO,
        }
    }

    fn reader(total_sy: i64, total_lp: i64) -> MockChainReader {
        MockChainReader::new()
            .with_response(WANT, IPendleMarket::readTokensCall {}, (SY, TOKEN1, TOKEN0))
            .with_response(
                WANT,
                IPendleMarket::readStateCall {
                    router: PENDLE_ROUTER,
                },
                state(total_sy, total_lp),
            )
            .with_response(SY, IPendleSy::yieldTokenCall {}, TOKEN0)
    }

    #[tokio::test]
    async fn test_lp_valued_in_yield_token() {
        let reader = reader(9_000, 3_000);
        let vault = running_vault(Platform::PendleEquilibria, 1_000);
        let balances = breakdown(&reader, &vault, 1).await.unwrap();
        assert_eq!(balances, vec![TokenBalance::new(TOKEN0, U256::from(3_000u64))]);
        assert_eq!(reader.round_trips(), 2);
    }

    #[tokio::test]
    async fn test_negative_market_state_is_rejected() {
        let reader = reader(-1, 3_000);
        let vault = running_vault(Platform::PendleEquilibria, 1_000);
        let err = breakdown(&reader, &vault, 1).await.unwrap_err();
        assert!(matches!(
            err,
            BreakdownError::NegativeState { field: "totalSy", .. }
        ));
    }
}
