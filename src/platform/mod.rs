//! Per-platform decomposition of a vault's locked value into the tokens it
//! is made of.
//!
//! Every formula receives a vault whose aggregate state was refreshed in the
//! same pass, so `raw_underlying_balance` is the vault's current holding of
//! its want token. Independent reads go out as one batch; reads that need an
//! earlier result use one more batch each.

mod balancer;
mod clm;
mod concentrated;
mod curve;
mod passthrough;
mod pendle;
mod reserves;

pub use curve::CURVE_MAX_COINS;
pub use pendle::PENDLE_ROUTER;

use crate::chain::{ChainError, ChainReader};
use crate::domain::{MathError, Vault};
use crate::registry::Platform;
use alloy_primitives::{Address, U256};
use thiserror::Error;

/// Raw amount of one token held through a vault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBalance {
    pub token: Address,
    pub raw_balance: U256,
}

impl TokenBalance {
    pub fn new(token: Address, raw_balance: U256) -> Self {
        TokenBalance { token, raw_balance }
    }
}

#[derive(Debug, Error)]
pub enum BreakdownError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error("arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("{field} reported by {contract} is negative")]
    NegativeState {
        contract: Address,
        field: &'static str,
    },

    #[error("vault {0} has no underlying token yet")]
    MissingUnderlying(Address),
}

/// Decompose `vault` at `block` with the formula of its platform.
pub async fn breakdown(
    reader: &dyn ChainReader,
    vault: &Vault,
    block: u64,
) -> Result<Vec<TokenBalance>, BreakdownError> {
    match vault.underlying_platform {
        Platform::TrackOnlyShareTokenBalance => Ok(Vec::new()),
        Platform::Aave
        | Platform::MendiLending
        | Platform::MendiLeverage
        | Platform::TrackOnlyShareAndUnderlyingTokenBalance => passthrough::breakdown(vault),
        Platform::BeefyClm => clm::manager_breakdown(reader, vault, block).await,
        Platform::BeefyClmVault => clm::wrapper_breakdown(reader, vault, block).await,
        Platform::Solidly => reserves::solidly_breakdown(reader, vault, block).await,
        Platform::Lynex | Platform::Nile => reserves::pair_breakdown(reader, vault, block).await,
        Platform::Gamma => concentrated::gamma_breakdown(reader, vault, block).await,
        Platform::IchiLynex => concentrated::ichi_breakdown(reader, vault, block).await,
        Platform::BalancerAura => balancer::breakdown(reader, vault, block).await,
        Platform::Curve => curve::breakdown(reader, vault, block).await,
        Platform::PendleEquilibria => pendle::breakdown(reader, vault, block).await,
    }
}

/// `amount * balance / supply`, rounded down. An empty pool holds nothing.
pub(crate) fn proportional(
    amount: U256,
    balance: U256,
    supply: U256,
) -> Result<U256, BreakdownError> {
    if supply.is_zero() {
        return Ok(U256::ZERO);
    }
    let product = amount
        .checked_mul(balance)
        .ok_or(BreakdownError::Overflow("proportional share"))?;
    Ok(product / supply)
}

/// Address of the pool, market or manager the vault deposits into.
pub(crate) fn want(vault: &Vault) -> Result<Address, BreakdownError> {
    if vault.underlying_token == Address::ZERO {
        return Err(BreakdownError::MissingUnderlying(vault.address));
    }
    Ok(vault.underlying_token)
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::Vault;
    use crate::registry::{Platform, VaultConfig};
    use alloy_primitives::{address, Address, U256};

    pub const VAULT: Address = address!("00000000000000000000000000000000000000a1");
    pub const WANT: Address = address!("00000000000000000000000000000000000000a2");
    pub const TOKEN0: Address = address!("00000000000000000000000000000000000000c0");
    pub const TOKEN1: Address = address!("00000000000000000000000000000000000000c1");

    pub fn running_vault(platform: Platform, raw_underlying_balance: u64) -> Vault {
        let mut vault = Vault::new(&VaultConfig::new("test-vault", platform, VAULT));
        vault.shares_token = VAULT;
        vault.underlying_token = WANT;
        vault.raw_underlying_balance = U256::from(raw_underlying_balance);
        vault
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::chain::MockChainReader;

    #[test]
    fn test_proportional_rounds_down_and_handles_empty_supply() {
        let p = proportional(U256::from(10u64), U256::from(1u64), U256::from(3u64)).unwrap();
        assert_eq!(p, U256::from(3u64));
        let p = proportional(U256::from(10u64), U256::from(5u64), U256::ZERO).unwrap();
        assert_eq!(p, U256::ZERO);
        assert!(matches!(
            proportional(U256::MAX, U256::from(2u64), U256::from(1u64)),
            Err(BreakdownError::Overflow(_))
        ));
    }

    #[tokio::test]
    async fn test_share_only_platform_is_empty_without_chain_reads() {
        let reader = MockChainReader::new();
        let vault = running_vault(Platform::TrackOnlyShareTokenBalance, 100);
        let balances = breakdown(&reader, &vault, 1).await.unwrap();
        assert!(balances.is_empty());
        assert_eq!(reader.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_every_platform_dispatches() {
        // With no responses configured every chain-backed formula fails on a
        // revert; the flag-only ones succeed. No platform is left unhandled.
        let reader = MockChainReader::new();
        for platform in Platform::ALL {
            let vault = running_vault(platform, 100);
            let result = breakdown(&reader, &vault, 1).await;
            match platform {
                Platform::TrackOnlyShareTokenBalance
                | Platform::TrackOnlyShareAndUnderlyingTokenBalance
                | Platform::Aave
                | Platform::MendiLending
                | Platform::MendiLeverage => assert!(result.is_ok(), "{}", platform),
                _ => assert!(
                    matches!(result, Err(BreakdownError::Chain(ChainError::Reverted { .. }))),
                    "{}: {:?}",
                    platform,
                    result
                ),
            }
        }
    }
}
