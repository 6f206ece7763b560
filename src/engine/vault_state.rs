//! Vault aggregate state and investor position valuation.

use super::tokens::token;
use super::{Engine, EngineError};
use crate::chain::abi::{IBeefyVault, IERC20};
use crate::chain::CallBatch;
use crate::db::UnitOfWork;
use crate::domain::{
    ppfs_to_rate, raw_shares_to_raw_underlying, BlockRef, Decimal, Investor, InvestorPosition,
    MathError, Strategy, Token, Vault, PPFS_DECIMALS,
};
use crate::domain::decimal::pow10;
use crate::registry::{Platform, VaultConfig};
use alloy_primitives::{Address, U256};
use std::collections::HashMap;
use tracing::debug;

impl Engine {
    pub(super) async fn handle_harvest(
        &self,
        uow: &mut UnitOfWork,
        strategy_address: Address,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let Some(strategy) = uow
            .load::<Strategy>(&Strategy::id_for(strategy_address))
            .await?
        else {
            debug!(strategy = %strategy_address, "harvest from unknown strategy ignored");
            return Ok(());
        };
        let Some(config) = self.vault_config(strategy.vault) else {
            debug!(strategy = %strategy_address, "harvest from detached strategy ignored");
            return Ok(());
        };
        let Some(mut vault) = self.running_vault(uow, strategy.vault).await? else {
            return Ok(());
        };
        if vault.strategy != strategy_address {
            debug!(strategy = %strategy_address, vault = %vault.address, current = %vault.strategy, "harvest from replaced strategy ignored");
            return Ok(());
        }
        self.harvest_refresh(uow, &mut vault, config, block).await
    }

    /// Everything a harvest changes: aggregates, position valuations and the
    /// breakdown. Share balances are untouched.
    pub(super) async fn harvest_refresh(
        &self,
        uow: &mut UnitOfWork,
        vault: &mut Vault,
        config: &VaultConfig,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let tokens = self.refresh_vault_state(uow, vault, block).await?;
        self.revalue_positions(uow, vault, &tokens).await?;
        self.refresh_breakdown(uow, vault, config, block).await
    }

    /// Re-read price per full share, underlying balance and total supply.
    /// Returns the share and underlying token metadata.
    pub(super) async fn refresh_vault_state(
        &self,
        uow: &mut UnitOfWork,
        vault: &mut Vault,
        block: BlockRef,
    ) -> Result<HashMap<Address, Token>, EngineError> {
        let tokens = self
            .ensure_tokens(uow, &[vault.shares_token, vault.underlying_token], block)
            .await?;
        let shares = token(&tokens, vault.shares_token)?.decimals;
        let underlying = token(&tokens, vault.underlying_token)?.decimals;

        let (ppfs, raw_balance, raw_supply) = if vault.underlying_platform == Platform::BeefyClm {
            // a manager share is one unit of itself
            let mut batch = CallBatch::new();
            let supply = batch.add(vault.address, IERC20::totalSupplyCall {});
            let supply = batch
                .execute(self.reader.as_ref(), block.number)
                .await?
                .get(supply)?;
            let one = pow10(u32::from(PPFS_DECIMALS))
                .ok_or(MathError::IntegerOverflow("ppfs scale"))?;
            (one, supply, supply)
        } else {
            let mut batch = CallBatch::new();
            let ppfs = batch.add(vault.address, IBeefyVault::getPricePerFullShareCall {});
            let balance = batch.add(vault.address, IBeefyVault::balanceCall {});
            let supply = batch.add(vault.address, IBeefyVault::totalSupplyCall {});
            let results = batch.execute(self.reader.as_ref(), block.number).await?;
            (
                results.get(ppfs)?,
                results.get(balance)?,
                results.get(supply)?,
            )
        };

        vault.price_per_full_share = ppfs;
        vault.share_to_underlying_rate = ppfs_to_rate(ppfs, underlying)?;
        vault.raw_underlying_balance = raw_balance;
        vault.underlying_balance = Decimal::from_raw(raw_balance, underlying)?;
        vault.raw_shares_total_supply = raw_supply;
        vault.shares_total_supply = Decimal::from_raw(raw_supply, shares)?;
        uow.save(vault)?;

        debug!(
            vault = %vault.address,
            ppfs = %ppfs,
            underlying = %vault.underlying_balance,
            supply = %vault.shares_total_supply,
            "vault state refreshed"
        );
        Ok(tokens)
    }

    /// Re-read the share balances of `investors` (vault plus every staking
    /// contract) in one batch and store their positions.
    pub(super) async fn refresh_positions(
        &self,
        uow: &mut UnitOfWork,
        vault: &Vault,
        config: &VaultConfig,
        investors: &[Address],
        tokens: &HashMap<Address, Token>,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let holders: Vec<Address> = std::iter::once(vault.address)
            .chain(config.staking_addresses())
            .collect();

        let mut batch = CallBatch::new();
        let handles: Vec<Vec<_>> = investors
            .iter()
            .map(|investor| {
                holders
                    .iter()
                    .map(|holder| batch.add(*holder, IERC20::balanceOfCall { account: *investor }))
                    .collect()
            })
            .collect();
        let results = batch.execute(self.reader.as_ref(), block.number).await?;

        for (investor, balances) in investors.iter().zip(handles) {
            let mut raw_shares = U256::ZERO;
            for handle in balances {
                raw_shares = raw_shares
                    .checked_add(results.get(handle)?)
                    .ok_or(MathError::IntegerOverflow("position shares"))?;
            }

            if uow.load::<Investor>(&Investor::id_for(*investor)).await?.is_none() {
                uow.save(&Investor { address: *investor })?;
            }
            let mut position = uow
                .load::<InvestorPosition>(&InvestorPosition::id_for(vault.address, *investor))
                .await?
                .unwrap_or_else(|| InvestorPosition::new(vault.address, *investor));
            position.raw_shares_balance = raw_shares;
            value_position(&mut position, vault, tokens)?;
            uow.save(&position)?;
            debug!(vault = %vault.address, investor = %investor, shares = %position.shares_balance, "position refreshed");
        }
        Ok(())
    }

    /// Re-value every stored position at the vault's current rate.
    async fn revalue_positions(
        &self,
        uow: &mut UnitOfWork,
        vault: &Vault,
        tokens: &HashMap<Address, Token>,
    ) -> Result<(), EngineError> {
        let positions = uow
            .load_by_prefix::<InvestorPosition>(&InvestorPosition::vault_prefix(vault.address))
            .await?;
        for mut position in positions {
            let before = position.raw_underlying_balance;
            value_position(&mut position, vault, tokens)?;
            if position.raw_underlying_balance != before {
                uow.save(&position)?;
            }
        }
        Ok(())
    }
}

/// Derive the decimal and underlying fields of a position from its raw
/// share balance.
fn value_position(
    position: &mut InvestorPosition,
    vault: &Vault,
    tokens: &HashMap<Address, Token>,
) -> Result<(), EngineError> {
    let shares = token(tokens, vault.shares_token)?.decimals;
    let underlying = token(tokens, vault.underlying_token)?.decimals;
    position.shares_balance = Decimal::from_raw(position.raw_shares_balance, shares)?;
    position.raw_underlying_balance = raw_shares_to_raw_underlying(
        vault.price_per_full_share,
        position.raw_shares_balance,
        underlying,
    )?;
    position.underlying_balance = Decimal::from_raw(position.raw_underlying_balance, underlying)?;
    Ok(())
}
