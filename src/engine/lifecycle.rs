//! Vault and strategy initialization, and strategy upgrades.

use super::{Engine, EngineError};
use crate::chain::abi::{IBeefyStrategy, IBeefyVault};
use crate::chain::CallBatch;
use crate::db::UnitOfWork;
use crate::domain::{BlockRef, Strategy, Vault, VaultLifecycle};
use crate::registry::{Platform, VaultConfig};
use alloy_primitives::Address;
use tracing::{debug, info, warn};

impl Engine {
    pub(super) async fn handle_vault_initialized(
        &self,
        uow: &mut UnitOfWork,
        vault_address: Address,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let Some(config) = self.vault_config(vault_address) else {
            debug!(address = %vault_address, "initialization of unregistered vault ignored");
            return Ok(());
        };

        let mut vault = uow
            .load::<Vault>(&Vault::id_for(vault_address))
            .await?
            .unwrap_or_else(|| Vault::new(config));
        if vault.lifecycle != VaultLifecycle::Initializing {
            debug!(vault = %vault_address, "repeated vault initialization ignored");
            return Ok(());
        }

        let mut batch = CallBatch::new();
        let strategy_call = batch.add(vault_address, IBeefyVault::strategyCall {});
        let strategy_address = batch
            .execute(self.reader.as_ref(), block.number)
            .await?
            .get(strategy_call)?;

        vault.is_initialized = true;
        vault.strategy = strategy_address;

        // The strategy may have initialized before we saw it. Its own event
        // is authoritative; otherwise it counts as initialized once it
        // points back at this vault.
        let mut strategy = uow
            .load::<Strategy>(&Strategy::id_for(strategy_address))
            .await?
            .unwrap_or_else(|| Strategy::new(strategy_address));
        if !strategy.is_initialized {
            let mut batch = CallBatch::new();
            let vault_call = batch.add(strategy_address, IBeefyStrategy::vaultCall {});
            let results = batch.execute(self.reader.as_ref(), block.number).await?;
            if results.try_get(vault_call)? == Some(vault_address) {
                strategy.is_initialized = true;
                strategy.vault = vault_address;
                uow.save(&strategy)?;
            }
        }

        if strategy.is_initialized && strategy.vault == vault_address {
            self.start_running(uow, &mut vault, config, block).await?;
        } else {
            debug!(vault = %vault_address, strategy = %strategy_address, "waiting for strategy initialization");
        }
        uow.save(&vault)?;
        Ok(())
    }

    pub(super) async fn handle_strategy_initialized(
        &self,
        uow: &mut UnitOfWork,
        strategy_address: Address,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        let mut batch = CallBatch::new();
        let vault_call = batch.add(strategy_address, IBeefyStrategy::vaultCall {});
        let vault_address = batch
            .execute(self.reader.as_ref(), block.number)
            .await?
            .get(vault_call)?;

        let Some(config) = self.vault_config(vault_address) else {
            debug!(strategy = %strategy_address, vault = %vault_address, "strategy of unregistered vault ignored");
            return Ok(());
        };

        let mut vault = uow
            .load::<Vault>(&Vault::id_for(vault_address))
            .await?
            .unwrap_or_else(|| Vault::new(config));
        // a started vault only listens to its current strategy
        if vault.lifecycle != VaultLifecycle::Initializing && vault.strategy != strategy_address {
            debug!(vault = %vault_address, strategy = %strategy_address, current = %vault.strategy, "initialization of replaced strategy ignored");
            return Ok(());
        }

        let mut strategy = uow
            .load::<Strategy>(&Strategy::id_for(strategy_address))
            .await?
            .unwrap_or_else(|| Strategy::new(strategy_address));
        strategy.is_initialized = true;
        strategy.vault = vault_address;
        uow.save(&strategy)?;

        if vault.strategy == Address::ZERO {
            vault.strategy = strategy_address;
        }
        if vault.is_initialized && vault.strategy == strategy_address {
            self.start_running(uow, &mut vault, config, block).await?;
        } else {
            debug!(vault = %vault_address, strategy = %strategy_address, "waiting for vault initialization");
        }
        uow.save(&vault)?;
        Ok(())
    }

    pub(super) async fn handle_upgrade_strat(
        &self,
        uow: &mut UnitOfWork,
        vault_address: Address,
        implementation: Address,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        if self.vault_config(vault_address).is_none() {
            return Ok(());
        }
        let Some(mut vault) = self.running_vault(uow, vault_address).await? else {
            return Ok(());
        };
        if vault.strategy == implementation {
            return Ok(());
        }

        let previous = vault.strategy;
        if let Some(mut old) = uow.load::<Strategy>(&Strategy::id_for(previous)).await? {
            old.invalidate();
            uow.save(&old)?;
        }

        let mut strategy = uow
            .load::<Strategy>(&Strategy::id_for(implementation))
            .await?
            .unwrap_or_else(|| Strategy::new(implementation));
        if strategy.is_initialized && strategy.vault != vault_address {
            warn!(strategy = %implementation, owner = %strategy.vault, vault = %vault_address, "strategy moved between vaults");
        }
        strategy.is_initialized = true;
        strategy.vault = vault_address;
        uow.save(&strategy)?;

        vault.strategy = implementation;
        uow.save(&vault)?;
        info!(vault = %vault_address, from = %previous, to = %implementation, block = block.number, "strategy upgraded");
        Ok(())
    }

    /// Cache the share and underlying tokens and mark the vault RUNNING.
    /// A vault already past INITIALIZING is left as is.
    async fn start_running(
        &self,
        uow: &mut UnitOfWork,
        vault: &mut Vault,
        config: &VaultConfig,
        block: BlockRef,
    ) -> Result<(), EngineError> {
        if vault.lifecycle != VaultLifecycle::Initializing {
            return Ok(());
        }

        let underlying = match config.platform {
            // the manager's shares are its own underlying
            Platform::BeefyClm => vault.address,
            _ => {
                let mut batch = CallBatch::new();
                let want = batch.add(vault.address, IBeefyVault::wantCall {});
                batch
                    .execute(self.reader.as_ref(), block.number)
                    .await?
                    .get(want)?
            }
        };
        self.ensure_tokens(uow, &[vault.address, underlying], block)
            .await?;

        vault.shares_token = vault.address;
        vault.underlying_token = underlying;
        vault.lifecycle = VaultLifecycle::Running;
        vault.initialized_at_block = block.number;
        vault.initialized_at_timestamp = block.timestamp;
        info!(vault = %vault.address, key = %vault.vault_key, underlying = %underlying, "vault running");
        Ok(())
    }
}
