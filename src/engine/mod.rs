//! Balance reconciliation engine.
//!
//! Applies one chain event (or one clock tick) to the entity model inside a
//! caller-provided [`UnitOfWork`]. Every on-chain read happens at the
//! event's block. Any failure leaves the unit of work to be dropped by the
//! caller, so an event is either applied completely or not at all.

mod breakdown;
mod clock;
mod interaction;
mod lifecycle;
mod tokens;
mod vault_state;

use crate::chain::{ChainError, ChainReader};
use crate::db::{StoreError, UnitOfWork};
use crate::domain::{ChainEvent, EventEnvelope, MathError, RewardPool, Vault};
use crate::platform::BreakdownError;
use crate::registry::{VaultConfig, VaultRegistry};
use alloy_primitives::Address;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// One hour, the default clock period.
pub const DEFAULT_CLOCK_PERIOD: u64 = 3_600;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Registry network this engine indexes.
    pub network: String,
    /// Sender of mints and recipient of burns for share tokens.
    pub mint_address: Address,
    /// Seconds per clock tick bucket.
    pub clock_period: u64,
    /// Bucket sizes, in seconds, of investor token snapshots.
    pub snapshot_periods: Vec<u64>,
}

impl EngineSettings {
    pub fn new(network: impl Into<String>) -> Self {
        EngineSettings {
            network: network.into(),
            mint_address: Address::ZERO,
            clock_period: DEFAULT_CLOCK_PERIOD,
            snapshot_periods: vec![DEFAULT_CLOCK_PERIOD, 86_400],
        }
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Breakdown(#[from] BreakdownError),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("token {0} is referenced before its metadata was stored")]
    MissingToken(Address),
}

#[derive(Debug, Clone)]
pub struct Engine {
    reader: Arc<dyn ChainReader>,
    registry: Arc<VaultRegistry>,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(
        reader: Arc<dyn ChainReader>,
        registry: Arc<VaultRegistry>,
        settings: EngineSettings,
    ) -> Self {
        Engine {
            reader,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Record every registered reward pool. Idempotent.
    pub async fn bind_reward_pools(&self, uow: &mut UnitOfWork) -> Result<usize, EngineError> {
        let mut created = 0;
        for config in self.registry.vaults_for_network(&self.settings.network) {
            for pool in &config.reward_pool_addresses {
                if uow.load::<RewardPool>(&RewardPool::id_for(*pool)).await?.is_some() {
                    continue;
                }
                uow.save(&RewardPool::new(*pool, config.address))?;
                created += 1;
            }
        }
        if created > 0 {
            info!(network = %self.settings.network, reward_pools = created, "reward pools bound");
        }
        Ok(created)
    }

    /// Apply one event. Events from contracts the registry does not know
    /// are ignored.
    pub async fn handle(
        &self,
        uow: &mut UnitOfWork,
        envelope: &EventEnvelope,
    ) -> Result<(), EngineError> {
        let block = envelope.block();
        match &envelope.event {
            ChainEvent::Transfer { from, to, value } => {
                self.handle_transfer(uow, envelope.address, *from, *to, *value, block)
                    .await
            }
            ChainEvent::VaultInitialized => {
                self.handle_vault_initialized(uow, envelope.address, block)
                    .await
            }
            ChainEvent::StrategyInitialized => {
                self.handle_strategy_initialized(uow, envelope.address, block)
                    .await
            }
            ChainEvent::UpgradeStrat { implementation } => {
                self.handle_upgrade_strat(uow, envelope.address, *implementation, block)
                    .await
            }
            ChainEvent::StratHarvest => {
                self.handle_harvest(uow, envelope.address, block).await
            }
            ChainEvent::ClockTick => self.handle_clock_tick(uow, block).await.map(|_| ()),
        }
    }

    fn vault_config(&self, address: Address) -> Option<&VaultConfig> {
        self.registry.vault(&self.settings.network, address)
    }

    fn is_staking_address(&self, address: Address) -> bool {
        let network = &self.settings.network;
        self.registry.is_boost_address(network, address)
            || self.registry.is_reward_pool_address(network, address)
    }

    /// Stored vault, only if it is RUNNING.
    async fn running_vault(
        &self,
        uow: &UnitOfWork,
        address: Address,
    ) -> Result<Option<Vault>, EngineError> {
        match uow.load::<Vault>(&Vault::id_for(address)).await? {
            Some(vault) if vault.is_running() => Ok(Some(vault)),
            Some(vault) => {
                debug!(vault = %address, lifecycle = ?vault.lifecycle, "vault not running");
                Ok(None)
            }
            None => {
                debug!(vault = %address, "vault not initialized yet");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::chain::abi::{IBeefyStrategy, IBeefyVault, IERC20};
    use crate::chain::MockChainReader;
    use crate::db::{MemoryStore, Repository};
    use crate::domain::{BlockRef, EventEnvelope};
    use crate::registry::{Platform, TrackingFeatureFlags};
    use alloy_primitives::{address, B256, U256};

    pub const NETWORK: &str = "linea";
    pub const VAULT: Address = address!("00000000000000000000000000000000000000a1");
    pub const WANT: Address = address!("00000000000000000000000000000000000000a2");
    pub const STRATEGY: Address = address!("00000000000000000000000000000000000000a3");
    pub const BOOST: Address = address!("00000000000000000000000000000000000000a4");
    pub const ALICE: Address = address!("00000000000000000000000000000000000000b1");
    pub const BOB: Address = address!("00000000000000000000000000000000000000b2");

    pub const E18: u128 = 1_000_000_000_000_000_000;

    pub fn flags_from(block: u64) -> TrackingFeatureFlags {
        TrackingFeatureFlags {
            track_investor_breakdown_from_block: block,
            track_investor_snapshots_from_block: block,
        }
    }

    pub fn passthrough_config() -> VaultConfig {
        VaultConfig::new("mendi-linea-ezeth", Platform::MendiLending, VAULT)
            .with_boosts(vec![BOOST])
            .with_flags(flags_from(1))
    }

    pub fn engine(config: VaultConfig, reader: Arc<MockChainReader>) -> Engine {
        let registry = VaultRegistry::for_network(NETWORK, vec![config]).unwrap();
        let settings = EngineSettings {
            snapshot_periods: vec![3_600],
            ..EngineSettings::new(NETWORK)
        };
        Engine::new(reader, Arc::new(registry), settings)
    }

    pub fn repository() -> Repository {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    pub fn envelope(address: Address, block: BlockRef, event: ChainEvent) -> EventEnvelope {
        EventEnvelope {
            block_number: block.number,
            block_timestamp: block.timestamp,
            tx_hash: B256::ZERO,
            log_index: 0,
            address,
            event,
        }
    }

    /// Chain state of an 18-decimal vault over an 18-decimal want token.
    pub fn vault_reader(ppfs: u128, balance: u128, supply: u128) -> MockChainReader {
        let reader = MockChainReader::new()
            .with_response(VAULT, IBeefyVault::strategyCall {}, STRATEGY)
            .with_response(VAULT, IBeefyVault::wantCall {}, WANT)
            .with_response(STRATEGY, IBeefyStrategy::vaultCall {}, VAULT);
        set_vault_state(&reader, ppfs, balance, supply);
        for (token, symbol) in [(VAULT, "mooMendiEzETH"), (WANT, "ezETH")] {
            reader.set_response(token, IERC20::decimalsCall {}, 18u16);
            reader.set_response(token, IERC20::nameCall {}, symbol.to_string());
            reader.set_response(token, IERC20::symbolCall {}, symbol.to_string());
        }
        reader
    }

    pub fn set_vault_state(reader: &MockChainReader, ppfs: u128, balance: u128, supply: u128) {
        reader.set_response(VAULT, IBeefyVault::getPricePerFullShareCall {}, U256::from(ppfs));
        reader.set_response(VAULT, IBeefyVault::balanceCall {}, U256::from(balance));
        reader.set_response(VAULT, IBeefyVault::totalSupplyCall {}, U256::from(supply));
    }

    pub fn set_share_balance(reader: &MockChainReader, token: Address, account: Address, raw: u128) {
        reader.set_response(token, IERC20::balanceOfCall { account }, U256::from(raw));
    }

    /// Drive the vault to RUNNING through both initialization events.
    pub async fn start_vault(engine: &Engine, repo: &Repository, block: BlockRef) {
        let mut uow = repo.begin();
        engine
            .handle(&mut uow, &envelope(VAULT, block, ChainEvent::VaultInitialized))
            .await
            .unwrap();
        engine
            .handle(&mut uow, &envelope(STRATEGY, block, ChainEvent::StrategyInitialized))
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }
}
