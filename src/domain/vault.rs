//! Vault, strategy and reward pool entities.

use super::{Decimal, Entity, EntityId};
use crate::registry::{Platform, TrackingFeatureFlags, VaultConfig};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

/// Vault lifecycle. Transitions only move forward: a vault becomes RUNNING
/// once both it and its strategy have reported initialization. PAUSED is set
/// outside the event handlers and is never undone here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VaultLifecycle {
    Initializing,
    Running,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vault {
    pub address: Address,
    pub vault_key: String,
    pub lifecycle: VaultLifecycle,
    pub is_initialized: bool,
    pub shares_token: Address,
    pub underlying_token: Address,
    pub strategy: Address,
    pub underlying_platform: Platform,
    pub raw_shares_total_supply: U256,
    pub shares_total_supply: Decimal,
    pub raw_underlying_balance: U256,
    pub underlying_balance: Decimal,
    pub price_per_full_share: U256,
    pub share_to_underlying_rate: Decimal,
    pub initialized_at_block: u64,
    pub initialized_at_timestamp: u64,
    pub flags: TrackingFeatureFlags,
}

impl Vault {
    /// Defaults for a vault seen for the first time.
    pub fn new(config: &VaultConfig) -> Self {
        Vault {
            address: config.address,
            vault_key: config.vault_key.clone(),
            lifecycle: VaultLifecycle::Initializing,
            is_initialized: false,
            shares_token: Address::ZERO,
            underlying_token: Address::ZERO,
            strategy: Address::ZERO,
            underlying_platform: config.platform,
            raw_shares_total_supply: U256::ZERO,
            shares_total_supply: Decimal::zero(),
            raw_underlying_balance: U256::ZERO,
            underlying_balance: Decimal::zero(),
            price_per_full_share: U256::ZERO,
            share_to_underlying_rate: Decimal::zero(),
            initialized_at_block: 0,
            initialized_at_timestamp: 0,
            flags: config.flags,
        }
    }

    pub fn id_for(address: Address) -> EntityId {
        EntityId::address(address)
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle == VaultLifecycle::Running
    }
}

impl Entity for Vault {
    const KIND: &'static str = "vault";

    fn id(&self) -> EntityId {
        Self::id_for(self.address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    pub address: Address,
    pub vault: Address,
    pub is_initialized: bool,
}

impl Strategy {
    pub fn new(address: Address) -> Self {
        Strategy {
            address,
            vault: Address::ZERO,
            is_initialized: false,
        }
    }

    pub fn id_for(address: Address) -> EntityId {
        EntityId::address(address)
    }

    /// Detach from its vault so late events from this strategy are ignored.
    pub fn invalidate(&mut self) {
        self.vault = Address::ZERO;
        self.is_initialized = false;
    }
}

impl Entity for Strategy {
    const KIND: &'static str = "strategy";

    fn id(&self) -> EntityId {
        Self::id_for(self.address)
    }
}

/// Staking contract holding vault shares for investors. Its own ERC-20
/// receipt token is the pool address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPool {
    pub address: Address,
    pub vault: Address,
    pub reward_share_token: Address,
}

impl RewardPool {
    pub fn new(address: Address, vault: Address) -> Self {
        RewardPool {
            address,
            vault,
            reward_share_token: address,
        }
    }

    pub fn id_for(address: Address) -> EntityId {
        EntityId::address(address)
    }
}

impl Entity for RewardPool {
    const KIND: &'static str = "reward_pool";

    fn id(&self) -> EntityId {
        Self::id_for(self.address)
    }
}
