//! Static vault registry: which vaults are tracked on each network, the
//! platform each one deposits into, their staking contracts and tracking
//! thresholds. Loaded from a JSON file and validated once at startup.

pub mod check;
pub mod platform;

pub use platform::{Platform, UnknownPlatform};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use thiserror::Error;

/// Per-vault thresholds gating the expensive breakdown work. `0` means never.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingFeatureFlags {
    pub track_investor_breakdown_from_block: u64,
    pub track_investor_snapshots_from_block: u64,
}

impl TrackingFeatureFlags {
    pub fn investor_breakdown_active(&self, block_number: u64) -> bool {
        threshold_reached(self.track_investor_breakdown_from_block, block_number)
    }

    pub fn snapshots_active(&self, block_number: u64) -> bool {
        threshold_reached(self.track_investor_snapshots_from_block, block_number)
    }
}

fn threshold_reached(threshold: u64, block_number: u64) -> bool {
    threshold != 0 && block_number >= threshold
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub vault_key: String,
    pub platform: Platform,
    pub address: Address,
    #[serde(default)]
    pub boost_addresses: Vec<Address>,
    #[serde(default)]
    pub reward_pool_addresses: Vec<Address>,
    #[serde(default = "default_true")]
    pub track_vault_breakdown: bool,
    #[serde(flatten)]
    pub flags: TrackingFeatureFlags,
}

impl VaultConfig {
    pub fn new(vault_key: impl Into<String>, platform: Platform, address: Address) -> Self {
        VaultConfig {
            vault_key: vault_key.into(),
            platform,
            address,
            boost_addresses: Vec::new(),
            reward_pool_addresses: Vec::new(),
            track_vault_breakdown: true,
            flags: TrackingFeatureFlags::default(),
        }
    }

    pub fn with_boosts(mut self, boosts: Vec<Address>) -> Self {
        self.boost_addresses = boosts;
        self
    }

    pub fn with_reward_pools(mut self, reward_pools: Vec<Address>) -> Self {
        self.reward_pool_addresses = reward_pools;
        self
    }

    pub fn with_flags(mut self, flags: TrackingFeatureFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Boosts and reward pools, both of which hold vault shares for investors.
    pub fn staking_addresses(&self) -> impl Iterator<Item = Address> + '_ {
        self.boost_addresses
            .iter()
            .chain(self.reward_pool_addresses.iter())
            .copied()
    }
}

/// On-disk registry layout: vault lists keyed by network name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryFile {
    pub networks: BTreeMap<String, Vec<VaultConfig>>,
}

impl RegistryFile {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(content)?)
    }
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read vault registry {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid vault registry: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate vault address {address} on {network}")]
    DuplicateVault { network: String, address: Address },
    #[error("duplicate boost or reward pool address {address} on {network}")]
    DuplicateStakingAddress { network: String, address: Address },
    #[error("staking address {address} on {network} is also registered as a vault")]
    StakingAddressIsVault { network: String, address: Address },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StakingKind {
    Boost,
    RewardPool,
}

#[derive(Debug, Default)]
struct NetworkVaults {
    vaults: Vec<VaultConfig>,
    by_address: HashMap<Address, usize>,
    staking: HashMap<Address, (StakingKind, usize)>,
}

impl NetworkVaults {
    fn build(network: &str, vaults: Vec<VaultConfig>) -> Result<Self, RegistryError> {
        let mut by_address = HashMap::new();
        for (index, vault) in vaults.iter().enumerate() {
            if by_address.insert(vault.address, index).is_some() {
                return Err(RegistryError::DuplicateVault {
                    network: network.to_string(),
                    address: vault.address,
                });
            }
        }

        let mut staking = HashMap::new();
        for (index, vault) in vaults.iter().enumerate() {
            let entries = vault
                .boost_addresses
                .iter()
                .map(|a| (*a, StakingKind::Boost))
                .chain(
                    vault
                        .reward_pool_addresses
                        .iter()
                        .map(|a| (*a, StakingKind::RewardPool)),
                );
            for (address, kind) in entries {
                if by_address.contains_key(&address) {
                    return Err(RegistryError::StakingAddressIsVault {
                        network: network.to_string(),
                        address,
                    });
                }
                if staking.insert(address, (kind, index)).is_some() {
                    return Err(RegistryError::DuplicateStakingAddress {
                        network: network.to_string(),
                        address,
                    });
                }
            }
        }

        Ok(NetworkVaults {
            vaults,
            by_address,
            staking,
        })
    }
}

/// Validated, read-only registry.
#[derive(Debug, Default)]
pub struct VaultRegistry {
    networks: BTreeMap<String, NetworkVaults>,
}

impl VaultRegistry {
    /// Read and validate a registry file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        Self::from_file(RegistryFile::from_path(path)?)
    }

    pub fn from_file(file: RegistryFile) -> Result<Self, RegistryError> {
        let mut networks = BTreeMap::new();
        for (network, vaults) in file.networks {
            let built = NetworkVaults::build(&network, vaults)?;
            networks.insert(network, built);
        }
        Ok(VaultRegistry { networks })
    }

    /// Single-network registry, mostly for tests.
    pub fn for_network(
        network: impl Into<String>,
        vaults: Vec<VaultConfig>,
    ) -> Result<Self, RegistryError> {
        let mut networks = BTreeMap::new();
        networks.insert(network.into(), vaults);
        Self::from_file(RegistryFile { networks })
    }

    pub fn networks(&self) -> impl Iterator<Item = &str> {
        self.networks.keys().map(String::as_str)
    }

    pub fn vaults_for_network(&self, network: &str) -> &[VaultConfig] {
        self.networks
            .get(network)
            .map(|n| n.vaults.as_slice())
            .unwrap_or(&[])
    }

    pub fn vault(&self, network: &str, address: Address) -> Option<&VaultConfig> {
        let n = self.networks.get(network)?;
        n.by_address.get(&address).map(|i| &n.vaults[*i])
    }

    pub fn is_boost_address(&self, network: &str, address: Address) -> bool {
        self.staking_kind(network, address) == Some(StakingKind::Boost)
    }

    pub fn is_reward_pool_address(&self, network: &str, address: Address) -> bool {
        self.staking_kind(network, address) == Some(StakingKind::RewardPool)
    }

    /// Vault whose shares the boost or reward pool at `address` holds.
    pub fn vault_for_staking_address(&self, network: &str, address: Address) -> Option<&VaultConfig> {
        let n = self.networks.get(network)?;
        n.staking.get(&address).map(|(_, i)| &n.vaults[*i])
    }

    fn staking_kind(&self, network: &str, address: Address) -> Option<StakingKind> {
        self.networks
            .get(network)?
            .staking
            .get(&address)
            .map(|(kind, _)| *kind)
    }
}
