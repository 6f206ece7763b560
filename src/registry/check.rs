//! Offline consistency check of the registry file against the vault
//! metadata API.
//!
//! Works on the raw [`RegistryFile`] so duplicates that would stop
//! [`super::VaultRegistry::from_file`] are reported instead.

use super::RegistryFile;
use alloy_primitives::Address;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Vault entry of the metadata API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiVault {
    pub id: String,
    #[serde(rename = "earnContractAddress")]
    pub earn_contract_address: String,
    #[serde(rename = "earningPoints", default)]
    pub earning_points: Option<bool>,
    #[serde(default)]
    pub chain: Option<String>,
}

/// Boost entry of the metadata API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiBoost {
    pub id: String,
    #[serde(rename = "poolId")]
    pub pool_id: String,
    #[serde(rename = "earnContractAddress")]
    pub earn_contract_address: String,
    #[serde(default)]
    pub chain: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    MissingFromRegistry,
    NotFlaggedByApi,
    AddressKeyMismatch,
    Duplicate,
    MissingStakingAddress,
    UnknownStakingAddress,
    InvalidApiAddress,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub severity: Severity,
    pub kind: FindingKind,
    pub message: String,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "[{}] {}", level, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CheckReport {
    pub findings: Vec<Finding>,
}

impl CheckReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(|f| f.severity == Severity::Error)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    fn push(&mut self, severity: Severity, kind: FindingKind, message: String) {
        self.findings.push(Finding {
            severity,
            kind,
            message,
        });
    }
}

struct RegisteredVault<'a> {
    network: &'a str,
    key: &'a str,
    address: Address,
    staking: Vec<Address>,
}

pub fn check_registry(
    file: &RegistryFile,
    api_vaults: &[ApiVault],
    api_boosts: &[ApiBoost],
) -> CheckReport {
    let mut report = CheckReport::default();

    let registered: Vec<RegisteredVault<'_>> = file
        .networks
        .iter()
        .flat_map(|(network, vaults)| {
            vaults.iter().map(move |v| RegisteredVault {
                network: network.as_str(),
                key: v.vault_key.as_str(),
                address: v.address,
                staking: v.staking_addresses().collect(),
            })
        })
        .collect();

    check_duplicates(&registered, &mut report);

    let mut by_address: HashMap<Address, Vec<&RegisteredVault<'_>>> = HashMap::new();
    for vault in &registered {
        by_address.entry(vault.address).or_default().push(vault);
    }
    let by_key: HashMap<&str, &RegisteredVault<'_>> =
        registered.iter().map(|v| (v.key, v)).collect();

    let mut api_by_address: HashMap<Address, Vec<&ApiVault>> = HashMap::new();
    for api_vault in api_vaults {
        match api_vault.earn_contract_address.parse::<Address>() {
            Ok(address) => api_by_address.entry(address).or_default().push(api_vault),
            Err(_) if api_vault.earning_points == Some(true) => report.push(
                Severity::Warning,
                FindingKind::InvalidApiAddress,
                format!(
                    "API vault {} has an unparsable address {:?}",
                    api_vault.id, api_vault.earn_contract_address
                ),
            ),
            Err(_) => {}
        }
    }

    for (address, api_entries) in &api_by_address {
        for api_vault in api_entries {
            if api_vault.earning_points != Some(true) {
                continue;
            }
            let network = registry_network(api_vault.chain.as_deref());
            let found = by_address
                .get(address)
                .and_then(|vaults| vaults.iter().find(|v| on_network(network, v.network)));
            match found {
                None => {
                    report.push(
                        Severity::Error,
                        FindingKind::MissingFromRegistry,
                        format!(
                            "vault {} ({}) earns points but is not in the registry",
                            api_vault.id, address
                        ),
                    );
                    if let Some(same_key) = by_key.get(api_vault.id.as_str()) {
                        report.push(
                            Severity::Warning,
                            FindingKind::AddressKeyMismatch,
                            format!(
                                "vault {} is registered with address {} but the API reports {}",
                                api_vault.id, same_key.address, address
                            ),
                        );
                    }
                }
                Some(found) if found.key != api_vault.id => report.push(
                    Severity::Warning,
                    FindingKind::AddressKeyMismatch,
                    format!(
                        "vault at {} on {} is registered as {} but the API id is {}",
                        address, found.network, found.key, api_vault.id
                    ),
                ),
                Some(_) => {}
            }
        }
    }

    for vault in &registered {
        let api_vault = api_by_address.get(&vault.address).and_then(|entries| {
            entries
                .iter()
                .find(|a| on_network(registry_network(a.chain.as_deref()), vault.network))
        });
        match api_vault {
            None => report.push(
                Severity::Warning,
                FindingKind::NotFlaggedByApi,
                format!(
                    "registry vault {} ({}) on {} is absent from the API",
                    vault.key, vault.address, vault.network
                ),
            ),
            Some(api_vault) if api_vault.earning_points != Some(true) => report.push(
                Severity::Warning,
                FindingKind::NotFlaggedByApi,
                format!(
                    "registry vault {} on {} is not flagged as earning points yet",
                    vault.key, vault.network
                ),
            ),
            Some(_) => {}
        }
    }

    check_staking(&registered, &by_key, api_boosts, &mut report);

    report
}

/// Registry network of an API chain id. `None` matches every network.
fn registry_network(chain: Option<&str>) -> Option<&str> {
    chain.map(|chain| match chain {
        "arbitrum" => "arbitrum-one",
        "ethereum" => "mainnet",
        other => other,
    })
}

fn on_network(api_network: Option<&str>, network: &str) -> bool {
    api_network.map_or(true, |n| n == network)
}

fn check_duplicates(registered: &[RegisteredVault<'_>], report: &mut CheckReport) {
    let mut seen_addresses = HashSet::new();
    let mut seen_keys = HashSet::new();
    let mut seen_staking = HashSet::new();
    for vault in registered {
        if !seen_addresses.insert((vault.network, vault.address)) {
            report.push(
                Severity::Error,
                FindingKind::Duplicate,
                format!("duplicate vault address {} on {}", vault.address, vault.network),
            );
        }
        if !seen_keys.insert(vault.key) {
            report.push(
                Severity::Error,
                FindingKind::Duplicate,
                format!("duplicate vault key {}", vault.key),
            );
        }
        for staking in &vault.staking {
            if !seen_staking.insert((vault.network, *staking)) {
                report.push(
                    Severity::Error,
                    FindingKind::Duplicate,
                    format!(
                        "duplicate boost or reward pool address {} on {}",
                        staking, vault.network
                    ),
                );
            }
        }
    }
}

fn check_staking(
    registered: &[RegisteredVault<'_>],
    by_key: &HashMap<&str, &RegisteredVault<'_>>,
    api_boosts: &[ApiBoost],
    report: &mut CheckReport,
) {
    let mut api_staking: HashMap<Address, Vec<Option<&str>>> = HashMap::new();
    for boost in api_boosts {
        let Ok(address) = boost.earn_contract_address.parse::<Address>() else {
            continue;
        };
        api_staking
            .entry(address)
            .or_default()
            .push(registry_network(boost.chain.as_deref()));

        let Some(vault) = by_key.get(boost.pool_id.as_str()) else {
            continue;
        };
        if !vault.staking.contains(&address) {
            report.push(
                Severity::Error,
                FindingKind::MissingStakingAddress,
                format!(
                    "boost {} ({}) of vault {} is missing from the registry",
                    boost.id, address, vault.key
                ),
            );
        }
    }

    for vault in registered {
        for staking in &vault.staking {
            let known = api_staking
                .get(staking)
                .is_some_and(|networks| networks.iter().any(|n| on_network(*n, vault.network)));
            if !known {
                report.push(
                    Severity::Warning,
                    FindingKind::UnknownStakingAddress,
                    format!(
                        "registry lists {} for vault {} but the API does not know it",
                        staking, vault.key
                    ),
                );
            }
        }
    }
}
