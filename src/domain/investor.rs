use super::{Decimal, Entity, EntityId};
use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Investor {
    pub address: Address,
}

impl Investor {
    pub fn id_for(address: Address) -> EntityId {
        EntityId::address(address)
    }
}

impl Entity for Investor {
    const KIND: &'static str = "investor";

    fn id(&self) -> EntityId {
        Self::id_for(self.address)
    }
}

/// An investor's holdings in one vault.
///
/// The shares balance is the sum of the vault share token and every
/// associated reward pool or boost balance, read from chain state. A zero
/// balance is kept rather than deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestorPosition {
    pub vault: Address,
    pub investor: Address,
    pub raw_shares_balance: U256,
    pub shares_balance: Decimal,
    pub raw_underlying_balance: U256,
    pub underlying_balance: Decimal,
}

impl InvestorPosition {
    pub fn new(vault: Address, investor: Address) -> Self {
        InvestorPosition {
            vault,
            investor,
            raw_shares_balance: U256::ZERO,
            shares_balance: Decimal::zero(),
            raw_underlying_balance: U256::ZERO,
            underlying_balance: Decimal::zero(),
        }
    }

    pub fn id_for(vault: Address, investor: Address) -> EntityId {
        EntityId::address(vault).with_address(investor)
    }

    /// Prefix covering every position held in `vault`.
    pub fn vault_prefix(vault: Address) -> EntityId {
        EntityId::address(vault)
    }
}

impl Entity for InvestorPosition {
    const KIND: &'static str = "investor_position";

    fn id(&self) -> EntityId {
        Self::id_for(self.vault, self.investor)
    }
}
