use super::{Entity, EntityId};
use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// ERC-20 metadata, fetched once and never refreshed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,
}

impl Token {
    pub fn id_for(address: Address) -> EntityId {
        EntityId::address(address)
    }
}

impl Entity for Token {
    const KIND: &'static str = "token";

    fn id(&self) -> EntityId {
        Self::id_for(self.address)
    }
}
