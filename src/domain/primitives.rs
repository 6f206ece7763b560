//! Domain primitives: BlockRef, EntityId.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Block number and timestamp (seconds) of the block being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub number: u64,
    pub timestamp: u64,
}

impl BlockRef {
    pub fn new(number: u64, timestamp: u64) -> Self {
        BlockRef { number, timestamp }
    }
}

/// Composite byte identifier of a stored entity.
///
/// Built by concatenating addresses and big-endian integers so that every
/// leading component is a usable prefix for scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId(Vec<u8>);

impl EntityId {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        EntityId(bytes.into())
    }

    pub fn address(address: Address) -> Self {
        EntityId(address.to_vec())
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.0.extend_from_slice(address.as_slice());
        self
    }

    pub fn with_u64(mut self, value: u64) -> Self {
        self.0.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn starts_with(&self, prefix: &EntityId) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}
