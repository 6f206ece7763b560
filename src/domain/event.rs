//! Chain events consumed by the engine.

use super::BlockRef;
use alloy_primitives::{Address, B256, U256};
use serde::{Deserialize, Serialize};

/// Decoded log payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ChainEvent {
    /// ERC-20 transfer of vault shares or of reward pool / boost receipts.
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    /// `Initialized` emitted by a vault.
    VaultInitialized,
    /// `Initialized` emitted by a strategy.
    StrategyInitialized,
    /// Vault switched to a new strategy.
    UpgradeStrat { implementation: Address },
    /// Strategy compounded rewards.
    StratHarvest,
    /// Block heartbeat that drives the periodic refresh. Not a log: its
    /// envelope carries [`HEARTBEAT_LOG_INDEX`] and no emitting address.
    ClockTick,
}

/// Log index of a heartbeat, after every real log of its block.
pub const HEARTBEAT_LOG_INDEX: u64 = u64::MAX;

/// A log with its position in the chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub block_number: u64,
    pub block_timestamp: u64,
    #[serde(default)]
    pub tx_hash: B256,
    pub log_index: u64,
    /// Contract that emitted the log.
    #[serde(default)]
    pub address: Address,
    pub event: ChainEvent,
}

impl EventEnvelope {
    pub fn clock_tick(block: BlockRef) -> Self {
        EventEnvelope {
            block_number: block.number,
            block_timestamp: block.timestamp,
            tx_hash: B256::ZERO,
            log_index: HEARTBEAT_LOG_INDEX,
            address: Address::ZERO,
            event: ChainEvent::ClockTick,
        }
    }

    pub fn block(&self) -> BlockRef {
        BlockRef::new(self.block_number, self.block_timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_envelope_json_shape() {
        let json = r#"{
            "block_number": 12,
            "block_timestamp": 1700000000,
            "log_index": 3,
            "address": "0x00000000000000000000000000000000000000aa",
            "event": {
                "type": "Transfer",
                "from": "0x0000000000000000000000000000000000000000",
                "to": "0x00000000000000000000000000000000000000bb",
                "value": "0x64"
            }
        }"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.block(), BlockRef::new(12, 1_700_000_000));
        assert_eq!(envelope.tx_hash, B256::ZERO);
        assert_eq!(
            envelope.event,
            ChainEvent::Transfer {
                from: Address::ZERO,
                to: address!("00000000000000000000000000000000000000bb"),
                value: U256::from(100u64),
            }
        );
    }

    #[test]
    fn test_unit_events_parse() {
        let event: ChainEvent = serde_json::from_str(r#"{"type":"StratHarvest"}"#).unwrap();
        assert_eq!(event, ChainEvent::StratHarvest);
    }

    #[test]
    fn test_heartbeat_line_parses() {
        let json = r#"{"block_number":50,"block_timestamp":7300,"log_index":18446744073709551615,"event":{"type":"ClockTick"}}"#;
        let envelope: EventEnvelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope, EventEnvelope::clock_tick(BlockRef::new(50, 7_300)));
    }
}
