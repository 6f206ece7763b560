use super::breakdown::round_to_period;
use super::{BlockRef, Entity, EntityId};
use serde::{Deserialize, Serialize};

/// Deduplicating gate for periodic refreshes: one record per period bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClockTick {
    pub period: u64,
    pub rounded_timestamp: u64,
    pub timestamp: u64,
    pub block_number: u64,
}

impl ClockTick {
    pub fn new(block: BlockRef, period: u64) -> Self {
        ClockTick {
            period,
            rounded_timestamp: round_to_period(block.timestamp, period),
            timestamp: block.timestamp,
            block_number: block.number,
        }
    }

    pub fn id_for(period: u64, rounded_timestamp: u64) -> EntityId {
        EntityId::default().with_u64(period).with_u64(rounded_timestamp)
    }
}

impl Entity for ClockTick {
    const KIND: &'static str = "clock_tick";

    fn id(&self) -> EntityId {
        Self::id_for(self.period, self.rounded_timestamp)
    }
}
