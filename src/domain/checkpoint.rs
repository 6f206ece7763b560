use super::{BlockRef, Entity, EntityId};
use serde::{Deserialize, Serialize};

/// Resume cursor of the indexer, committed in the same batch as the writes
/// of the event it names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexerCheckpoint {
    pub block_number: u64,
    pub block_timestamp: u64,
    pub log_index: u64,
    pub events_processed: u64,
    /// Whether the clock tick for `block_number` has been committed.
    pub ticked: bool,
}

impl IndexerCheckpoint {
    pub fn id_for() -> EntityId {
        EntityId::from_bytes(b"indexer".to_vec())
    }

    pub fn block(&self) -> BlockRef {
        BlockRef::new(self.block_number, self.block_timestamp)
    }

    /// Whether an event at `(block_number, log_index)` is already committed.
    pub fn covers(&self, block_number: u64, log_index: u64) -> bool {
        (block_number, log_index) <= (self.block_number, self.log_index)
    }
}

impl Entity for IndexerCheckpoint {
    const KIND: &'static str = "checkpoint";

    fn id(&self) -> EntityId {
        Self::id_for()
    }
}
