//! Domain types for the vault balance indexer.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper and ppfs conversions
//! - Domain primitives: BlockRef, EntityId
//! - Stored entities (tokens, vaults, positions, breakdowns, snapshots, ticks)
//! - Chain events consumed by the engine

pub mod breakdown;
pub mod checkpoint;
pub mod clock;
pub mod decimal;
pub mod event;
pub mod investor;
pub mod ppfs;
pub mod primitives;
pub mod token;
pub mod vault;

pub use breakdown::{
    InvestorPositionBalanceBreakdown, InvestorTokenBalanceSnapshot, SnapshotContribution,
    SnapshotCursor, VaultBalanceBreakdownItem,
};
pub use checkpoint::IndexerCheckpoint;
pub use clock::ClockTick;
pub use decimal::{Decimal, MathError};
pub use event::{ChainEvent, EventEnvelope, HEARTBEAT_LOG_INDEX};
pub use investor::{Investor, InvestorPosition};
pub use ppfs::{ppfs_to_rate, raw_shares_to_raw_underlying, PPFS_DECIMALS};
pub use primitives::{BlockRef, EntityId};
pub use token::Token;
pub use vault::{RewardPool, Strategy, Vault, VaultLifecycle};

use serde::de::DeserializeOwned;
use serde::Serialize;

/// A record persisted in the entity store under `(KIND, id)`.
pub trait Entity: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: &'static str;

    fn id(&self) -> EntityId;
}
