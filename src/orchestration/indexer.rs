//! Strictly ordered event processing with a resumable checkpoint.

use super::source::{EventSource, SourceError};
use crate::db::{Repository, StoreError, UnitOfWork};
use crate::domain::{ChainEvent, EventEnvelope, IndexerCheckpoint};
use crate::engine::{Engine, EngineError};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("event at block {block_number} log {log_index} failed: {source}")]
    Event {
        block_number: u64,
        log_index: u64,
        #[source]
        source: EngineError,
    },

    #[error("binding reward pools failed: {0}")]
    Bind(#[source] EngineError),

    #[error("clock tick at block {block_number} failed: {source}")]
    Tick {
        block_number: u64,
        #[source]
        source: EngineError,
    },
}

/// Progress counters shared with the operations API.
#[derive(Debug, Default)]
pub struct IndexerStatus {
    ready: AtomicBool,
    finished: AtomicBool,
    failed: AtomicBool,
    last_block: AtomicU64,
    events_processed: AtomicU64,
    events_skipped: AtomicU64,
    clock_ticks: AtomicU64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub ready: bool,
    pub finished: bool,
    pub failed: bool,
    pub last_block: u64,
    pub events_processed: u64,
    pub events_skipped: u64,
    pub clock_ticks: u64,
}

impl IndexerStatus {
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            ready: self.ready.load(Ordering::SeqCst),
            finished: self.finished.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            last_block: self.last_block.load(Ordering::SeqCst),
            events_processed: self.events_processed.load(Ordering::SeqCst),
            events_skipped: self.events_skipped.load(Ordering::SeqCst),
            clock_ticks: self.clock_ticks.load(Ordering::SeqCst),
        }
    }

    fn record_checkpoint(&self, checkpoint: &IndexerCheckpoint) {
        self.last_block
            .store(checkpoint.block_number, Ordering::SeqCst);
        self.events_processed
            .store(checkpoint.events_processed, Ordering::SeqCst);
    }
}

/// Counts for one [`Indexer::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: u64,
    pub skipped: u64,
    pub clock_ticks: u64,
}

struct Applied {
    checkpoint: IndexerCheckpoint,
    /// A heartbeat opened a new clock bucket.
    heartbeat_fresh: bool,
}

/// Feeds events to the [`Engine`] one at a time. Each event commits its
/// writes and the checkpoint together; a failed event commits nothing.
///
/// Heartbeat envelopes ([`ChainEvent::ClockTick`]) tick the clock even when
/// no vault emits anything. Without them, the clock tick of a block runs
/// after the last event of that block, once the source has moved past it or
/// is exhausted.
#[derive(Debug, Clone)]
pub struct Indexer {
    engine: Engine,
    repo: Repository,
    status: Arc<IndexerStatus>,
}

impl Indexer {
    pub fn new(engine: Engine, repo: Repository) -> Self {
        Indexer {
            engine,
            repo,
            status: Arc::new(IndexerStatus::default()),
        }
    }

    pub fn status(&self) -> Arc<IndexerStatus> {
        self.status.clone()
    }

    /// Bind registry reward pools and restore progress from the checkpoint.
    pub async fn bootstrap(&self) -> Result<Option<IndexerCheckpoint>, RunnerError> {
        let mut uow = self.repo.begin();
        self.engine
            .bind_reward_pools(&mut uow)
            .await
            .map_err(RunnerError::Bind)?;
        uow.commit().await?;

        let checkpoint = self.checkpoint().await?;
        match &checkpoint {
            Some(cp) => {
                self.status.record_checkpoint(cp);
                info!(block = cp.block_number, log_index = cp.log_index, events = cp.events_processed, "resuming from checkpoint");
            }
            None => info!("starting from the first event"),
        }
        self.status.ready.store(true, Ordering::SeqCst);
        Ok(checkpoint)
    }

    pub async fn run(&self, source: &mut dyn EventSource) -> Result<RunSummary, RunnerError> {
        let result = self.run_inner(source).await;
        match &result {
            Ok(summary) => {
                self.status.finished.store(true, Ordering::SeqCst);
                info!(processed = summary.processed, skipped = summary.skipped, clock_ticks = summary.clock_ticks, "event source exhausted");
            }
            Err(err) => {
                self.status.failed.store(true, Ordering::SeqCst);
                error!(error = %err, "indexer stopped");
            }
        }
        result
    }

    async fn run_inner(&self, source: &mut dyn EventSource) -> Result<RunSummary, RunnerError> {
        let mut summary = RunSummary::default();
        let mut checkpoint = self.checkpoint().await?;
        let mut last_seen: Option<(u64, u64)> = None;

        while let Some(envelope) = source.next_event().await? {
            let position = (envelope.block_number, envelope.log_index);
            if let Some(last) = last_seen {
                if position < last {
                    return Err(SourceError::OutOfOrder {
                        block_number: position.0,
                        log_index: position.1,
                        last_block: last.0,
                        last_log_index: last.1,
                    }
                    .into());
                }
            }
            last_seen = Some(position);

            if let Some(cp) = &checkpoint {
                if cp.covers(envelope.block_number, envelope.log_index) {
                    debug!(block = envelope.block_number, log_index = envelope.log_index, "event already committed");
                    summary.skipped += 1;
                    self.status.events_skipped.fetch_add(1, Ordering::SeqCst);
                    continue;
                }
            }

            if let Some(cp) = checkpoint.as_mut() {
                if cp.block_number < envelope.block_number
                    && !cp.ticked
                    && self.tick(cp).await?
                {
                    summary.clock_ticks += 1;
                }
            }

            let next = self.apply(&envelope, checkpoint.as_ref()).await?;
            if next.heartbeat_fresh {
                summary.clock_ticks += 1;
            }
            let next = next.checkpoint;
            self.status.record_checkpoint(&next);
            checkpoint = Some(next);
            summary.processed += 1;
        }

        if let Some(cp) = checkpoint.as_mut() {
            if !cp.ticked && self.tick(cp).await? {
                summary.clock_ticks += 1;
            }
        }
        Ok(summary)
    }

    async fn apply(
        &self,
        envelope: &EventEnvelope,
        previous: Option<&IndexerCheckpoint>,
    ) -> Result<Applied, RunnerError> {
        let mut uow = self.repo.begin();
        let failed = |source| RunnerError::Event {
            block_number: envelope.block_number,
            log_index: envelope.log_index,
            source,
        };
        let heartbeat = envelope.event == ChainEvent::ClockTick;
        let heartbeat_fresh = if heartbeat {
            self.engine
                .handle_clock_tick(&mut uow, envelope.block())
                .await
                .map_err(failed)?
        } else {
            self.engine.handle(&mut uow, envelope).await.map_err(failed)?;
            false
        };

        let same_block = previous.filter(|cp| cp.block_number == envelope.block_number);
        let checkpoint = IndexerCheckpoint {
            block_number: envelope.block_number,
            block_timestamp: envelope.block_timestamp,
            log_index: envelope.log_index,
            events_processed: previous.map_or(0, |cp| cp.events_processed) + 1,
            ticked: heartbeat || same_block.is_some_and(|cp| cp.ticked),
        };
        self.commit(uow, &checkpoint).await?;
        if heartbeat_fresh {
            self.status.clock_ticks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(Applied {
            checkpoint,
            heartbeat_fresh,
        })
    }

    /// Tick the checkpoint's block. Returns whether the bucket was new.
    async fn tick(&self, checkpoint: &mut IndexerCheckpoint) -> Result<bool, RunnerError> {
        let block = checkpoint.block();
        let mut uow = self.repo.begin();
        let fresh = self
            .engine
            .handle_clock_tick(&mut uow, block)
            .await
            .map_err(|source| RunnerError::Tick {
                block_number: block.number,
                source,
            })?;
        checkpoint.ticked = true;
        self.commit(uow, checkpoint).await?;
        if fresh {
            self.status.clock_ticks.fetch_add(1, Ordering::SeqCst);
        }
        Ok(fresh)
    }

    async fn commit(
        &self,
        mut uow: UnitOfWork,
        checkpoint: &IndexerCheckpoint,
    ) -> Result<(), RunnerError> {
        uow.save(checkpoint)?;
        uow.commit().await?;
        Ok(())
    }

    async fn checkpoint(&self) -> Result<Option<IndexerCheckpoint>, RunnerError> {
        Ok(self
            .repo
            .load::<IndexerCheckpoint>(&IndexerCheckpoint::id_for())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::IERC20;
    use crate::domain::{
        BlockRef, ClockTick, Entity, InvestorPosition, Vault, VaultBalanceBreakdownItem,
    };
    use crate::engine::test_support::*;
    use crate::orchestration::VecEventSource;
    use alloy_primitives::{Address, U256};
    use std::sync::Arc;

    fn lifecycle_events() -> Vec<EventEnvelope> {
        let mut mint = envelope(
            VAULT,
            BlockRef::new(11, 3_700),
            ChainEvent::Transfer {
                from: Address::ZERO,
                to: ALICE,
                value: U256::from(E18),
            },
        );
        mint.log_index = 0;
        let mut strategy = envelope(STRATEGY, BlockRef::new(10, 3_600), ChainEvent::StrategyInitialized);
        strategy.log_index = 1;
        vec![
            envelope(VAULT, BlockRef::new(10, 3_600), ChainEvent::VaultInitialized),
            strategy,
            mint,
        ]
    }

    fn indexer(reader: Arc<crate::chain::MockChainReader>, repo: &Repository) -> Indexer {
        Indexer::new(engine(passthrough_config(), reader), repo.clone())
    }

    #[tokio::test]
    async fn test_run_commits_events_checkpoint_and_ticks() {
        let reader = Arc::new(vault_reader(E18, E18, E18));
        set_share_balance(&reader, VAULT, ALICE, E18);
        set_share_balance(&reader, BOOST, ALICE, 0);
        let repo = repository();
        let indexer = indexer(reader, &repo);
        indexer.bootstrap().await.unwrap();

        let summary = indexer
            .run(&mut VecEventSource::new(lifecycle_events()))
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped, 0);
        // block 10 and block 11 share the 3600 bucket
        assert_eq!(summary.clock_ticks, 1);

        let checkpoint = repo
            .load::<IndexerCheckpoint>(&IndexerCheckpoint::id_for())
            .await
            .unwrap()
            .unwrap();
        assert_eq!((checkpoint.block_number, checkpoint.log_index), (11, 0));
        assert_eq!(checkpoint.events_processed, 3);
        assert!(checkpoint.ticked);
        assert!(repo
            .load::<ClockTick>(&ClockTick::new(BlockRef::new(10, 3_600), 3_600).id())
            .await
            .unwrap()
            .is_some());

        let position = repo
            .load::<InvestorPosition>(&InvestorPosition::id_for(VAULT, ALICE))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(position.raw_shares_balance, U256::from(E18));

        let status = indexer.status().snapshot();
        assert!(status.ready && status.finished && !status.failed);
        assert_eq!(status.last_block, 11);
        assert_eq!(status.events_processed, 3);
    }

    #[tokio::test]
    async fn test_rerun_skips_committed_events() {
        let reader = Arc::new(vault_reader(E18, E18, E18));
        set_share_balance(&reader, VAULT, ALICE, E18);
        set_share_balance(&reader, BOOST, ALICE, 0);
        let repo = repository();
        let first = indexer(reader.clone(), &repo);
        first.bootstrap().await.unwrap();
        first
            .run(&mut VecEventSource::new(lifecycle_events()))
            .await
            .unwrap();
        let round_trips = reader.round_trips();

        let second = indexer(reader.clone(), &repo);
        let checkpoint = second.bootstrap().await.unwrap().unwrap();
        assert_eq!(checkpoint.events_processed, 3);
        let summary = second
            .run(&mut VecEventSource::new(lifecycle_events()))
            .await
            .unwrap();
        assert_eq!(summary.processed, 0);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.clock_ticks, 0);
        assert_eq!(reader.round_trips(), round_trips);
    }

    #[tokio::test]
    async fn test_failed_event_commits_nothing() {
        let reader = Arc::new(vault_reader(E18, E18, E18));
        set_share_balance(&reader, VAULT, ALICE, E18);
        set_share_balance(&reader, BOOST, ALICE, 0);
        reader.revert(VAULT, IERC20::balanceOfCall { account: ALICE });
        let repo = repository();
        let indexer = indexer(reader, &repo);
        indexer.bootstrap().await.unwrap();

        let err = indexer
            .run(&mut VecEventSource::new(lifecycle_events()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunnerError::Event {
                block_number: 11,
                log_index: 0,
                ..
            }
        ));
        assert!(indexer.status().snapshot().failed);

        // the two lifecycle events and the tick of block 10 are committed
        let checkpoint = repo
            .load::<IndexerCheckpoint>(&IndexerCheckpoint::id_for())
            .await
            .unwrap()
            .unwrap();
        assert_eq!((checkpoint.block_number, checkpoint.log_index), (10, 1));
        assert!(checkpoint.ticked);
        assert!(repo
            .load::<InvestorPosition>(&InvestorPosition::id_for(VAULT, ALICE))
            .await
            .unwrap()
            .is_none());
        let vault = repo.load::<Vault>(&Vault::id_for(VAULT)).await.unwrap().unwrap();
        assert!(vault.is_running());
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_quiet_vault() {
        let reader = Arc::new(vault_reader(E18, E18, E18));
        let repo = repository();
        let indexer = indexer(reader, &repo);
        indexer.bootstrap().await.unwrap();

        let mut strategy = envelope(STRATEGY, BlockRef::new(10, 3_600), ChainEvent::StrategyInitialized);
        strategy.log_index = 1;
        let events = vec![
            envelope(VAULT, BlockRef::new(10, 3_600), ChainEvent::VaultInitialized),
            strategy,
            // an hour later, nothing emitted by any vault
            EventEnvelope::clock_tick(BlockRef::new(50, 7_300)),
        ];
        let summary = indexer
            .run(&mut VecEventSource::new(events))
            .await
            .unwrap();
        assert_eq!(summary.processed, 3);
        // block 10 at the boundary, block 50 from the heartbeat
        assert_eq!(summary.clock_ticks, 2);
        assert_eq!(indexer.status().snapshot().clock_ticks, 2);

        assert!(repo
            .load::<ClockTick>(&ClockTick::new(BlockRef::new(50, 7_300), 3_600).id())
            .await
            .unwrap()
            .is_some());
        let item = repo
            .load::<VaultBalanceBreakdownItem>(&VaultBalanceBreakdownItem::id_for(VAULT, WANT))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(item.last_update_block, 50);

        let checkpoint = repo
            .load::<IndexerCheckpoint>(&IndexerCheckpoint::id_for())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.block_number, 50);
        assert!(checkpoint.ticked);
    }

    #[tokio::test]
    async fn test_out_of_order_source_is_rejected() {
        let reader = Arc::new(vault_reader(E18, E18, E18));
        let repo = repository();
        let indexer = indexer(reader, &repo);
        let mut events = lifecycle_events();
        events.swap(0, 2);
        let err = indexer
            .run(&mut VecEventSource::new(events))
            .await
            .unwrap_err();
        assert!(matches!(err, RunnerError::Source(SourceError::OutOfOrder { .. })));
    }
}
