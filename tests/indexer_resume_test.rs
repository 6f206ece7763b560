use alloy_primitives::{address, Address, B256, U256};
use beefy_balances::chain::abi::{IBeefyStrategy, IBeefyVault, IERC20};
use beefy_balances::chain::MockChainReader;
use beefy_balances::db::{init_db, SqliteStore};
use beefy_balances::domain::{IndexerCheckpoint, Vault};
use beefy_balances::orchestration::NdjsonEventSource;
use beefy_balances::{
    BlockRef, ChainEvent, Engine, EngineSettings, EventEnvelope, Indexer, Platform, Repository,
    VaultConfig, VaultRegistry,
};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

const VAULT: Address = address!("00000000000000000000000000000000000000a1");
const WANT: Address = address!("00000000000000000000000000000000000000a2");
const STRATEGY: Address = address!("00000000000000000000000000000000000000a3");

const E18: u64 = 1_000_000_000_000_000_000;

fn reader() -> Arc<MockChainReader> {
    let reader = MockChainReader::new()
        .with_response(VAULT, IBeefyVault::strategyCall {}, STRATEGY)
        .with_response(VAULT, IBeefyVault::wantCall {}, WANT)
        .with_response(STRATEGY, IBeefyStrategy::vaultCall {}, VAULT)
        .with_response(VAULT, IBeefyVault::getPricePerFullShareCall {}, U256::from(E18))
        .with_response(VAULT, IBeefyVault::balanceCall {}, U256::from(E18))
        .with_response(VAULT, IBeefyVault::totalSupplyCall {}, U256::from(E18));
    for token in [VAULT, WANT] {
        reader.set_response(token, IERC20::decimalsCall {}, 18u16);
    }
    Arc::new(reader)
}

async fn indexer(db_path: &str, reader: Arc<MockChainReader>) -> (Indexer, Repository) {
    let pool = init_db(db_path).await.expect("init_db failed");
    let repo = Repository::new(Arc::new(SqliteStore::new(pool)));
    let config = VaultConfig::new("aerodrome-weth-wrseth", Platform::TrackOnlyShareTokenBalance, VAULT);
    let registry = VaultRegistry::for_network("base", vec![config]).unwrap();
    let engine = Engine::new(reader, Arc::new(registry), EngineSettings::new("base"));
    (Indexer::new(engine, repo.clone()), repo)
}

fn envelope(address: Address, block: BlockRef, log_index: u64, event: ChainEvent) -> EventEnvelope {
    EventEnvelope {
        block_number: block.number,
        block_timestamp: block.timestamp,
        tx_hash: B256::ZERO,
        log_index,
        address,
        event,
    }
}

fn write_events(path: &Path, events: &[EventEnvelope]) {
    let mut file = std::fs::File::create(path).unwrap();
    for event in events {
        writeln!(file, "{}", serde_json::to_string(event).unwrap()).unwrap();
    }
}

#[tokio::test]
async fn test_restart_resumes_after_last_committed_event() {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();
    let events_path = temp_dir.path().join("events.ndjson");

    let start = BlockRef::new(10, 3_600);
    let mut events = vec![
        envelope(VAULT, start, 0, ChainEvent::VaultInitialized),
        envelope(STRATEGY, start, 1, ChainEvent::StrategyInitialized),
    ];
    write_events(&events_path, &events);

    let reader = reader();
    {
        let (indexer, _repo) = indexer(&db_path, reader.clone()).await;
        assert!(indexer.bootstrap().await.unwrap().is_none());
        let mut source = NdjsonEventSource::open(&events_path).await.unwrap();
        let summary = indexer.run(&mut source).await.unwrap();
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.clock_ticks, 1);
    }

    events.push(envelope(
        STRATEGY,
        BlockRef::new(30, 7_300),
        0,
        ChainEvent::StratHarvest,
    ));
    write_events(&events_path, &events);

    let (indexer, repo) = indexer(&db_path, reader).await;
    let checkpoint = indexer.bootstrap().await.unwrap().unwrap();
    assert_eq!((checkpoint.block_number, checkpoint.log_index), (10, 1));
    assert_eq!(indexer.status().snapshot().last_block, 10);

    let mut source = NdjsonEventSource::open(&events_path).await.unwrap();
    let summary = indexer.run(&mut source).await.unwrap();
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.clock_ticks, 1);

    let checkpoint = repo
        .load::<IndexerCheckpoint>(&IndexerCheckpoint::id_for())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(checkpoint.events_processed, 3);
    assert_eq!(checkpoint.block_number, 30);
    assert!(checkpoint.ticked);

    let vault = repo.load::<Vault>(&Vault::id_for(VAULT)).await.unwrap().unwrap();
    assert!(vault.is_running());
    assert_eq!(vault.initialized_at_block, 10);
    assert_eq!(vault.underlying_balance.to_canonical_string(), "1");
}
