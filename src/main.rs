use beefy_balances::chain::{ChainReader, RpcChainReader};
use beefy_balances::db::SqliteStore;
use beefy_balances::engine::{Engine, EngineSettings};
use beefy_balances::orchestration::{Indexer, NdjsonEventSource};
use beefy_balances::registry::VaultRegistry;
use beefy_balances::{api, config::Config, db::init_db, Repository};
use std::net::SocketAddr;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let registry = match VaultRegistry::load(&config.vault_registry_path) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Failed to load vault registry: {}", e);
            std::process::exit(1);
        }
    };
    if registry.vaults_for_network(&config.network).is_empty() {
        tracing::warn!(network = %config.network, "no vaults registered for network");
    }

    let pool = match init_db(&config.database_path).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Failed to initialize database: {}", e);
            std::process::exit(1);
        }
    };
    let repo = Repository::new(Arc::new(SqliteStore::new(pool)));

    let reader: Arc<dyn ChainReader> = Arc::new(
        RpcChainReader::new(config.rpc_url.clone()).with_max_elapsed(config.rpc_max_elapsed),
    );
    let settings = EngineSettings {
        mint_address: config.share_token_mint_address,
        clock_period: config.clock_tick_period_secs,
        snapshot_periods: config.snapshot_periods.clone(),
        ..EngineSettings::new(config.network.clone())
    };
    let engine = Engine::new(reader, Arc::new(registry), settings);
    let indexer = Indexer::new(engine, repo);

    let app = api::create_router(api::AppState::new(config.network.clone(), indexer.status()));
    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };
    tracing::info!("Server listening on {}", addr);
    let server = tokio::spawn(async move { axum::serve(listener, app).await });

    if let Err(e) = indexer.bootstrap().await {
        eprintln!("Failed to start indexer: {}", e);
        std::process::exit(1);
    }
    let mut source = match NdjsonEventSource::open(&config.events_path).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open events: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = indexer.run(&mut source).await {
        eprintln!("Indexer error: {}", e);
        std::process::exit(1);
    }

    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Server task failed: {}", e);
            std::process::exit(1);
        }
    }
}
