pub mod api;
pub mod chain;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod platform;
pub mod registry;

pub use config::Config;
pub use db::{init_db, Repository, UnitOfWork};
pub use domain::{BlockRef, ChainEvent, Decimal, EventEnvelope};
pub use engine::{Engine, EngineError, EngineSettings};
pub use error::AppError;
pub use orchestration::{Indexer, IndexerStatus};
pub use registry::{Platform, VaultConfig, VaultRegistry};
