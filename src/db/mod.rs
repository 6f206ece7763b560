//! Persistence: SQLite setup, the entity store and the unit of work.
//!
//! This module provides:
//! - Database initialization and migrations
//! - The `EntityStore` key-value interface with SQLite and in-memory backends
//! - `Repository` and `UnitOfWork` for typed, atomically committed writes

pub mod migrations;
pub mod repo;
pub mod store;

pub use migrations::init_db;
pub use repo::{Repository, UnitOfWork};
pub use store::{EntityStore, MemoryStore, SqliteStore, StoreError, StoredRecord};
