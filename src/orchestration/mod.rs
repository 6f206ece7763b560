//! Event delivery and the indexer run loop.

pub mod indexer;
pub mod source;

pub use indexer::{Indexer, IndexerStatus, RunSummary, RunnerError, StatusSnapshot};
pub use source::{EventSource, NdjsonEventSource, SourceError, VecEventSource};
