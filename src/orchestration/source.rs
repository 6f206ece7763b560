//! Ordered event delivery.

use crate::domain::EventEnvelope;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read events from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed event on line {line} of {path}: {source}")]
    Parse {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("event ({block_number}, {log_index}) arrived after ({last_block}, {last_log_index})")]
    OutOfOrder {
        block_number: u64,
        log_index: u64,
        last_block: u64,
        last_log_index: u64,
    },
}

/// Yields events in chain order: by block number, then log index.
#[async_trait]
pub trait EventSource: Send + fmt::Debug {
    /// Next event, or `None` once the source is exhausted.
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, SourceError>;
}

/// One JSON [`EventEnvelope`] per line. Blank lines are skipped.
#[derive(Debug)]
pub struct NdjsonEventSource {
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line: usize,
}

impl NdjsonEventSource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await.map_err(|source| SourceError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(NdjsonEventSource {
            path,
            lines: BufReader::new(file).lines(),
            line: 0,
        })
    }
}

#[async_trait]
impl EventSource for NdjsonEventSource {
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, SourceError> {
        loop {
            let next = self
                .lines
                .next_line()
                .await
                .map_err(|source| SourceError::Io {
                    path: self.path.clone(),
                    source,
                })?;
            let Some(text) = next else {
                return Ok(None);
            };
            self.line += 1;
            if text.trim().is_empty() {
                continue;
            }
            let envelope = serde_json::from_str(&text).map_err(|source| SourceError::Parse {
                path: self.path.clone(),
                line: self.line,
                source,
            })?;
            return Ok(Some(envelope));
        }
    }
}

/// Events held in memory.
#[derive(Debug, Default)]
pub struct VecEventSource {
    events: VecDeque<EventEnvelope>,
}

impl VecEventSource {
    pub fn new(events: Vec<EventEnvelope>) -> Self {
        VecEventSource {
            events: events.into(),
        }
    }
}

#[async_trait]
impl EventSource for VecEventSource {
    async fn next_event(&mut self) -> Result<Option<EventEnvelope>, SourceError> {
        Ok(self.events.pop_front())
    }
}
