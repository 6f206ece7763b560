//! JSON-RPC chain reader: each batch of calls is one HTTP request carrying
//! a JSON-RPC batch of `eth_call`s.

use super::{Call, CallOutcome, ChainError, ChainReader};
use alloy_primitives::Bytes;
use async_trait::async_trait;
use backoff::future::retry;
use backoff::ExponentialBackoff;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// JSON-RPC error code nodes use for execution reverts.
const EXECUTION_REVERTED: i64 = 3;

#[derive(Debug, Clone)]
pub struct RpcChainReader {
    client: Client,
    url: String,
    max_batch_size: usize,
    max_elapsed: Duration,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: u64,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

impl RpcChainReader {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
            max_batch_size: 100,
            max_elapsed: Duration::from_secs(30),
        }
    }

    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size.max(1);
        self
    }

    pub fn with_max_elapsed(mut self, max_elapsed: Duration) -> Self {
        self.max_elapsed = max_elapsed;
        self
    }

    async fn post_batch(
        &self,
        payload: &serde_json::Value,
    ) -> Result<Vec<RpcResponse>, ChainError> {
        let backoff = ExponentialBackoff {
            max_elapsed_time: Some(self.max_elapsed),
            ..Default::default()
        };

        retry(backoff, || async {
            let response = self
                .client
                .post(&self.url)
                .json(payload)
                .send()
                .await
                .map_err(|e| backoff::Error::transient(ChainError::Network(e.to_string())))?;

            let status = response.status();
            if status == 429 {
                return Err(backoff::Error::transient(ChainError::RateLimited));
            }
            if status.is_server_error() {
                return Err(backoff::Error::transient(ChainError::Http {
                    status: status.as_u16(),
                    message: "Server error".to_string(),
                }));
            }
            if !status.is_success() {
                return Err(backoff::Error::permanent(ChainError::Http {
                    status: status.as_u16(),
                    message: "Client error".to_string(),
                }));
            }

            response
                .json::<Vec<RpcResponse>>()
                .await
                .map_err(|e| backoff::Error::permanent(ChainError::Parse(e.to_string())))
        })
        .await
    }
}

#[async_trait]
impl ChainReader for RpcChainReader {
    async fn multicall(&self, block: u64, calls: &[Call]) -> Result<Vec<CallOutcome>, ChainError> {
        let mut outcomes = Vec::with_capacity(calls.len());
        for chunk in calls.chunks(self.max_batch_size) {
            debug!(block, calls = chunk.len(), "eth_call batch");
            let payload = build_payload(block, chunk);
            let responses = self.post_batch(&payload).await?;
            outcomes.extend(collect_outcomes(chunk.len(), responses)?);
        }
        Ok(outcomes)
    }
}

fn build_payload(block: u64, calls: &[Call]) -> serde_json::Value {
    let block_tag = format!("0x{:x}", block);
    let requests: Vec<serde_json::Value> = calls
        .iter()
        .enumerate()
        .map(|(id, call)| {
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": "eth_call",
                "params": [
                    {
                        "to": call.target.to_string(),
                        "data": format!("0x{}", hex::encode(&call.input)),
                    },
                    block_tag,
                ],
            })
        })
        .collect();
    serde_json::Value::Array(requests)
}

/// Order responses by id. Reverts, and calls returning no data at all,
/// become [`CallOutcome::Reverted`]; any other node error fails the batch.
fn collect_outcomes(
    expected: usize,
    responses: Vec<RpcResponse>,
) -> Result<Vec<CallOutcome>, ChainError> {
    if responses.len() != expected {
        return Err(ChainError::ResultCount {
            expected,
            actual: responses.len(),
        });
    }

    let mut outcomes: Vec<Option<CallOutcome>> = vec![None; expected];
    for response in responses {
        let slot = outcomes
            .get_mut(response.id as usize)
            .ok_or_else(|| ChainError::Parse(format!("unexpected response id {}", response.id)))?;

        let outcome = match (response.result, response.error) {
            (_, Some(error)) if is_revert(&error) => CallOutcome::Reverted,
            (_, Some(error)) => {
                return Err(ChainError::Rpc {
                    code: error.code,
                    message: error.message,
                })
            }
            (Some(result), None) => {
                let data = hex::decode(result.trim_start_matches("0x"))
                    .map_err(|e| ChainError::Parse(format!("invalid hex result: {}", e)))?;
                if data.is_empty() {
                    CallOutcome::Reverted
                } else {
                    CallOutcome::Success(Bytes::from(data))
                }
            }
            (None, None) => {
                warn!(id = response.id, "eth_call response without result or error");
                CallOutcome::Reverted
            }
        };
        *slot = Some(outcome);
    }

    outcomes
        .into_iter()
        .enumerate()
        .map(|(id, outcome)| {
            outcome.ok_or_else(|| ChainError::Parse(format!("missing response for id {}", id)))
        })
        .collect()
}

fn is_revert(error: &RpcErrorBody) -> bool {
    error.code == EXECUTION_REVERTED || error.message.to_lowercase().contains("revert")
}
