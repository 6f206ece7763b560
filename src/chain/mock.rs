//! In-memory chain reader for tests.

use super::{Call, CallOutcome, ChainError, ChainReader};
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Answers calls from a fixed table; unknown calls revert.
///
/// Responses are independent of the block number and can be changed
/// between events through the `&self` setters.
#[derive(Debug, Default)]
pub struct MockChainReader {
    responses: Mutex<HashMap<Call, Bytes>>,
    round_trips: AtomicUsize,
    calls: AtomicUsize,
}

impl MockChainReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `call` on `target` with `value` ABI-encoded.
    pub fn with_response<C: SolCall, V: SolValue>(self, target: Address, call: C, value: V) -> Self {
        self.set_response(target, call, value);
        self
    }

    /// Answer `call` with already encoded return data.
    pub fn with_raw_response<C: SolCall>(self, target: Address, call: C, data: Vec<u8>) -> Self {
        self.set_raw_response(target, call, data);
        self
    }

    pub fn set_response<C: SolCall, V: SolValue>(&self, target: Address, call: C, value: V) {
        self.set_raw_response(target, call, value.abi_encode());
    }

    pub fn set_raw_response<C: SolCall>(&self, target: Address, call: C, data: Vec<u8>) {
        let key = Call {
            target,
            input: call.abi_encode().into(),
        };
        self.lock().insert(key, data.into());
    }

    /// Make `call` revert from now on.
    pub fn revert<C: SolCall>(&self, target: Address, call: C) {
        let key = Call {
            target,
            input: call.abi_encode().into(),
        };
        self.lock().remove(&key);
    }

    /// Number of `multicall` invocations so far.
    pub fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// Number of individual calls across all round trips.
    pub fn calls_made(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Call, Bytes>> {
        self.responses
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl ChainReader for MockChainReader {
    async fn multicall(&self, _block: u64, calls: &[Call]) -> Result<Vec<CallOutcome>, ChainError> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        self.calls.fetch_add(calls.len(), Ordering::SeqCst);
        let responses = self.lock();
        Ok(calls
            .iter()
            .map(|call| match responses.get(call) {
                Some(data) => CallOutcome::Success(data.clone()),
                None => CallOutcome::Reverted,
            })
            .collect())
    }
}
