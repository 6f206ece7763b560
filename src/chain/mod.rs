//! Chain data access: batched read-only contract calls at a given block.

use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use std::fmt;
use std::marker::PhantomData;
use thiserror::Error;

pub mod abi;
pub mod mock;
pub mod rpc;

pub use mock::MockChainReader;
pub use rpc::RpcChainReader;

/// A single `eth_call`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Call {
    pub target: Address,
    pub input: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Success(Bytes),
    Reverted,
}

/// Read-only chain access.
///
/// One `multicall` is one round trip; outcomes come back in call order.
#[async_trait]
pub trait ChainReader: Send + Sync + fmt::Debug {
    async fn multicall(&self, block: u64, calls: &[Call]) -> Result<Vec<CallOutcome>, ChainError>;
}

#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("rate limited")]
    RateLimited,
    #[error("expected {expected} call results, got {actual}")]
    ResultCount { expected: usize, actual: usize },
    #[error("{function} on {target} reverted")]
    Reverted {
        target: Address,
        function: &'static str,
    },
    #[error("failed to decode {function} from {target}: {message}")]
    Decode {
        target: Address,
        function: &'static str,
        message: String,
    },
}

/// Typed index into a [`CallBatch`].
pub struct CallHandle<C> {
    index: usize,
    _call: PhantomData<fn() -> C>,
}

impl<C> Clone for CallHandle<C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for CallHandle<C> {}

/// Collects calls so they go out in a single round trip.
#[derive(Debug, Default)]
pub struct CallBatch {
    calls: Vec<Call>,
    signatures: Vec<&'static str>,
}

impl CallBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<C: SolCall>(&mut self, target: Address, call: C) -> CallHandle<C> {
        let index = self.calls.len();
        self.calls.push(Call {
            target,
            input: call.abi_encode().into(),
        });
        self.signatures.push(C::SIGNATURE);
        CallHandle {
            index,
            _call: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub async fn execute(
        self,
        reader: &dyn ChainReader,
        block: u64,
    ) -> Result<CallResults, ChainError> {
        let outcomes = if self.calls.is_empty() {
            Vec::new()
        } else {
            reader.multicall(block, &self.calls).await?
        };
        if outcomes.len() != self.calls.len() {
            return Err(ChainError::ResultCount {
                expected: self.calls.len(),
                actual: outcomes.len(),
            });
        }
        Ok(CallResults {
            calls: self.calls,
            signatures: self.signatures,
            outcomes,
        })
    }
}

#[derive(Debug)]
pub struct CallResults {
    calls: Vec<Call>,
    signatures: Vec<&'static str>,
    outcomes: Vec<CallOutcome>,
}

impl CallResults {
    /// Decoded return value; a revert is an error.
    pub fn get<C: SolCall>(&self, handle: CallHandle<C>) -> Result<C::Return, ChainError> {
        self.try_get(handle)?.ok_or(ChainError::Reverted {
            target: self.calls[handle.index].target,
            function: self.signatures[handle.index],
        })
    }

    /// Decoded return value, or `None` if the call reverted.
    pub fn try_get<C: SolCall>(
        &self,
        handle: CallHandle<C>,
    ) -> Result<Option<C::Return>, ChainError> {
        match &self.outcomes[handle.index] {
            CallOutcome::Reverted => Ok(None),
            CallOutcome::Success(data) => C::abi_decode_returns(data).map(Some).map_err(|e| {
                ChainError::Decode {
                    target: self.calls[handle.index].target,
                    function: self.signatures[handle.index],
                    message: e.to_string(),
                }
            }),
        }
    }
}
