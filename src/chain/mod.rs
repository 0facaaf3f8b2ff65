//! Chain access layer.
//!
//! Provides the typed ABI bindings, the per-cycle connection context, the
//! failure-tolerant aggregation boundary, and an in-memory chain double for
//! tests and paper mode. Every remote read in the crate goes through the
//! [`CallExecutor`] trait so the pipeline never depends on a live endpoint.

pub mod bindings;
mod context;
pub mod mock;
mod multicall;

pub use context::{ChainAddresses, ChainContext, ChainContextProvider};
pub use multicall::{try_aggregate, SubcallResult};

use alloy::primitives::{Address, Bytes};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by the chain access layer.
///
/// Only the transport/call variants ever abort a cycle (and then only from
/// the scan step); decode failures on batched sub-calls are folded into
/// per-key result variants by the callers.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The RPC transport itself failed (connection refused, timeout, ...).
    #[error("rpc transport error: {0}")]
    Transport(String),

    /// The node executed the call but it reverted or returned no data.
    #[error("call to {target} failed: {reason}")]
    CallFailed { target: Address, reason: String },

    /// The call succeeded but the payload did not match the expected shape.
    #[error("failed to decode {method} return data: {reason}")]
    Decode {
        method: &'static str,
        reason: String,
    },
}

impl ChainError {
    pub(crate) fn decode(method: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            method,
            reason: err.to_string(),
        }
    }
}

/// A single read-only `eth_call` against one contract.
///
/// The keeper pipeline is generic over this trait; the live implementation
/// is [`ChainContext`], tests and paper mode use [`mock::MockChain`].
#[async_trait]
pub trait CallExecutor: Send + Sync {
    async fn call(&self, target: Address, data: Bytes) -> Result<Bytes, ChainError>;
}
