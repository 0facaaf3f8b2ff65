//! Failure-tolerant batched-call boundary.
//!
//! Wraps Multicall3 `tryAggregate` with `requireSuccess = false`: one failing
//! sub-call never invalidates the batch. Callers build an ordered calldata
//! list, keep a side list of keys in the same order, and zip the returned
//! (success, bytes) pairs back by position.

use super::bindings::IMulticall3;
use super::{CallExecutor, ChainError};
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use tracing::debug;

/// Outcome of one sub-call inside an aggregate batch.
#[derive(Debug, Clone)]
pub struct SubcallResult {
    pub success: bool,
    pub return_data: Bytes,
}

/// Execute an ordered list of sub-calls through the aggregation contract.
///
/// The batch is split into chunks of at most `chunk_size` sub-calls so a
/// large key set never exceeds the endpoint's call-size limit; the limit is
/// chain-specific and therefore comes from configuration. The returned list
/// is parallel to `calls`: index `i` always describes sub-call `i`,
/// regardless of chunk boundaries.
pub async fn try_aggregate<C: CallExecutor + ?Sized>(
    chain: &C,
    multicall: Address,
    calls: Vec<IMulticall3::Call>,
    chunk_size: usize,
) -> Result<Vec<SubcallResult>, ChainError> {
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let total = calls.len();
    let mut results = Vec::with_capacity(total);

    for chunk in calls.chunks(chunk_size.max(1)) {
        let request = IMulticall3::tryAggregateCall {
            requireSuccess: false,
            calls: chunk.to_vec(),
        };

        let raw = chain.call(multicall, request.abi_encode().into()).await?;

        let decoded = IMulticall3::tryAggregateCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("tryAggregate", e))?;

        if decoded.len() != chunk.len() {
            return Err(ChainError::Decode {
                method: "tryAggregate",
                reason: format!(
                    "expected {} sub-call results, got {}",
                    chunk.len(),
                    decoded.len()
                ),
            });
        }

        results.extend(decoded.into_iter().map(|r| SubcallResult {
            success: r.success,
            return_data: r.returnData,
        }));
    }

    debug!(
        sub_calls = total,
        chunks = total.div_ceil(chunk_size.max(1)),
        "aggregate batch complete"
    );

    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use alloy::primitives::{address, U256};
    use alloy::sol_types::SolValue;

    fn counting_call(target: Address, word: u64) -> IMulticall3::Call {
        IMulticall3::Call {
            target,
            callData: U256::from(word).abi_encode().into(),
        }
    }

    #[tokio::test]
    async fn empty_batch_issues_no_calls() {
        let chain = MockChain::new();
        let results = try_aggregate(&chain, chain.multicall_address(), Vec::new(), 10)
            .await
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(chain.call_count(), 0);
    }

    #[tokio::test]
    async fn preserves_order_and_length_across_chunks() {
        let chain = MockChain::new();
        // Unknown selectors fail inside the aggregate, which is exactly what
        // we want here: each result still comes back in slot order.
        let target = address!("00000000000000000000000000000000000000aa");
        let calls: Vec<_> = (0..5).map(|i| counting_call(target, i)).collect();

        let results = try_aggregate(&chain, chain.multicall_address(), calls, 2)
            .await
            .unwrap();

        assert_eq!(results.len(), 5);
        // 5 sub-calls at chunk size 2 -> 3 aggregate round trips.
        assert_eq!(chain.call_count(), 3);
        assert!(results.iter().all(|r| !r.success));
    }

    #[tokio::test]
    async fn chunk_size_zero_is_treated_as_one() {
        let chain = MockChain::new();
        let target = address!("00000000000000000000000000000000000000aa");
        let calls: Vec<_> = (0..3).map(|i| counting_call(target, i)).collect();

        let results = try_aggregate(&chain, chain.multicall_address(), calls, 0)
            .await
            .unwrap();

        assert_eq!(results.len(), 3);
        assert_eq!(chain.call_count(), 3);
    }
}
