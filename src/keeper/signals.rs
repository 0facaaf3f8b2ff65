//! Batched hedge-demand signal reads.
//!
//! Same aggregation shape as the position reader, targeting
//! `shouldHedgePosition`. Callers learn about a missing signal through the
//! availability variant only — the reader never raises for a single key.

use crate::chain::bindings::{ILpNftVault, IMulticall3};
use crate::chain::{try_aggregate, CallExecutor};
use crate::keeper::types::{HedgeSignal, PositionKey, SignalDetails};
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use std::collections::BTreeMap;
use tracing::warn;

/// Ratio values above this are not valid signals, they are decode garbage.
const MAX_RATIO_BPS: u32 = 10_000;

pub struct SignalBatchReader {
    vault: Address,
    multicall: Address,
    chunk_size: usize,
}

impl SignalBatchReader {
    pub fn new(vault: Address, multicall: Address, chunk_size: usize) -> Self {
        Self {
            vault,
            multicall,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read the hedge-demand signal for every key. Total over `keys`; every
    /// failure mode (revert, malformed payload, out-of-range ratio, chunk
    /// transport loss) folds into `HedgeSignal::Unavailable`.
    pub async fn read<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        keys: &[PositionKey],
    ) -> BTreeMap<PositionKey, HedgeSignal> {
        let mut results = BTreeMap::new();
        if keys.is_empty() {
            return results;
        }

        for chunk in keys.chunks(self.chunk_size) {
            let calls: Vec<IMulticall3::Call> = chunk
                .iter()
                .map(|key| IMulticall3::Call {
                    target: self.vault,
                    callData: ILpNftVault::shouldHedgePositionCall {
                        nft: key.collection,
                        tokenId: key.token_id,
                    }
                    .abi_encode()
                    .into(),
                })
                .collect();

            match try_aggregate(chain, self.multicall, calls, self.chunk_size).await {
                Ok(sub_results) => {
                    for (key, sub) in chunk.iter().zip(sub_results) {
                        let signal = if !sub.success || sub.return_data.is_empty() {
                            HedgeSignal::Unavailable {
                                reason: "call failed".to_string(),
                            }
                        } else {
                            match decode_signal(&sub.return_data) {
                                Ok(details) => HedgeSignal::Available(details),
                                Err(reason) => HedgeSignal::Unavailable {
                                    reason: format!("decode failed: {reason}"),
                                },
                            }
                        };
                        results.insert(*key, signal);
                    }
                }
                Err(e) => {
                    warn!(keys = chunk.len(), error = %e, "signal batch chunk failed");
                    for key in chunk {
                        results.insert(
                            *key,
                            HedgeSignal::Unavailable {
                                reason: format!("batch call failed: {e}"),
                            },
                        );
                    }
                }
            }
        }

        results
    }
}

/// Fixed decoder for `shouldHedgePosition` returns.
fn decode_signal(raw: &[u8]) -> Result<SignalDetails, String> {
    let ret =
        ILpNftVault::shouldHedgePositionCall::abi_decode_returns(raw).map_err(|e| e.to_string())?;

    let ratio = u32::try_from(ret.targetTokenRatio)
        .map_err(|_| format!("target token ratio {} exceeds u32", ret.targetTokenRatio))?;
    if ratio > MAX_RATIO_BPS {
        return Err(format!("target token ratio {ratio} bps out of range"));
    }

    Ok(SignalDetails {
        should_hedge: ret.shouldHedge,
        target_token_balance: ret.targetTokenBalance,
        other_token_balance: ret.otherTokenBalance,
        target_token_ratio_bps: ratio,
        reason: ret.reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{MockChain, SignalSeed};
    use alloy::primitives::{address, U256};

    const COLLECTION: Address = address!("00000000000000000000000000000000000000c1");

    fn key(token_id: u64) -> PositionKey {
        PositionKey::new(COLLECTION, U256::from(token_id))
    }

    fn reader(chain: &MockChain) -> SignalBatchReader {
        SignalBatchReader::new(chain.vault_address(), chain.multicall_address(), 100)
    }

    #[tokio::test]
    async fn result_set_is_total_over_requested_keys() {
        let mut chain = MockChain::new();
        chain.seed_signal(COLLECTION, 1, SignalSeed::demand(9_000));
        chain.fail_signal_call(COLLECTION, 2);

        let results = reader(&chain).read(&chain, &[key(1), key(2)]).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[&key(1)].should_hedge(), Some(true));
        assert_eq!(results[&key(2)].should_hedge(), None);
    }

    #[tokio::test]
    async fn decodes_ratio_and_reason() {
        let mut chain = MockChain::new();
        chain.seed_signal(COLLECTION, 1, SignalSeed::no_demand(4_800));

        let results = reader(&chain).read(&chain, &[key(1)]).await;
        match &results[&key(1)] {
            HedgeSignal::Available(details) => {
                assert!(!details.should_hedge);
                assert_eq!(details.target_token_ratio_bps, 4_800);
                assert!(!details.reason.is_empty());
            }
            HedgeSignal::Unavailable { reason } => panic!("expected signal, got {reason}"),
        }
    }

    #[tokio::test]
    async fn ratio_above_ten_thousand_bps_is_a_decode_failure() {
        let mut chain = MockChain::new();
        chain.seed_signal(COLLECTION, 1, SignalSeed::demand(10_001));

        let results = reader(&chain).read(&chain, &[key(1)]).await;
        match &results[&key(1)] {
            HedgeSignal::Unavailable { reason } => assert!(reason.contains("out of range")),
            HedgeSignal::Available(_) => panic!("out-of-range ratio must not decode"),
        }
    }

    #[tokio::test]
    async fn ratio_of_exactly_ten_thousand_bps_is_valid() {
        let mut chain = MockChain::new();
        chain.seed_signal(COLLECTION, 1, SignalSeed::demand(10_000));

        let results = reader(&chain).read(&chain, &[key(1)]).await;
        assert!(results[&key(1)].is_available());
    }

    #[tokio::test]
    async fn malformed_payload_becomes_unavailable() {
        let mut chain = MockChain::new();
        chain.corrupt_signal_call(COLLECTION, 6);

        let results = reader(&chain).read(&chain, &[key(6)]).await;
        match &results[&key(6)] {
            HedgeSignal::Unavailable { reason } => assert!(reason.contains("decode failed")),
            HedgeSignal::Available(_) => panic!("garbage payload must not decode"),
        }
    }

    #[tokio::test]
    async fn transport_failure_marks_every_key_unavailable() {
        let mut chain = MockChain::new();
        chain.seed_signal(COLLECTION, 1, SignalSeed::demand(9_000));
        chain.fail_aggregate_calls();

        let results = reader(&chain).read(&chain, &[key(1), key(2)]).await;

        assert_eq!(results.len(), 2);
        assert!(results.values().all(|s| !s.is_available()));
    }

    #[tokio::test]
    async fn empty_key_set_issues_no_calls() {
        let chain = MockChain::new();
        let results = reader(&chain).read(&chain, &[]).await;
        assert!(results.is_empty());
        assert_eq!(chain.call_count(), 0);
    }
}
