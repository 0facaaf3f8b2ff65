//! Batched position-geometry reads.
//!
//! One `getPositionInfo` sub-call per key, bundled through the aggregation
//! contract so a single reverting position cannot poison the batch. The
//! result is a total function over the requested keys: every key comes back
//! exactly once, as either decoded details or a captured failure.

use crate::chain::bindings::{ILpNftVault, IMulticall3};
use crate::chain::{try_aggregate, CallExecutor};
use crate::keeper::types::{PositionDetails, PositionInfo, PositionKey};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::collections::BTreeMap;
use tracing::warn;

pub struct PositionBatchReader {
    vault: Address,
    multicall: Address,
    chunk_size: usize,
}

impl PositionBatchReader {
    pub fn new(vault: Address, multicall: Address, chunk_size: usize) -> Self {
        Self {
            vault,
            multicall,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Read position info for every key. Sub-call and decode failures are
    /// recorded per key; if a whole chunk's aggregate round trip fails, each
    /// key in that chunk is marked unavailable with the transport error and
    /// the remaining chunks still run.
    pub async fn read<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        keys: &[PositionKey],
    ) -> BTreeMap<PositionKey, PositionInfo> {
        let mut results = BTreeMap::new();
        if keys.is_empty() {
            return results;
        }

        for chunk in keys.chunks(self.chunk_size) {
            let calls: Vec<IMulticall3::Call> = chunk
                .iter()
                .map(|key| IMulticall3::Call {
                    target: self.vault,
                    callData: ILpNftVault::getPositionInfoCall {
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
                        let info = if !sub.success || sub.return_data.is_empty() {
                            PositionInfo::Unavailable {
                                error: "call failed".to_string(),
                            }
                        } else {
                            match decode_position_info(&sub.return_data) {
                                Ok(details) => PositionInfo::Available(details),
                                Err(reason) => PositionInfo::Unavailable {
                                    error: format!("decode failed: {reason}"),
                                },
                            }
                        };
                        results.insert(*key, info);
                    }
                }
                Err(e) => {
                    warn!(keys = chunk.len(), error = %e, "position batch chunk failed");
                    for key in chunk {
                        results.insert(
                            *key,
                            PositionInfo::Unavailable {
                                error: format!("batch call failed: {e}"),
                            },
                        );
                    }
                }
            }
        }

        results
    }
}

/// Fixed decoder for `getPositionInfo` returns.
fn decode_position_info(raw: &[u8]) -> Result<PositionDetails, String> {
    let ret = ILpNftVault::getPositionInfoCall::abi_decode_returns(raw).map_err(|e| e.to_string())?;
    Ok(PositionDetails {
        token0: ret.token0,
        token1: ret.token1,
        fee: ret.fee.to::<u32>(),
        liquidity: ret.liquidity,
        tick_lower: i32::try_from(ret.tickLower).map_err(|e| e.to_string())?,
        tick_upper: i32::try_from(ret.tickUpper).map_err(|e| e.to_string())?,
        current_tick: i32::try_from(ret.currentTick).map_err(|e| e.to_string())?,
        sqrt_price_x96: U256::from(ret.sqrtPriceX96),
        is_in_range: ret.isInRange,
        owed0: ret.owed0,
        owed1: ret.owed1,
    })
}
