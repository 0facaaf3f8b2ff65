//! Per-key deposit ownership reads.
//!
//! Deliberately not an aggregated batch: each key gets its own round trip,
//! issued concurrently with unordered completion, and results are
//! recollected by key before this stage returns. Failures default to an
//! inactive, unowned record.

use crate::chain::bindings::ILpNftVault;
use crate::chain::CallExecutor;
use crate::keeper::types::{DepositRecord, PositionKey};
use alloy::primitives::Address;
use alloy::sol_types::SolCall;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use tracing::warn;

pub struct DepositBatchReader {
    vault: Address,
}

impl DepositBatchReader {
    pub fn new(vault: Address) -> Self {
        Self { vault }
    }

    /// Look up ownership/active status for every key. Individual failures
    /// (revert, transport, decode) are logged and fall back to the default
    /// record; the set always completes.
    pub async fn read<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        keys: &[PositionKey],
    ) -> BTreeMap<PositionKey, DepositRecord> {
        let lookups = keys.iter().map(|key| async move {
            let record = self.fetch_one(chain, key).await;
            (*key, record)
        });

        join_all(lookups).await.into_iter().collect()
    }

    async fn fetch_one<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        key: &PositionKey,
    ) -> DepositRecord {
        let calldata = ILpNftVault::getDepositCall {
            nft: key.collection,
            tokenId: key.token_id,
        }
        .abi_encode();

        let raw = match chain.call(self.vault, calldata.into()).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(%key, error = %e, "getDeposit failed, defaulting to inactive");
                return DepositRecord::default();
            }
        };

        match ILpNftVault::getDepositCall::abi_decode_returns(&raw) {
            Ok(deposit) => DepositRecord {
                owner: Some(deposit.owner),
                active: deposit.active,
            },
            Err(e) => {
                warn!(%key, error = %e, "getDeposit decode failed, defaulting to inactive");
                DepositRecord::default()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use alloy::primitives::{address, U256};

    const COLLECTION: Address = address!("00000000000000000000000000000000000000c1");
    const OWNER: Address = address!("00000000000000000000000000000000000000ee");

    fn key(token_id: u64) -> PositionKey {
        PositionKey::new(COLLECTION, U256::from(token_id))
    }

    #[tokio::test]
    async fn collects_records_by_key() {
        let mut chain = MockChain::new();
        chain.seed_deposit(COLLECTION, 1, OWNER, true);
        chain.seed_deposit(COLLECTION, 2, OWNER, false);

        let reader = DepositBatchReader::new(chain.vault_address());
        let records = reader.read(&chain, &[key(1), key(2)]).await;

        assert_eq!(records.len(), 2);
        assert_eq!(records[&key(1)], DepositRecord { owner: Some(OWNER), active: true });
        assert_eq!(records[&key(2)], DepositRecord { owner: Some(OWNER), active: false });
    }

    #[tokio::test]
    async fn lookup_failure_defaults_without_aborting_the_set() {
        let mut chain = MockChain::new();
        chain.seed_deposit(COLLECTION, 1, OWNER, true);
        chain.fail_deposit_call(COLLECTION, 2);

        let reader = DepositBatchReader::new(chain.vault_address());
        let records = reader.read(&chain, &[key(1), key(2)]).await;

        assert_eq!(records[&key(1)].owner, Some(OWNER));
        assert_eq!(records[&key(2)], DepositRecord::default());
    }

    #[tokio::test]
    async fn issues_one_round_trip_per_key() {
        let mut chain = MockChain::new();
        chain.seed_deposit(COLLECTION, 1, OWNER, true);
        chain.seed_deposit(COLLECTION, 2, OWNER, true);
        chain.seed_deposit(COLLECTION, 3, OWNER, true);

        let reader = DepositBatchReader::new(chain.vault_address());
        reader.read(&chain, &[key(1), key(2), key(3)]).await;

        assert_eq!(chain.call_count(), 3);
    }

    #[tokio::test]
    async fn empty_key_set_issues_no_calls() {
        let chain = MockChain::new();
        let reader = DepositBatchReader::new(chain.vault_address());
        let records = reader.read(&chain, &[]).await;
        assert!(records.is_empty());
        assert_eq!(chain.call_count(), 0);
    }
}
