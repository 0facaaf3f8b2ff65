//! Vault holdings scanner.
//!
//! Enumerates every (collection, token id) the vault currently owns by
//! paging the collection whitelist and walking each collection's
//! ERC721Enumerable index. Collection-level failures are skipped with a
//! warning; only the whitelist reads themselves can fail the scan.

use crate::chain::bindings::{IErc721Enumerable, ILpNftVault};
use crate::chain::{CallExecutor, ChainError};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Map of collection address to the token ids the vault holds in it.
pub type VaultHoldings = BTreeMap<Address, Vec<U256>>;

/// Scans the vault's whitelisted collections for owned position NFTs.
pub struct VaultScanner {
    vault: Address,
    page_size: u64,
}

impl VaultScanner {
    pub fn new(vault: Address, page_size: u64) -> Self {
        Self {
            vault,
            page_size: page_size.max(1),
        }
    }

    /// Collect all token ids currently owned by the vault, per collection.
    ///
    /// Collections that omit the enumeration interface are skipped; a
    /// failing index read truncates that one collection. An empty map means
    /// the cycle has nothing to do.
    pub async fn scan<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
    ) -> Result<VaultHoldings, ChainError> {
        let total = self.whitelist_count(chain).await?;
        info!(collections = total, "whitelisted collections");

        let mut collections = Vec::with_capacity(total as usize);
        let mut fetched = 0u64;
        while fetched < total {
            let limit = self.page_size.min(total - fetched);
            let page = self.whitelist_page(chain, fetched, limit).await?;
            if page.is_empty() {
                // A short page would loop forever; treat as a decode problem.
                return Err(ChainError::Decode {
                    method: "getWhitelistedNFTs",
                    reason: format!("empty page at offset {fetched} of {total}"),
                });
            }
            fetched += page.len() as u64;
            collections.extend(page);
        }

        let mut holdings = VaultHoldings::new();
        for collection in collections {
            let balance = match self.balance_of(chain, collection).await {
                Ok(balance) => balance,
                Err(e) => {
                    warn!(%collection, error = %e, "balanceOf failed, skipping collection");
                    continue;
                }
            };

            let mut ids = Vec::with_capacity(balance as usize);
            for index in 0..balance {
                match self.token_by_index(chain, collection, index).await {
                    Ok(id) => ids.push(id),
                    Err(e) => {
                        warn!(
                            %collection,
                            index,
                            error = %e,
                            "tokenOfOwnerByIndex failed, keeping partial ids"
                        );
                        break;
                    }
                }
            }

            if !ids.is_empty() {
                debug!(%collection, tokens = ids.len(), "collected token ids");
                holdings.insert(collection, ids);
            }
        }

        Ok(holdings)
    }

    async fn whitelist_count<C: CallExecutor + ?Sized>(&self, chain: &C) -> Result<u64, ChainError> {
        let raw = chain
            .call(
                self.vault,
                ILpNftVault::getWhitelistedNFTCountCall {}.abi_encode().into(),
            )
            .await?;
        let count = ILpNftVault::getWhitelistedNFTCountCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("getWhitelistedNFTCount", e))?;
        u64::try_from(count).map_err(|_| ChainError::Decode {
            method: "getWhitelistedNFTCount",
            reason: format!("count {count} exceeds u64"),
        })
    }

    async fn whitelist_page<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        offset: u64,
        limit: u64,
    ) -> Result<Vec<Address>, ChainError> {
        let raw = chain
            .call(
                self.vault,
                ILpNftVault::getWhitelistedNFTsCall {
                    offset: U256::from(offset),
                    limit: U256::from(limit),
                }
                .abi_encode()
                .into(),
            )
            .await?;
        ILpNftVault::getWhitelistedNFTsCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("getWhitelistedNFTs", e))
    }

    async fn balance_of<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        collection: Address,
    ) -> Result<u64, ChainError> {
        let raw = chain
            .call(
                collection,
                IErc721Enumerable::balanceOfCall { owner: self.vault }
                    .abi_encode()
                    .into(),
            )
            .await?;
        let balance = IErc721Enumerable::balanceOfCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("balanceOf", e))?;
        u64::try_from(balance).map_err(|_| ChainError::Decode {
            method: "balanceOf",
            reason: format!("balance {balance} exceeds u64"),
        })
    }

    async fn token_by_index<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
        collection: Address,
        index: u64,
    ) -> Result<U256, ChainError> {
        let raw = chain
            .call(
                collection,
                IErc721Enumerable::tokenOfOwnerByIndexCall {
                    owner: self.vault,
                    index: U256::from(index),
                }
                .abi_encode()
                .into(),
            )
            .await?;
        IErc721Enumerable::tokenOfOwnerByIndexCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("tokenOfOwnerByIndex", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::MockChain;
    use alloy::primitives::address;

    const COLL_A: Address = address!("00000000000000000000000000000000000000c1");
    const COLL_B: Address = address!("00000000000000000000000000000000000000c2");

    fn scanner(chain: &MockChain) -> VaultScanner {
        VaultScanner::new(chain.vault_address(), 500)
    }

    #[tokio::test]
    async fn empty_whitelist_yields_empty_map() {
        let chain = MockChain::new();
        let holdings = scanner(&chain).scan(&chain).await.unwrap();
        assert!(holdings.is_empty());
    }

    #[tokio::test]
    async fn collects_token_ids_per_collection() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[5, 9]);
        chain.add_collection(COLL_B, &[3]);

        let holdings = scanner(&chain).scan(&chain).await.unwrap();

        assert_eq!(holdings.len(), 2);
        assert_eq!(holdings[&COLL_A], vec![U256::from(5), U256::from(9)]);
        assert_eq!(holdings[&COLL_B], vec![U256::from(3)]);
    }

    #[tokio::test]
    async fn pages_through_whitelist_with_small_page_size() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[1]);
        chain.add_collection(COLL_B, &[2]);

        let scanner = VaultScanner::new(chain.vault_address(), 1);
        let holdings = scanner.scan(&chain).await.unwrap();

        assert_eq!(holdings.len(), 2);
    }

    #[tokio::test]
    async fn whitelist_failure_is_fatal() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[1]);
        chain.fail_whitelist_reads();

        let result = scanner(&chain).scan(&chain).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn skips_collection_without_enumeration_interface() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[5]);
        chain.add_collection(COLL_B, &[7, 8]);
        chain.break_enumeration(COLL_A);

        let holdings = scanner(&chain).scan(&chain).await.unwrap();

        assert!(!holdings.contains_key(&COLL_A));
        assert_eq!(holdings[&COLL_B], vec![U256::from(7), U256::from(8)]);
    }

    #[tokio::test]
    async fn index_failure_keeps_partial_ids_for_that_collection() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[10, 11, 12]);
        chain.add_collection(COLL_B, &[3]);
        chain.break_index(COLL_A, 1);

        let holdings = scanner(&chain).scan(&chain).await.unwrap();

        // Index 0 was read before index 1 reverted; 2 was never attempted.
        assert_eq!(holdings[&COLL_A], vec![U256::from(10)]);
        assert_eq!(holdings[&COLL_B], vec![U256::from(3)]);
    }

    #[tokio::test]
    async fn collection_with_zero_balance_is_omitted() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[]);
        chain.add_collection(COLL_B, &[4]);

        let holdings = scanner(&chain).scan(&chain).await.unwrap();

        assert!(!holdings.contains_key(&COLL_A));
        assert!(holdings.contains_key(&COLL_B));
    }

    #[tokio::test]
    async fn first_index_failure_drops_collection_entirely() {
        let mut chain = MockChain::new();
        chain.add_collection(COLL_A, &[10, 11]);
        chain.break_index(COLL_A, 0);

        let holdings = scanner(&chain).scan(&chain).await.unwrap();
        assert!(holdings.is_empty());
    }
}
