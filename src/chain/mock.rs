//! In-memory chain double for tests and paper mode.
//!
//! Decodes the same calldata the live path produces and answers from seeded
//! vault state, so the pipeline is exercised byte-for-byte without an
//! endpoint. Mirrors the failure modes the keeper has to survive: reverted
//! whitelist reads, collections without enumeration, failing sub-calls,
//! malformed return payloads, and a dead hedge-status contract.

use super::bindings::{IErc721Enumerable, IHedgeManager, ILpNftVault, IMulticall3};
use super::{CallExecutor, ChainAddresses, ChainError};
use alloy::primitives::{address, aliases::I24, aliases::U24, aliases::U160, Address, Bytes, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};

const MOCK_VAULT: Address = address!("00000000000000000000000000000000000000a1");
const MOCK_HEDGE: Address = address!("00000000000000000000000000000000000000b2");
const MOCK_MULTICALL: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

type Key = (Address, U256);

/// Seed values for one position's geometry read.
#[derive(Debug, Clone)]
pub struct PositionSeed {
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    pub liquidity: u128,
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub current_tick: i32,
    pub sqrt_price_x96: U256,
    pub is_in_range: bool,
    pub owed0: U256,
    pub owed1: U256,
}

impl Default for PositionSeed {
    fn default() -> Self {
        Self {
            token0: address!("1000000000000000000000000000000000000001"),
            token1: address!("2000000000000000000000000000000000000002"),
            fee: 3000,
            liquidity: 1_000_000_000_000_000_000,
            tick_lower: -600,
            tick_upper: 600,
            current_tick: 0,
            sqrt_price_x96: U256::from(1u128) << 96,
            is_in_range: true,
            owed0: U256::ZERO,
            owed1: U256::ZERO,
        }
    }
}

/// Seed values for one position's hedge-demand signal.
#[derive(Debug, Clone)]
pub struct SignalSeed {
    pub should_hedge: bool,
    pub target_token_balance: U256,
    pub other_token_balance: U256,
    pub ratio_bps: u32,
    pub reason: String,
}

impl SignalSeed {
    pub fn demand(ratio_bps: u32) -> Self {
        Self {
            should_hedge: true,
            target_token_balance: U256::from(9_000u64),
            other_token_balance: U256::from(1_000u64),
            ratio_bps,
            reason: "target ratio drifted past threshold".to_string(),
        }
    }

    pub fn no_demand(ratio_bps: u32) -> Self {
        Self {
            should_hedge: false,
            target_token_balance: U256::from(5_000u64),
            other_token_balance: U256::from(5_000u64),
            ratio_bps,
            reason: "target ratio within threshold".to_string(),
        }
    }
}

/// Global hedge status seed (vault-scoped, one per chain).
#[derive(Debug, Clone)]
pub struct HedgeStatusSeed {
    pub is_active: bool,
    pub hedge_size: u64,
    pub entry_price: u64,
    pub current_price: u64,
    pub stable_deposit: U256,
}

impl Default for HedgeStatusSeed {
    fn default() -> Self {
        Self {
            is_active: false,
            hedge_size: 0,
            entry_price: 0,
            current_price: 0,
            stable_deposit: U256::ZERO,
        }
    }
}

/// Programmable in-memory chain.
pub struct MockChain {
    addresses: ChainAddresses,
    collections: Vec<Address>,
    holdings: BTreeMap<Address, Vec<U256>>,
    positions: BTreeMap<Key, PositionSeed>,
    signals: BTreeMap<Key, SignalSeed>,
    deposits: BTreeMap<Key, (Address, bool)>,
    hedge_status: HedgeStatusSeed,

    fail_whitelist: bool,
    fail_hedge_status: bool,
    fail_aggregate: bool,
    broken_enumeration: BTreeSet<Address>,
    broken_index: BTreeSet<(Address, u64)>,
    fail_position: BTreeSet<Key>,
    garbage_position: BTreeSet<Key>,
    fail_signal: BTreeSet<Key>,
    garbage_signal: BTreeSet<Key>,
    fail_deposit: BTreeSet<Key>,

    calls: AtomicUsize,
}

impl Default for MockChain {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self {
            addresses: ChainAddresses {
                vault: MOCK_VAULT,
                hedge_manager: MOCK_HEDGE,
                multicall: MOCK_MULTICALL,
            },
            collections: Vec::new(),
            holdings: BTreeMap::new(),
            positions: BTreeMap::new(),
            signals: BTreeMap::new(),
            deposits: BTreeMap::new(),
            hedge_status: HedgeStatusSeed::default(),
            fail_whitelist: false,
            fail_hedge_status: false,
            fail_aggregate: false,
            broken_enumeration: BTreeSet::new(),
            broken_index: BTreeSet::new(),
            fail_position: BTreeSet::new(),
            garbage_position: BTreeSet::new(),
            fail_signal: BTreeSet::new(),
            garbage_signal: BTreeSet::new(),
            fail_deposit: BTreeSet::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn addresses(&self) -> ChainAddresses {
        self.addresses
    }

    pub fn vault_address(&self) -> Address {
        self.addresses.vault
    }

    pub fn multicall_address(&self) -> Address {
        self.addresses.multicall
    }

    /// Number of top-level `eth_call` round trips issued so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    // ==================== Seeding ====================

    /// Whitelist a collection and record the token ids the vault holds in it.
    pub fn add_collection(&mut self, collection: Address, token_ids: &[u64]) -> &mut Self {
        self.collections.push(collection);
        self.holdings
            .insert(collection, token_ids.iter().map(|id| U256::from(*id)).collect());
        self
    }

    pub fn seed_position(&mut self, collection: Address, token_id: u64, seed: PositionSeed) -> &mut Self {
        self.positions.insert((collection, U256::from(token_id)), seed);
        self
    }

    pub fn seed_signal(&mut self, collection: Address, token_id: u64, seed: SignalSeed) -> &mut Self {
        self.signals.insert((collection, U256::from(token_id)), seed);
        self
    }

    pub fn seed_deposit(&mut self, collection: Address, token_id: u64, owner: Address, active: bool) -> &mut Self {
        self.deposits.insert((collection, U256::from(token_id)), (owner, active));
        self
    }

    pub fn set_hedge_status(&mut self, seed: HedgeStatusSeed) -> &mut Self {
        self.hedge_status = seed;
        self
    }

    // ==================== Failure injection ====================

    /// Make the whitelist count/page reads revert (the one fatal scan path).
    pub fn fail_whitelist_reads(&mut self) -> &mut Self {
        self.fail_whitelist = true;
        self
    }

    /// Collection does not expose the enumeration interface: balanceOf reverts.
    pub fn break_enumeration(&mut self, collection: Address) -> &mut Self {
        self.broken_enumeration.insert(collection);
        self
    }

    /// A single tokenOfOwnerByIndex slot reverts.
    pub fn break_index(&mut self, collection: Address, index: u64) -> &mut Self {
        self.broken_index.insert((collection, index));
        self
    }

    pub fn fail_position_call(&mut self, collection: Address, token_id: u64) -> &mut Self {
        self.fail_position.insert((collection, U256::from(token_id)));
        self
    }

    /// Sub-call reports success but returns bytes that do not decode.
    pub fn corrupt_position_call(&mut self, collection: Address, token_id: u64) -> &mut Self {
        self.garbage_position.insert((collection, U256::from(token_id)));
        self
    }

    pub fn fail_signal_call(&mut self, collection: Address, token_id: u64) -> &mut Self {
        self.fail_signal.insert((collection, U256::from(token_id)));
        self
    }

    pub fn corrupt_signal_call(&mut self, collection: Address, token_id: u64) -> &mut Self {
        self.garbage_signal.insert((collection, U256::from(token_id)));
        self
    }

    pub fn fail_deposit_call(&mut self, collection: Address, token_id: u64) -> &mut Self {
        self.fail_deposit.insert((collection, U256::from(token_id)));
        self
    }

    pub fn fail_hedge_status_call(&mut self) -> &mut Self {
        self.fail_hedge_status = true;
        self
    }

    /// Make every aggregate round trip fail at the transport level.
    pub fn fail_aggregate_calls(&mut self) -> &mut Self {
        self.fail_aggregate = true;
        self
    }

    // ==================== Dispatch ====================

    fn dispatch(&self, target: Address, data: &[u8]) -> Result<Vec<u8>, String> {
        if data.len() < 4 {
            return Err("calldata shorter than a selector".to_string());
        }
        let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];

        match selector {
            s if s == ILpNftVault::getWhitelistedNFTCountCall::SELECTOR => {
                self.expect_target(target, self.addresses.vault)?;
                if self.fail_whitelist {
                    return Err("execution reverted".to_string());
                }
                Ok(ILpNftVault::getWhitelistedNFTCountCall::abi_encode_returns(
                    &U256::from(self.collections.len()),
                ))
            }
            s if s == ILpNftVault::getWhitelistedNFTsCall::SELECTOR => {
                self.expect_target(target, self.addresses.vault)?;
                if self.fail_whitelist {
                    return Err("execution reverted".to_string());
                }
                let call = ILpNftVault::getWhitelistedNFTsCall::abi_decode(data)
                    .map_err(|e| e.to_string())?;
                let offset = usize::try_from(call.offset).map_err(|_| "offset overflow")?;
                let limit = usize::try_from(call.limit).map_err(|_| "limit overflow")?;
                let end = offset.saturating_add(limit).min(self.collections.len());
                let page: Vec<Address> = self.collections[offset.min(end)..end].to_vec();
                Ok(ILpNftVault::getWhitelistedNFTsCall::abi_encode_returns(&page))
            }
            s if s == IErc721Enumerable::balanceOfCall::SELECTOR => {
                if self.broken_enumeration.contains(&target) {
                    return Err("execution reverted: unknown selector".to_string());
                }
                let owned = self.holdings.get(&target).map(Vec::len).unwrap_or(0);
                Ok(IErc721Enumerable::balanceOfCall::abi_encode_returns(
                    &U256::from(owned),
                ))
            }
            s if s == IErc721Enumerable::tokenOfOwnerByIndexCall::SELECTOR => {
                let call = IErc721Enumerable::tokenOfOwnerByIndexCall::abi_decode(data)
                    .map_err(|e| e.to_string())?;
                let index = u64::try_from(call.index).map_err(|_| "index overflow")?;
                if self.broken_index.contains(&(target, index)) {
                    return Err("execution reverted".to_string());
                }
                self.holdings
                    .get(&target)
                    .and_then(|ids| ids.get(index as usize))
                    .map(|id| IErc721Enumerable::tokenOfOwnerByIndexCall::abi_encode_returns(id))
                    .ok_or_else(|| "index out of bounds".to_string())
            }
            s if s == ILpNftVault::getPositionInfoCall::SELECTOR => {
                self.expect_target(target, self.addresses.vault)?;
                let call = ILpNftVault::getPositionInfoCall::abi_decode(data)
                    .map_err(|e| e.to_string())?;
                let key = (call.nft, call.tokenId);
                if self.fail_position.contains(&key) {
                    return Err("execution reverted".to_string());
                }
                if self.garbage_position.contains(&key) {
                    return Ok(vec![0xde, 0xad, 0xbe, 0xef]);
                }
                let seed = self
                    .positions
                    .get(&key)
                    .ok_or_else(|| "unknown position".to_string())?;
                Ok(ILpNftVault::getPositionInfoCall::abi_encode_returns(
                    &ILpNftVault::getPositionInfoReturn {
                        token0: seed.token0,
                        token1: seed.token1,
                        fee: U24::from(seed.fee),
                        liquidity: seed.liquidity,
                        tickLower: I24::try_from(seed.tick_lower).expect("tick fits int24"),
                        tickUpper: I24::try_from(seed.tick_upper).expect("tick fits int24"),
                        currentTick: I24::try_from(seed.current_tick).expect("tick fits int24"),
                        sqrtPriceX96: seed.sqrt_price_x96.to::<U160>(),
                        isInRange: seed.is_in_range,
                        owed0: seed.owed0,
                        owed1: seed.owed1,
                    },
                ))
            }
            s if s == ILpNftVault::shouldHedgePositionCall::SELECTOR => {
                self.expect_target(target, self.addresses.vault)?;
                let call = ILpNftVault::shouldHedgePositionCall::abi_decode(data)
                    .map_err(|e| e.to_string())?;
                let key = (call.nft, call.tokenId);
                if self.fail_signal.contains(&key) {
                    return Err("execution reverted".to_string());
                }
                if self.garbage_signal.contains(&key) {
                    return Ok(vec![0x00, 0x01]);
                }
                let seed = self
                    .signals
                    .get(&key)
                    .ok_or_else(|| "unknown signal".to_string())?;
                Ok(ILpNftVault::shouldHedgePositionCall::abi_encode_returns(
                    &ILpNftVault::shouldHedgePositionReturn {
                        shouldHedge: seed.should_hedge,
                        targetTokenBalance: seed.target_token_balance,
                        otherTokenBalance: seed.other_token_balance,
                        targetTokenRatio: U256::from(seed.ratio_bps),
                        reason: seed.reason.clone(),
                    },
                ))
            }
            s if s == ILpNftVault::getDepositCall::SELECTOR => {
                self.expect_target(target, self.addresses.vault)?;
                let call =
                    ILpNftVault::getDepositCall::abi_decode(data).map_err(|e| e.to_string())?;
                let key = (call.nft, call.tokenId);
                if self.fail_deposit.contains(&key) {
                    return Err("execution reverted".to_string());
                }
                let (owner, active) = self
                    .deposits
                    .get(&key)
                    .copied()
                    .unwrap_or((Address::ZERO, false));
                Ok(ILpNftVault::getDepositCall::abi_encode_returns(
                    &ILpNftVault::Deposit {
                        owner,
                        nft: call.nft,
                        tokenId: call.tokenId,
                        active,
                        token0: Address::ZERO,
                        token1: Address::ZERO,
                        fee: U24::from(0u32),
                        tickLower: I24::ZERO,
                        tickUpper: I24::ZERO,
                        liquiditySnapshot: 0,
                    },
                ))
            }
            s if s == IHedgeManager::getHedgeStatusCall::SELECTOR => {
                self.expect_target(target, self.addresses.hedge_manager)?;
                if self.fail_hedge_status {
                    return Err("execution reverted".to_string());
                }
                Ok(IHedgeManager::getHedgeStatusCall::abi_encode_returns(
                    &IHedgeManager::getHedgeStatusReturn {
                        isActive: self.hedge_status.is_active,
                        hedgeSize: self.hedge_status.hedge_size,
                        entryPrice: self.hedge_status.entry_price,
                        currentPrice: self.hedge_status.current_price,
                        stableDeposit: self.hedge_status.stable_deposit,
                    },
                ))
            }
            _ => Err(format!("unknown selector {selector:02x?} on {target}")),
        }
    }

    fn expect_target(&self, actual: Address, expected: Address) -> Result<(), String> {
        if actual == expected {
            Ok(())
        } else {
            Err(format!("call sent to {actual}, expected {expected}"))
        }
    }
}

#[async_trait]
impl CallExecutor for MockChain {
    async fn call(&self, target: Address, data: Bytes) -> Result<Bytes, ChainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if target == self.addresses.multicall
            && data.len() >= 4
            && data[..4] == IMulticall3::tryAggregateCall::SELECTOR
        {
            if self.fail_aggregate {
                return Err(ChainError::Transport("connection reset".to_string()));
            }
            let call = IMulticall3::tryAggregateCall::abi_decode(&data)
                .map_err(|e| ChainError::decode("tryAggregate", e))?;
            let results: Vec<IMulticall3::Result> = call
                .calls
                .iter()
                .map(|sub| match self.dispatch(sub.target, &sub.callData) {
                    Ok(bytes) => IMulticall3::Result {
                        success: true,
                        returnData: bytes.into(),
                    },
                    Err(_) => IMulticall3::Result {
                        success: false,
                        returnData: Bytes::new(),
                    },
                })
                .collect();
            return Ok(IMulticall3::tryAggregateCall::abi_encode_returns(&results).into());
        }

        self.dispatch(target, &data)
            .map(Bytes::from)
            .map_err(|reason| ChainError::CallFailed { target, reason })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: Address = address!("00000000000000000000000000000000000000c1");

    #[tokio::test]
    async fn answers_whitelist_count_from_seeded_state() {
        let mut chain = MockChain::new();
        chain.add_collection(COLLECTION, &[1, 2]);

        let raw = chain
            .call(
                chain.vault_address(),
                ILpNftVault::getWhitelistedNFTCountCall {}.abi_encode().into(),
            )
            .await
            .unwrap();
        let count = ILpNftVault::getWhitelistedNFTCountCall::abi_decode_returns(&raw).unwrap();
        assert_eq!(count, U256::from(1));
    }

    #[tokio::test]
    async fn aggregate_marks_failing_sub_calls_without_failing_batch() {
        let mut chain = MockChain::new();
        chain.add_collection(COLLECTION, &[7]);
        chain.seed_position(COLLECTION, 7, PositionSeed::default());
        chain.fail_position_call(COLLECTION, 8);

        let calls = vec![
            IMulticall3::Call {
                target: chain.vault_address(),
                callData: ILpNftVault::getPositionInfoCall {
                    nft: COLLECTION,
                    tokenId: U256::from(7),
                }
                .abi_encode()
                .into(),
            },
            IMulticall3::Call {
                target: chain.vault_address(),
                callData: ILpNftVault::getPositionInfoCall {
                    nft: COLLECTION,
                    tokenId: U256::from(8),
                }
                .abi_encode()
                .into(),
            },
        ];

        let raw = chain
            .call(
                chain.multicall_address(),
                IMulticall3::tryAggregateCall {
                    requireSuccess: false,
                    calls,
                }
                .abi_encode()
                .into(),
            )
            .await
            .unwrap();

        let results = IMulticall3::tryAggregateCall::abi_decode_returns(&raw).unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].success);
        assert!(!results[1].success);
    }

    #[tokio::test]
    async fn broken_enumeration_reverts_balance_of() {
        let mut chain = MockChain::new();
        chain.add_collection(COLLECTION, &[1]);
        chain.break_enumeration(COLLECTION);

        let result = chain
            .call(
                COLLECTION,
                IErc721Enumerable::balanceOfCall {
                    owner: chain.vault_address(),
                }
                .abi_encode()
                .into(),
            )
            .await;
        assert!(matches!(result, Err(ChainError::CallFailed { .. })));
    }
}
