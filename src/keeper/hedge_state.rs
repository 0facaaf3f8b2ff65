//! Global hedge-status read.
//!
//! One round trip against the hedge manager, keyed by the vault account.
//! The design tracks hedge execution per vault, not per position: this one
//! record is broadcast to every key's reconciliation in the same cycle.

use crate::chain::bindings::IHedgeManager;
use crate::chain::{CallExecutor, ChainError};
use crate::keeper::types::VaultHedgeState;
use alloy::primitives::Address;
use alloy::sol_types::SolCall;

pub struct HedgeStateReader {
    hedge_manager: Address,
    vault: Address,
}

impl HedgeStateReader {
    pub fn new(hedge_manager: Address, vault: Address) -> Self {
        Self {
            hedge_manager,
            vault,
        }
    }

    pub async fn read<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
    ) -> Result<VaultHedgeState, ChainError> {
        let raw = chain
            .call(
                self.hedge_manager,
                IHedgeManager::getHedgeStatusCall { user: self.vault }
                    .abi_encode()
                    .into(),
            )
            .await?;

        let ret = IHedgeManager::getHedgeStatusCall::abi_decode_returns(&raw)
            .map_err(|e| ChainError::decode("getHedgeStatus", e))?;

        Ok(VaultHedgeState {
            is_active: ret.isActive,
            hedge_size: ret.hedgeSize,
            entry_price: ret.entryPrice,
            current_price: ret.currentPrice,
            stable_deposit: ret.stableDeposit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::mock::{HedgeStatusSeed, MockChain};
    use alloy::primitives::U256;

    fn reader(chain: &MockChain) -> HedgeStateReader {
        HedgeStateReader::new(chain.addresses().hedge_manager, chain.vault_address())
    }

    #[tokio::test]
    async fn reads_active_hedge_status() {
        let mut chain = MockChain::new();
        chain.set_hedge_status(HedgeStatusSeed {
            is_active: true,
            hedge_size: 1_500,
            entry_price: 2_000,
            current_price: 2_100,
            stable_deposit: U256::from(50_000u64),
        });

        let state = reader(&chain).read(&chain).await.unwrap();

        assert!(state.is_active);
        assert_eq!(state.hedge_size, 1_500);
        assert_eq!(state.entry_price, 2_000);
        assert_eq!(state.stable_deposit, U256::from(50_000u64));
    }

    #[tokio::test]
    async fn propagates_read_failure() {
        let mut chain = MockChain::new();
        chain.fail_hedge_status_call();

        assert!(reader(&chain).read(&chain).await.is_err());
    }
}
