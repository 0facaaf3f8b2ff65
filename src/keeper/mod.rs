//! Vault reconciliation pipeline.
//!
//! One cycle enumerates every LP position NFT the vault holds, batch-reads
//! position geometry, hedge-demand signals and deposit status, reads the
//! vault's global hedge state, and reconciles each position into an
//! Open/Close/Hold decision:
//! - Per-key read failures are data, not errors; they never stop a cycle.
//! - Only the vault scan can fail a cycle.
//! - All results are keyed by (collection, token id) and deterministic.

mod deposits;
mod hedge_state;
mod orchestrator;
mod positions;
mod reconciler;
mod scanner;
mod signals;
pub mod types;

pub use deposits::DepositBatchReader;
pub use hedge_state::HedgeStateReader;
pub use orchestrator::{DecisionSink, Keeper, KeeperError, LogOnlySink};
pub use positions::PositionBatchReader;
pub use reconciler::{reconcile, MissingSignalPolicy};
pub use scanner::{VaultHoldings, VaultScanner};
pub use signals::SignalBatchReader;
