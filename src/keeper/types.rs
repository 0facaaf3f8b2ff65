//! Cycle-scoped value objects for the reconciliation pipeline.
//!
//! Everything here is rebuilt from chain state on every pass and discarded
//! once decisions are dispatched; nothing carries state between cycles.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Identity of one NFT position held by the vault: (collection, token id).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PositionKey {
    pub collection: Address,
    pub token_id: U256,
}

impl PositionKey {
    pub fn new(collection: Address, token_id: U256) -> Self {
        Self {
            collection,
            token_id,
        }
    }
}

impl fmt::Display for PositionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.collection, self.token_id)
    }
}

/// Geometry and accounting data for one position, when the read succeeded.
#[derive(Debug, Clone)]
pub struct PositionDetails {
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

/// Per-key outcome of the position batch read.
#[derive(Debug, Clone)]
pub enum PositionInfo {
    Available(PositionDetails),
    Unavailable { error: String },
}

impl PositionInfo {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

/// Hedge-demand data for one position, when the read succeeded.
#[derive(Debug, Clone)]
pub struct SignalDetails {
    pub should_hedge: bool,
    pub target_token_balance: U256,
    pub other_token_balance: U256,
    /// Target-token share of the position, 10000 = 100%. Always within
    /// 0..=10000; out-of-range payloads are rejected at decode time.
    pub target_token_ratio_bps: u32,
    pub reason: String,
}

/// Per-key outcome of the signal batch read. Availability is the only
/// failure channel: a missing signal is data, not an error.
#[derive(Debug, Clone)]
pub enum HedgeSignal {
    Available(SignalDetails),
    Unavailable { reason: String },
}

impl HedgeSignal {
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// The demand flag, if the signal was readable.
    pub fn should_hedge(&self) -> Option<bool> {
        match self {
            Self::Available(details) => Some(details.should_hedge),
            Self::Unavailable { .. } => None,
        }
    }
}

/// Deposit ownership/active status for one key. Lookup failures fall back
/// to the default (no owner, inactive).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositRecord {
    pub owner: Option<Address>,
    pub active: bool,
}

/// The vault's global hedge execution state. Not keyed by position: the
/// same record feeds every key's reconciliation within a cycle.
#[derive(Debug, Clone, Copy, Default)]
pub struct VaultHedgeState {
    pub is_active: bool,
    pub hedge_size: u64,
    pub entry_price: u64,
    pub current_price: u64,
    pub stable_deposit: U256,
}

/// What the keeper wants done about one position's hedge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HedgeAction {
    Open,
    Close,
    Hold,
}

impl HedgeAction {
    /// Hold is informational; only Open/Close reach the submission hook.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Hold)
    }
}

impl fmt::Display for HedgeAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Close => write!(f, "CLOSE"),
            Self::Hold => write!(f, "HOLD"),
        }
    }
}

/// A reconciliation verdict with its human-readable justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HedgeDecision {
    pub action: HedgeAction,
    pub reason: String,
}

/// Everything the cycle learned about one position, plus the verdict.
///
/// Deposit and position data ride along for observability; the decision
/// itself is a function of the signal and the global hedge state only.
#[derive(Debug, Clone)]
pub struct EvaluatedPosition {
    pub position: PositionInfo,
    pub signal: HedgeSignal,
    pub deposit: DepositRecord,
    pub decision: HedgeDecision,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Scan found nothing; fetch and reconcile stages were skipped.
    NoPositions,
    /// The global hedge-status read failed; no decisions were produced.
    HedgeStateUnavailable(String),
    /// The full pipeline ran and decisions were dispatched.
    Completed,
}

/// Summary of one scan → read → reconcile → dispatch pass.
#[derive(Debug)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: CycleOutcome,
    /// Global hedge state used for every decision this cycle, if read.
    pub hedge_state: Option<VaultHedgeState>,
    pub evaluated: BTreeMap<PositionKey, EvaluatedPosition>,
    /// Open/Close decisions handed to the submission hook.
    pub dispatched: usize,
    /// Submission hook invocations that returned an error (non-fatal).
    pub dispatch_errors: usize,
}

impl CycleReport {
    pub fn actionable(&self) -> impl Iterator<Item = (&PositionKey, &EvaluatedPosition)> {
        self.evaluated
            .iter()
            .filter(|(_, e)| e.decision.action.is_actionable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;

    #[test]
    fn position_keys_order_by_collection_then_token_id() {
        let a = address!("00000000000000000000000000000000000000aa");
        let b = address!("00000000000000000000000000000000000000bb");

        let mut keys = vec![
            PositionKey::new(b, U256::from(1)),
            PositionKey::new(a, U256::from(9)),
            PositionKey::new(a, U256::from(2)),
        ];
        keys.sort();

        assert_eq!(keys[0], PositionKey::new(a, U256::from(2)));
        assert_eq!(keys[1], PositionKey::new(a, U256::from(9)));
        assert_eq!(keys[2], PositionKey::new(b, U256::from(1)));
    }

    #[test]
    fn display_shows_collection_and_token_id() {
        let key = PositionKey::new(
            address!("00000000000000000000000000000000000000aa"),
            U256::from(42),
        );
        assert!(key.to_string().ends_with("#42"));
    }

    #[test]
    fn only_open_and_close_are_actionable() {
        assert!(HedgeAction::Open.is_actionable());
        assert!(HedgeAction::Close.is_actionable());
        assert!(!HedgeAction::Hold.is_actionable());
    }

    #[test]
    fn default_deposit_record_is_inactive_and_unowned() {
        let record = DepositRecord::default();
        assert_eq!(record.owner, None);
        assert!(!record.active);
    }
}
