//! Hedge reconciliation logic.
//!
//! Pure function from (global hedge state, per-position signal) to a
//! decision. Deposit and position-geometry data never enter the truth
//! table; they are context for observability only.

use crate::keeper::types::{HedgeAction, HedgeDecision, HedgeSignal};
use serde::Deserialize;

/// What to assume when a position's signal could not be read.
///
/// The conservative default folds a missing signal into "no hedge demand":
/// a hedge is never opened on missing data. The flip side is that a
/// transient read failure while a hedge is active produces a Close
/// recommendation; deployments that prefer to ride out data loss can select
/// `HoldCurrent` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissingSignalPolicy {
    /// Treat an unavailable signal exactly like `shouldHedge = false`.
    #[default]
    TreatAsNoDemand,
    /// Leave the hedge as it is until the signal is readable again.
    HoldCurrent,
}

/// Decide what to do about one position's hedge.
pub fn reconcile(
    hedge_active: bool,
    signal: &HedgeSignal,
    policy: MissingSignalPolicy,
) -> HedgeDecision {
    let wants_hedge = match signal {
        HedgeSignal::Available(details) => details.should_hedge,
        HedgeSignal::Unavailable { reason } => match policy {
            MissingSignalPolicy::TreatAsNoDemand => false,
            MissingSignalPolicy::HoldCurrent => {
                return HedgeDecision {
                    action: HedgeAction::Hold,
                    reason: format!("signal unavailable ({reason}); holding current state"),
                };
            }
        },
    };

    match (hedge_active, wants_hedge) {
        (true, false) => HedgeDecision {
            action: HedgeAction::Close,
            reason: close_reason(signal),
        },
        (false, true) => HedgeDecision {
            action: HedgeAction::Open,
            reason: "hedge inactive but signal is on; consider opening hedge".to_string(),
        },
        _ => HedgeDecision {
            action: HedgeAction::Hold,
            reason: "hedge status matches signal (both on or both off)".to_string(),
        },
    }
}

fn close_reason(signal: &HedgeSignal) -> String {
    match signal {
        HedgeSignal::Available(_) => {
            "hedge active but signal is off; consider closing hedge".to_string()
        }
        // Surfaced so operators can tell data loss from a genuine off signal.
        HedgeSignal::Unavailable { reason } => format!(
            "hedge active but signal unavailable ({reason}); treating missing signal as no demand"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keeper::types::SignalDetails;
    use alloy::primitives::U256;

    fn signal(should_hedge: bool) -> HedgeSignal {
        HedgeSignal::Available(SignalDetails {
            should_hedge,
            target_token_balance: U256::from(1u64),
            other_token_balance: U256::from(1u64),
            target_token_ratio_bps: 5_000,
            reason: "test".to_string(),
        })
    }

    fn unavailable() -> HedgeSignal {
        HedgeSignal::Unavailable {
            reason: "call failed".to_string(),
        }
    }

    #[test]
    fn active_hedge_with_demand_holds() {
        let decision = reconcile(true, &signal(true), MissingSignalPolicy::default());
        assert_eq!(decision.action, HedgeAction::Hold);
    }

    #[test]
    fn active_hedge_without_demand_closes() {
        let decision = reconcile(true, &signal(false), MissingSignalPolicy::default());
        assert_eq!(decision.action, HedgeAction::Close);
    }

    #[test]
    fn inactive_hedge_with_demand_opens() {
        let decision = reconcile(false, &signal(true), MissingSignalPolicy::default());
        assert_eq!(decision.action, HedgeAction::Open);
    }

    #[test]
    fn inactive_hedge_without_demand_holds() {
        let decision = reconcile(false, &signal(false), MissingSignalPolicy::default());
        assert_eq!(decision.action, HedgeAction::Hold);
    }

    #[test]
    fn unavailable_signal_decides_like_no_demand_by_default() {
        for active in [true, false] {
            let lost = reconcile(active, &unavailable(), MissingSignalPolicy::TreatAsNoDemand);
            let off = reconcile(active, &signal(false), MissingSignalPolicy::TreatAsNoDemand);
            assert_eq!(lost.action, off.action);
        }
    }

    #[test]
    fn close_from_data_loss_surfaces_unavailability_in_reason() {
        let decision = reconcile(true, &unavailable(), MissingSignalPolicy::TreatAsNoDemand);
        assert_eq!(decision.action, HedgeAction::Close);
        assert!(decision.reason.contains("unavailable"));
        assert!(decision.reason.contains("call failed"));
    }

    #[test]
    fn hold_current_policy_never_acts_on_missing_data() {
        for active in [true, false] {
            let decision = reconcile(active, &unavailable(), MissingSignalPolicy::HoldCurrent);
            assert_eq!(decision.action, HedgeAction::Hold);
            assert!(decision.reason.contains("unavailable"));
        }
    }

    #[test]
    fn never_opens_on_missing_data_under_either_policy() {
        for policy in [
            MissingSignalPolicy::TreatAsNoDemand,
            MissingSignalPolicy::HoldCurrent,
        ] {
            let decision = reconcile(false, &unavailable(), policy);
            assert_ne!(decision.action, HedgeAction::Open);
        }
    }
}
