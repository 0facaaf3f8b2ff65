//! Single-cycle orchestration: scan → batch-read → reconcile → dispatch.
//!
//! One cycle is one pass over the vault. Per-key failures inside the read
//! and reconcile stages never fail the cycle; only the scan step returns an
//! error to the caller. The next scheduled cycle is the only retry.

use crate::chain::{CallExecutor, ChainAddresses, ChainError};
use crate::config::KeeperConfig;
use crate::keeper::deposits::DepositBatchReader;
use crate::keeper::hedge_state::HedgeStateReader;
use crate::keeper::positions::PositionBatchReader;
use crate::keeper::reconciler::{reconcile, MissingSignalPolicy};
use crate::keeper::scanner::VaultScanner;
use crate::keeper::signals::SignalBatchReader;
use crate::keeper::types::{
    CycleOutcome, CycleReport, EvaluatedPosition, HedgeDecision, HedgeSignal, PositionInfo,
    PositionKey, VaultHedgeState,
};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[cfg(test)]
use mockall::automock;

/// Errors that abort a whole cycle. Everything else is per-key data.
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("vault scan failed: {0}")]
    Scan(#[from] ChainError),
}

/// Receiver for actionable decisions (Open/Close only, never Hold).
///
/// Stands in for the hedge-order submission path; errors are logged per
/// decision and never fail the cycle.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DecisionSink: Send + Sync {
    async fn submit(&self, key: &PositionKey, decision: &HedgeDecision) -> anyhow::Result<()>;
}

/// Sink that only logs, for deployments without an execution path wired up.
pub struct LogOnlySink;

#[async_trait]
impl DecisionSink for LogOnlySink {
    async fn submit(&self, key: &PositionKey, decision: &HedgeDecision) -> anyhow::Result<()> {
        info!(%key, action = %decision.action, "no execution path configured, decision logged only");
        Ok(())
    }
}

/// Structured per-decision record, emitted once per key per cycle.
#[derive(Debug, Serialize)]
struct DecisionRecord<'a> {
    collection: String,
    token_id: String,
    action: &'a crate::keeper::types::HedgeAction,
    reason: &'a str,
    hedge_active: bool,
    signal_available: bool,
    ratio_bps: Option<u32>,
    deposit_active: bool,
}

/// Runs the scan → read → reconcile → dispatch pipeline once per call.
pub struct Keeper {
    scanner: VaultScanner,
    positions: PositionBatchReader,
    signals: SignalBatchReader,
    deposits: DepositBatchReader,
    hedge_state: HedgeStateReader,
    policy: MissingSignalPolicy,
    sink: Arc<dyn DecisionSink>,
}

impl Keeper {
    pub fn new(addresses: ChainAddresses, config: &KeeperConfig, sink: Arc<dyn DecisionSink>) -> Self {
        Self {
            scanner: VaultScanner::new(addresses.vault, config.whitelist_page_size),
            positions: PositionBatchReader::new(
                addresses.vault,
                addresses.multicall,
                config.batch_chunk_size,
            ),
            signals: SignalBatchReader::new(
                addresses.vault,
                addresses.multicall,
                config.batch_chunk_size,
            ),
            deposits: DepositBatchReader::new(addresses.vault),
            hedge_state: HedgeStateReader::new(addresses.hedge_manager, addresses.vault),
            policy: config.missing_signal_policy,
            sink,
        }
    }

    /// Run one full cycle against the given chain context.
    pub async fn run_cycle<C: CallExecutor + ?Sized>(
        &self,
        chain: &C,
    ) -> Result<CycleReport, KeeperError> {
        let started_at = Utc::now();

        let holdings = self.scanner.scan(chain).await?;
        if holdings.is_empty() {
            info!("no NFTs held by vault, nothing to do");
            return Ok(CycleReport {
                started_at,
                finished_at: Utc::now(),
                outcome: CycleOutcome::NoPositions,
                hedge_state: None,
                evaluated: BTreeMap::new(),
                dispatched: 0,
                dispatch_errors: 0,
            });
        }

        let keys: Vec<PositionKey> = holdings
            .iter()
            .flat_map(|(collection, ids)| {
                ids.iter().map(|id| PositionKey::new(*collection, *id))
            })
            .collect();
        info!(
            collections = holdings.len(),
            positions = keys.len(),
            "scan complete"
        );

        // The three keyed reads are independent; overlap their wait time.
        let (positions, signals, deposits) = tokio::join!(
            self.positions.read(chain, &keys),
            self.signals.read(chain, &keys),
            self.deposits.read(chain, &keys),
        );

        let hedge_state = match self.hedge_state.read(chain).await {
            Ok(state) => state,
            Err(e) => {
                error!(error = %e, "hedge status unavailable, no decisions this cycle");
                return Ok(CycleReport {
                    started_at,
                    finished_at: Utc::now(),
                    outcome: CycleOutcome::HedgeStateUnavailable(e.to_string()),
                    hedge_state: None,
                    evaluated: BTreeMap::new(),
                    dispatched: 0,
                    dispatch_errors: 0,
                });
            }
        };

        let mut evaluated = BTreeMap::new();
        for key in &keys {
            let position = positions.get(key).cloned().unwrap_or_else(|| {
                PositionInfo::Unavailable {
                    error: "no result returned".to_string(),
                }
            });
            let signal = signals.get(key).cloned().unwrap_or_else(|| {
                HedgeSignal::Unavailable {
                    reason: "no signal returned".to_string(),
                }
            });
            let deposit = deposits.get(key).cloned().unwrap_or_default();

            let decision = reconcile(hedge_state.is_active, &signal, self.policy);
            evaluated.insert(
                *key,
                EvaluatedPosition {
                    position,
                    signal,
                    deposit,
                    decision,
                },
            );
        }

        let (dispatched, dispatch_errors) = self.dispatch(&evaluated, &hedge_state).await;

        let report = CycleReport {
            started_at,
            finished_at: Utc::now(),
            outcome: CycleOutcome::Completed,
            hedge_state: Some(hedge_state),
            evaluated,
            dispatched,
            dispatch_errors,
        };
        info!(
            positions = report.evaluated.len(),
            dispatched,
            dispatch_errors,
            duration_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "cycle complete"
        );
        Ok(report)
    }

    async fn dispatch(
        &self,
        evaluated: &BTreeMap<PositionKey, EvaluatedPosition>,
        hedge_state: &VaultHedgeState,
    ) -> (usize, usize) {
        let mut dispatched = 0;
        let mut errors = 0;

        for (key, eval) in evaluated {
            log_decision(key, eval, hedge_state);

            if !eval.decision.action.is_actionable() {
                continue;
            }
            match self.sink.submit(key, &eval.decision).await {
                Ok(()) => dispatched += 1,
                Err(e) => {
                    error!(%key, action = %eval.decision.action, error = %e, "decision submission failed");
                    errors += 1;
                }
            }
        }

        (dispatched, errors)
    }
}

fn log_decision(key: &PositionKey, eval: &EvaluatedPosition, hedge_state: &VaultHedgeState) {
    let (signal_available, ratio_bps) = match &eval.signal {
        HedgeSignal::Available(details) => (true, Some(details.target_token_ratio_bps)),
        HedgeSignal::Unavailable { .. } => (false, None),
    };
    let record = DecisionRecord {
        collection: key.collection.to_string(),
        token_id: key.token_id.to_string(),
        action: &eval.decision.action,
        reason: &eval.decision.reason,
        hedge_active: hedge_state.is_active,
        signal_available,
        ratio_bps,
        deposit_active: eval.deposit.active,
    };
    match serde_json::to_string(&record) {
        Ok(json) => info!(target: "hedge_decision", "HEDGE_DECISION: {json}"),
        Err(e) => warn!(%key, error = %e, "failed to serialize decision record"),
    }
}
