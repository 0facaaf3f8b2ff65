//! Hedge Keeper - Main Entry Point
//!
//! Periodically reconciles the hedge state of every LP position NFT held by
//! the configured vault. Runs against a live chain endpoint when
//! `KEEPER_LIVE=true`, otherwise against a seeded in-memory vault so the
//! full pipeline can be exercised without an endpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use hedge_keeper::chain::mock::{HedgeStatusSeed, MockChain, PositionSeed, SignalSeed};
use hedge_keeper::chain::ChainContextProvider;
use hedge_keeper::config::Config;
use hedge_keeper::keeper::types::{CycleOutcome, CycleReport, HedgeAction};
use hedge_keeper::keeper::{Keeper, LogOnlySink};
use alloy::primitives::{address, U256};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// Hedge Keeper CLI
#[derive(Parser)]
#[command(name = "hedge-keeper")]
#[command(version, about = "Delta-neutral hedge keeper for LP position NFT vaults")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single reconciliation cycle and exit
    Once,
}

/// Keeper mode: Live (real chain endpoint) or Mock (seeded in-memory vault).
#[derive(Debug, Clone, Copy, PartialEq)]
enum KeeperMode {
    Live,
    Mock,
}

/// Either chain backend; acquisition is scoped to one cycle for Live.
enum ChainBackend {
    Live(ChainContextProvider),
    Mock(MockChain),
}

/// Application state for logging and monitoring.
#[derive(Debug)]
struct AppMetrics {
    start_time: DateTime<Utc>,
    cycles_run: u64,
    cycles_failed: u64,
    opens_recommended: u64,
    closes_recommended: u64,
    dispatch_errors: u64,
}

impl Default for AppMetrics {
    fn default() -> Self {
        Self {
            start_time: Utc::now(),
            cycles_run: 0,
            cycles_failed: 0,
            opens_recommended: 0,
            closes_recommended: 0,
            dispatch_errors: 0,
        }
    }
}

impl AppMetrics {
    fn record(&mut self, report: &CycleReport) {
        self.cycles_run += 1;
        self.dispatch_errors += report.dispatch_errors as u64;
        for (_, eval) in report.actionable() {
            match eval.decision.action {
                HedgeAction::Open => self.opens_recommended += 1,
                HedgeAction::Close => self.closes_recommended += 1,
                HedgeAction::Hold => {}
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging()?;

    info!("╔════════════════════════════════════════════════════════════╗");
    info!(
        "║            Hedge Keeper v{}                             ║",
        env!("CARGO_PKG_VERSION")
    );
    info!("╚════════════════════════════════════════════════════════════╝");

    // Determine keeper mode from environment
    let mode = if std::env::var("KEEPER_LIVE").unwrap_or_default() == "true" {
        warn!("⚠️  LIVE MODE - reading real chain state");
        KeeperMode::Live
    } else {
        info!("📝 MOCK MODE - running against a seeded in-memory vault");
        KeeperMode::Mock
    };

    // Load configuration
    let config = Config::load()?;
    config.validate()?;
    log_config(&config);

    let backend = match mode {
        KeeperMode::Live => ChainBackend::Live(ChainContextProvider::new(&config.chain)?),
        KeeperMode::Mock => ChainBackend::Mock(demo_chain()),
    };

    let addresses = match &backend {
        ChainBackend::Live(provider) => provider.addresses(),
        ChainBackend::Mock(chain) => chain.addresses(),
    };

    let keeper = Keeper::new(addresses, &config.keeper, Arc::new(LogOnlySink));

    if matches!(cli.command, Some(Commands::Once)) {
        let report = run_one_cycle(&keeper, &backend).await?;
        log_report(&report);
        return Ok(());
    }

    // Shutdown signal
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        shutdown_clone.store(true, Ordering::SeqCst);
    });

    info!("🚀 Starting keeper loop...");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let mut metrics = AppMetrics::default();
    let mut last_status_log = Utc::now();

    while !shutdown.load(Ordering::SeqCst) {
        info!("📡 [CYCLE] Starting reconciliation cycle #{}", metrics.cycles_run + 1);

        match run_one_cycle(&keeper, &backend).await {
            Ok(report) => {
                metrics.record(&report);
                log_report(&report);
            }
            Err(e) => {
                // No internal retry; the next scheduled cycle starts fresh.
                error!("❌ [CYCLE] Failed: {e}");
                metrics.cycles_failed += 1;
            }
        }

        if (Utc::now() - last_status_log).num_minutes() >= 5 {
            log_status(&metrics);
            last_status_log = Utc::now();
        }

        tokio::time::sleep(Duration::from_secs(config.keeper.poll_interval_secs)).await;
    }

    log_status(&metrics);
    info!("👋 Keeper stopped");
    Ok(())
}

/// Run one cycle, scoping the chain context acquisition to the cycle.
async fn run_one_cycle(keeper: &Keeper, backend: &ChainBackend) -> Result<CycleReport> {
    let report = match backend {
        ChainBackend::Live(provider) => {
            let ctx = provider.acquire();
            let report = keeper.run_cycle(&ctx).await?;
            drop(ctx);
            report
        }
        ChainBackend::Mock(chain) => keeper.run_cycle(chain).await?,
    };
    Ok(report)
}

fn log_report(report: &CycleReport) {
    match &report.outcome {
        CycleOutcome::NoPositions => {
            info!("💤 [CYCLE] Vault holds no positions");
        }
        CycleOutcome::HedgeStateUnavailable(reason) => {
            warn!("⚠️  [CYCLE] Skipped reconciliation: {reason}");
        }
        CycleOutcome::Completed => {
            for (key, eval) in report.actionable() {
                info!(
                    "⚖️  [DECISION] {} — {} | reason: {}",
                    eval.decision.action, key, eval.decision.reason
                );
            }
            info!(
                "✅ [CYCLE] {} positions evaluated, {} dispatched, {} dispatch errors",
                report.evaluated.len(),
                report.dispatched,
                report.dispatch_errors
            );
        }
    }
}

fn log_status(metrics: &AppMetrics) {
    let uptime_mins = (Utc::now() - metrics.start_time).num_minutes();
    info!("📊 [STATUS] Uptime: {uptime_mins}m");
    info!(
        "   Cycles: {} ok, {} failed | Opens: {} | Closes: {} | Dispatch errors: {}",
        metrics.cycles_run,
        metrics.cycles_failed,
        metrics.opens_recommended,
        metrics.closes_recommended,
        metrics.dispatch_errors
    );
}

fn log_config(config: &Config) {
    info!("📋 Configuration:");
    info!("   RPC URL: {}", config.chain.rpc_url);
    info!("   Vault: {}", config.chain.vault_address);
    info!("   Hedge manager: {}", config.chain.hedge_manager_address);
    info!("   Poll interval: {}s", config.keeper.poll_interval_secs);
    info!("   Whitelist page size: {}", config.keeper.whitelist_page_size);
    info!("   Batch chunk size: {}", config.keeper.batch_chunk_size);
    info!(
        "   Missing-signal policy: {:?}",
        config.keeper.missing_signal_policy
    );
}

/// Seeded vault for mock mode: two collections, one position that wants a
/// hedge, one that does not, and one whose signal read fails.
fn demo_chain() -> MockChain {
    let coll_a = address!("00000000000000000000000000000000000000c1");
    let coll_b = address!("00000000000000000000000000000000000000c2");
    let owner = address!("00000000000000000000000000000000000000ee");

    let mut chain = MockChain::new();
    chain.add_collection(coll_a, &[5, 9]);
    chain.add_collection(coll_b, &[3]);

    chain.seed_position(coll_a, 5, PositionSeed::default());
    chain.seed_position(coll_a, 9, PositionSeed::default());
    chain.seed_position(coll_b, 3, PositionSeed::default());

    chain.seed_signal(coll_a, 5, SignalSeed::demand(9_400));
    chain.seed_signal(coll_b, 3, SignalSeed::no_demand(5_100));
    chain.fail_signal_call(coll_a, 9);

    chain.seed_deposit(coll_a, 5, owner, true);
    chain.seed_deposit(coll_a, 9, owner, true);
    chain.seed_deposit(coll_b, 3, owner, false);

    chain.set_hedge_status(HedgeStatusSeed {
        is_active: false,
        hedge_size: 0,
        entry_price: 0,
        current_price: 0,
        stable_deposit: U256::ZERO,
    });

    chain
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    // File appender for detailed logs
    let file_appender = tracing_appender::rolling::hourly("logs", "hedge-keeper.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(_guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("hedge_keeper=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stdout.and(file_writer))
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(true)
        .init();

    Ok(())
}
