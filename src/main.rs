//! Handicap scout entry point.

use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use handicap_scout::api::{create_router, AppState};
use handicap_scout::config::Config;
use handicap_scout::feed::FeedClient;
use handicap_scout::lease::{AccountLeasePool, MemoryLeaseStore};
use handicap_scout::market::{Direction, Half, MarketDescriptor, Scope, ScorePair};
use handicap_scout::matching::QuoteMatcher;
use handicap_scout::metrics;
use handicap_scout::odds::{normalize_line, normalize_odds};
use handicap_scout::pipeline::{
    self, FeedIntake, FinalStage, ReadyStage, SharedStats,
};
use handicap_scout::reference::{BridgeDriver, SessionManager};
use handicap_scout::schedule::LimiterRegistry;
use handicap_scout::settlement::{grade_market, ScoreBridge, SettlementEngine};
use handicap_scout::store::MemoryStore;
use handicap_scout::utils::shutdown_signal;

/// Asian-handicap mispricing scout.
#[derive(Parser, Debug)]
#[command(name = "handicap-scout")]
#[command(about = "Finds soft-bookmaker handicap lines that beat the reference market")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the feed, ready, final and settlement loops (default).
    Run {
        /// HTTP server port for health/status (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Convert a raw reference odds pair to decimal odds.
    Convert {
        /// Raw team-1 (or under) value.
        home: String,
        /// Raw team-2 (or over) value.
        away: String,
    },

    /// Grade a single goal market on a full-time score.
    Grade {
        /// Line, e.g. `-0.5` or `0.5/1`.
        #[arg(allow_hyphen_values = true)]
        line: String,
        /// One of ah1, ah2, over, under.
        direction: String,
        /// Score as `home:away`.
        score: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("handicap_scout=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::Convert { home, away }) => cmd_convert(&home, &away),
        Some(Command::Grade {
            line,
            direction,
            score,
        }) => cmd_grade(&line, &direction, &score),
        Some(Command::Run { port }) => cmd_run(port).await,
        None => cmd_run(None).await,
    }
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("HANDICAP SCOUT - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    let accounts = config.accounts().map_err(|e| anyhow::anyhow!(e))?;
    let ready = config.ready_threshold();
    let final_t = config.final_threshold();
    let settings = config.final_settings();

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Feed: {} (bookmaker {})", config.feed_url, config.feed_bookmaker);
    println!("  Sources: {}", config.feed_sources);
    println!("  Reference Bridge: {}", config.reference_bridge_url);
    println!("  Score Bridge: {}", config.score_bridge_url);
    println!("  Worker: {}", config.worker_identity());
    println!("  Accounts: {}", accounts.len());
    println!(
        "  Ready Threshold: {:?} {} (fallback {:?})",
        ready.comparison, ready.margin, ready.fallback
    );
    println!(
        "  Final Threshold: {:?} {} (fallback {:?})",
        final_t.comparison, final_t.margin, final_t.fallback
    );
    println!(
        "  Corners: {} / First Half: {}",
        if settings.corner_enabled { "Enabled" } else { "Disabled" },
        if settings.first_half_enabled { "Enabled" } else { "Disabled" }
    );
    println!(
        "  Reverse: goal={} corner={}",
        settings.reverse.goal, settings.reverse.corner
    );
    println!("  Sampling: {:?}", settings.sampling);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Convert a raw odds pair.
fn cmd_convert(home: &str, away: &str) -> anyhow::Result<()> {
    let (h, a) = normalize_odds(home, away)?;
    println!("{home} / {away} -> {h:.2} / {a:.2}");
    Ok(())
}

/// Grade one goal market.
fn cmd_grade(line: &str, direction: &str, score: &str) -> anyhow::Result<()> {
    let line = normalize_line(line)?;
    let direction = Direction::from_str(direction)
        .map_err(|_| anyhow::anyhow!("unknown direction {direction:?}"))?;
    let (home, away) = score
        .split_once(':')
        .context("score must be home:away")?;
    let pair = ScorePair::new(home.trim().parse()?, away.trim().parse()?);

    let market = MarketDescriptor::new(Scope::Goal, Half::Full, direction, line);
    let outcome = grade_market(&market, pair)?;
    println!(
        "{direction} {line} on {pair}: {outcome:?} (result {})",
        outcome.result().code()
    );
    Ok(())
}

/// Run every loop until Ctrl+C or SIGTERM.
async fn cmd_run(port_override: Option<u16>) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Validate configuration
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    // Initialize metrics
    let metrics_addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    metrics::init_metrics();
    info!("Prometheus metrics on {}", metrics_addr);

    let worker = config.worker_identity();
    let accounts = config.accounts().map_err(|e| anyhow::anyhow!(e))?;
    info!(worker = %worker, accounts = accounts.len(), "Configuration loaded successfully");

    // Shared components
    let limiters = LimiterRegistry::new();
    let store = Arc::new(MemoryStore::new());
    let lease_store = Arc::new(MemoryLeaseStore::new(accounts));
    let pool = AccountLeasePool::new(lease_store, worker.clone(), config.lease_ttl());
    let driver = Arc::new(BridgeDriver::new(
        &config.reference_bridge_url,
        config.http_timeout(),
    )?);
    let session = Arc::new(Mutex::new(SessionManager::new(
        driver,
        pool.clone(),
        config.session_idle(),
        config.snapshot_attempts,
    )));
    let matcher = QuoteMatcher::new(config.ready_threshold(), config.final_threshold());

    // Stages
    let (sender, receiver) = pipeline::channel(64);
    let feed_client = FeedClient::from_config(
        &config,
        limiters.get("feed-page", config.feed_page_interval()),
    )?;
    let intake = Arc::new(FeedIntake::new(
        feed_client,
        config.feed_bookmaker.clone(),
        store.clone(),
        sender,
        config.direct_final_window(),
    ));
    let ready = Arc::new(ReadyStage::new(
        session.clone(),
        matcher,
        store.clone(),
        config.horizon_utc_offset,
    ));
    let final_stage = Arc::new(FinalStage::new(
        session.clone(),
        matcher,
        store.clone(),
        config.final_settings(),
    ));
    let score_provider = Arc::new(ScoreBridge::new(
        &config.score_bridge_url,
        config.http_timeout(),
    )?);
    let settlement = Arc::new(SettlementEngine::new(
        store.clone(),
        score_provider,
        limiters.get("score", config.score_interval()),
        config.fixture_window(),
    ));

    // Create app state
    let stats = SharedStats::default();
    let app_state = AppState::with_stats(worker.as_str(), stats.clone());

    // Start HTTP server
    let port = port_override.unwrap_or(config.port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.changed().await;
            })
            .await
    });

    // Spawn loops
    let handles = vec![
        tokio::spawn(pipeline::feed_loop(
            intake,
            limiters.get("ready", config.ready_interval()),
            stats.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(pipeline::ready_consumer(
            ready,
            final_stage.clone(),
            receiver,
            stats.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(pipeline::final_loop(
            final_stage,
            limiters.get("final", config.final_interval()),
            stats.clone(),
            shutdown_rx.clone(),
        )),
        tokio::spawn(pipeline::settlement_loop(
            settlement,
            limiters.get("settlement", config.settlement_interval()),
            stats.clone(),
            shutdown_rx.clone(),
        )),
    ];

    app_state.set_ready(true);
    info!("========================================");
    info!("HANDICAP SCOUT STARTED");
    info!("========================================");

    shutdown_signal().await;
    info!("Shutdown requested, finishing current iterations...");
    app_state.set_ready(false);
    let _ = shutdown_tx.send(true);

    for handle in handles {
        if let Err(e) = handle.await {
            warn!("Loop task ended abnormally: {}", e);
        }
    }
    session.lock().await.reset().await;
    if let Err(e) = pool.release_all().await {
        warn!("Failed to release account lease: {}", e);
    }
    if let Ok(Err(e)) = server_handle.await {
        warn!("HTTP server error: {}", e);
    }

    let s = stats.read().await.clone();
    info!("========================================");
    info!("FINAL SUMMARY");
    info!("========================================");
    info!("Opportunities seen: {}", s.opportunities_seen);
    info!("Bets ready: {}", s.bets_ready);
    info!("Bets promoted: {}", s.bets_promoted);
    info!("Bets ignored: {}", s.bets_ignored);
    info!("Promotions surfaced: {}/{}", s.promotions_surfaced, s.promotions_created);
    info!("Bets graded: {}", s.bets_graded);
    info!("========================================");

    Ok(())
}
