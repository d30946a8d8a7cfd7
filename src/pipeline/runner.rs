//! Long-lived loops driving each stage on its own limiter.
//!
//! Every iteration is wrapped: a failure is logged and counted, and the loop
//! waits for its next slot. Shutdown is only observed between iterations.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::Result;
use crate::metrics;
use crate::reference::ReferenceDriver;
use crate::schedule::RateLimiter;
use crate::settlement::SettlementEngine;

use super::final_stage::FinalStage;
use super::handoff::BatchReceiver;
use super::intake::FeedIntake;
use super::ready::ReadyStage;
use super::SharedStats;

/// Run `body` once per `limiter` slot until `shutdown` flips.
pub async fn run_loop<F, Fut>(
    stage: &'static str,
    limiter: Arc<RateLimiter>,
    mut shutdown: watch::Receiver<bool>,
    mut body: F,
) where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    info!(stage, interval_ms = limiter.interval().as_millis() as u64, "Loop started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = limiter.tick() => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let start = Instant::now();
        if let Err(e) = body().await {
            warn!(stage, error = %e, "Loop iteration failed");
            metrics::inc_loop_errors(stage);
        }
        metrics::record_stage_latency(start, stage);
    }
    info!(stage, "Loop stopped");
}

/// Feed loop: list opportunities and hand them to the ready stage.
pub async fn feed_loop(
    intake: Arc<FeedIntake>,
    limiter: Arc<RateLimiter>,
    stats: SharedStats,
    shutdown: watch::Receiver<bool>,
) {
    run_loop("feed", limiter, shutdown, || {
        let intake = intake.clone();
        let stats = stats.clone();
        async move {
            let now = OffsetDateTime::now_utc();
            let summary = intake.run_once(now).await?;
            let mut s = stats.write().await;
            s.opportunities_seen += summary.opportunities as u64;
            s.last_feed_tick = Some(now);
            Ok(())
        }
    })
    .await
}

/// Ready consumer: evaluate each handed-off batch as it arrives.
///
/// Batches marked `direct_final` go through the final stage right away.
pub async fn ready_consumer<D: ReferenceDriver + 'static>(
    ready: Arc<ReadyStage<D>>,
    final_stage: Arc<FinalStage<D>>,
    mut batches: BatchReceiver,
    stats: SharedStats,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(stage = "ready", "Loop started");
    loop {
        let batch = tokio::select! {
            batch = batches.recv() => match batch {
                Some(b) => b,
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let start = Instant::now();
        let now = OffsetDateTime::now_utc();
        match ready.process_batch(&batch, now).await {
            Ok(summary) => {
                stats.write().await.bets_ready += summary.ready as u64;
            }
            Err(e) => {
                warn!(match_ref = %batch.match_ref, error = %e, "Ready batch aborted");
                metrics::inc_loop_errors("ready");
                continue;
            }
        }

        if batch.direct_final {
            match final_stage.process_match_ref(&batch.match_ref).await {
                Ok(summary) => stats.write().await.absorb_final(&summary, now),
                Err(e) => {
                    warn!(match_ref = %batch.match_ref, error = %e, "Direct final failed");
                    metrics::inc_loop_errors("final");
                }
            }
        }
        metrics::record_stage_latency(start, "ready");
    }
    info!(stage = "ready", "Loop stopped");
}

/// Final loop: promote or ignore ready bets close to kickoff.
pub async fn final_loop<D: ReferenceDriver + 'static>(
    final_stage: Arc<FinalStage<D>>,
    limiter: Arc<RateLimiter>,
    stats: SharedStats,
    shutdown: watch::Receiver<bool>,
) {
    run_loop("final", limiter, shutdown, || {
        let final_stage = final_stage.clone();
        let stats = stats.clone();
        async move {
            let now = OffsetDateTime::now_utc();
            let summary = final_stage.run_once(now).await?;
            stats.write().await.absorb_final(&summary, now);
            Ok(())
        }
    })
    .await
}

/// Settlement loop: grade promotions of finished matches.
pub async fn settlement_loop(
    engine: Arc<SettlementEngine>,
    limiter: Arc<RateLimiter>,
    stats: SharedStats,
    shutdown: watch::Receiver<bool>,
) {
    run_loop("settlement", limiter, shutdown, || {
        let engine = engine.clone();
        let stats = stats.clone();
        async move {
            let now = OffsetDateTime::now_utc();
            let summary = engine.run_once(now).await?;
            let mut s = stats.write().await;
            s.bets_graded += summary.graded as u64;
            s.last_settlement_tick = Some(now);
            Ok(())
        }
    })
    .await
}
