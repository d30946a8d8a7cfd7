//! Prometheus metrics for the pipeline.
//!
//! This module provides metrics for:
//! - Reference snapshot and score fetch latency
//! - Feed page latency
//! - Stage outcomes (ready, promoted, ignored, graded)
//! - Lease and session health

use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use tracing::debug;

use crate::market::BetStatus;

// === Metric Name Constants ===

/// Reference snapshot fetch latency metric name.
pub const METRIC_SNAPSHOT_FETCH_LATENCY: &str = "snapshot_fetch_latency_ms";
/// Score provider fetch latency metric name.
pub const METRIC_SCORE_FETCH_LATENCY: &str = "score_fetch_latency_ms";
/// Feed page fetch latency metric name.
pub const METRIC_FEED_PAGE_LATENCY: &str = "feed_page_latency_ms";
/// Stage pass latency metric name.
pub const METRIC_STAGE_PASS_LATENCY: &str = "stage_pass_latency_ms";
/// Opportunities received counter metric name.
pub const METRIC_OPPORTUNITIES_RECEIVED: &str = "opportunities_received_total";
/// Bet status transitions counter metric name.
pub const METRIC_BET_TRANSITIONS: &str = "bet_transitions_total";
/// Promotions created counter metric name.
pub const METRIC_PROMOTIONS_CREATED: &str = "promotions_created_total";
/// Bets graded counter metric name.
pub const METRIC_BETS_GRADED: &str = "bets_graded_total";
/// Snapshot failures counter metric name.
pub const METRIC_SNAPSHOT_FAILURES: &str = "snapshot_failures_total";
/// Leases acquired counter metric name.
pub const METRIC_LEASES_ACQUIRED: &str = "leases_acquired_total";
/// Loop iteration errors counter metric name.
pub const METRIC_LOOP_ERRORS: &str = "loop_errors_total";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_SNAPSHOT_FETCH_LATENCY,
        "Reference snapshot fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_SCORE_FETCH_LATENCY,
        "Score provider fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_FEED_PAGE_LATENCY,
        "Opportunity feed page latency in milliseconds"
    );
    describe_histogram!(
        METRIC_STAGE_PASS_LATENCY,
        "Duration of one stage pass in milliseconds"
    );

    // Counters
    describe_counter!(
        METRIC_OPPORTUNITIES_RECEIVED,
        "Total number of opportunities received from the feed"
    );
    describe_counter!(
        METRIC_BET_TRANSITIONS,
        "Total number of bet status transitions, by target status"
    );
    describe_counter!(
        METRIC_PROMOTIONS_CREATED,
        "Total number of promotions created, by sampling outcome"
    );
    describe_counter!(METRIC_BETS_GRADED, "Total number of graded promotions, by result");
    describe_counter!(
        METRIC_SNAPSHOT_FAILURES,
        "Total number of snapshot fetches that exhausted their retries"
    );
    describe_counter!(
        METRIC_LEASES_ACQUIRED,
        "Total number of account leases acquired or re-affirmed"
    );
    describe_counter!(
        METRIC_LOOP_ERRORS,
        "Total number of loop iterations that ended in an error"
    );

    debug!("Metrics initialized");
}

/// Record the duration of a stage pass.
pub fn record_stage_latency(start: Instant, stage: &str) {
    let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
    histogram!(METRIC_STAGE_PASS_LATENCY, "stage" => stage.to_string()).record(latency_ms);
}

/// Add to the opportunities received counter.
pub fn inc_opportunities_received(count: usize) {
    counter!(METRIC_OPPORTUNITIES_RECEIVED).increment(count as u64);
}

/// Increment the transition counter for `status`.
pub fn inc_bet_transition(status: BetStatus) {
    let label = match status {
        BetStatus::Pending => "pending",
        BetStatus::Ready => "ready",
        BetStatus::Promoted => "promoted",
        BetStatus::Ignored => "ignored",
    };
    counter!(METRIC_BET_TRANSITIONS, "status" => label).increment(1);
}

/// Increment promotions created counter.
pub fn inc_promotions_created(valid: bool) {
    let label = if valid { "valid" } else { "sampled_out" };
    counter!(METRIC_PROMOTIONS_CREATED, "sampling" => label).increment(1);
}

/// Increment graded counter for a result code.
pub fn inc_bets_graded(result: i8) {
    counter!(METRIC_BETS_GRADED, "result" => result.to_string()).increment(1);
}

/// Increment snapshot failures counter.
pub fn inc_snapshot_failures() {
    counter!(METRIC_SNAPSHOT_FAILURES).increment(1);
}

/// Increment leases acquired counter.
pub fn inc_leases_acquired() {
    counter!(METRIC_LEASES_ACQUIRED).increment(1);
}

/// Increment loop errors counter.
pub fn inc_loop_errors(stage: &'static str) {
    counter!(METRIC_LOOP_ERRORS, "stage" => stage).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        let latency_ms = self.start.elapsed().as_secs_f64() * 1000.0;
        histogram!(self.metric_name).record(latency_ms);
    }
}

/// Create a latency timer for reference snapshot fetches.
pub fn timer_snapshot_fetch() -> LatencyTimer {
    LatencyTimer::new(METRIC_SNAPSHOT_FETCH_LATENCY)
}

/// Create a latency timer for score fetches.
pub fn timer_score_fetch() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCORE_FETCH_LATENCY)
}

/// Create a latency timer for feed pages.
pub fn timer_feed_page() -> LatencyTimer {
    LatencyTimer::new(METRIC_FEED_PAGE_LATENCY)
}
