//! Stage scheduling: feed intake, the ready and final stages, and their loops.
//!
//! A bet moves `'' -> ready -> {promoted, ignored}`. The feed loop hands
//! per-match batches to the ready consumer over a JSON channel. The final
//! loop sweeps matches about to kick off, and the settlement loop grades
//! what the final loop promoted.

pub mod final_stage;
pub mod handoff;
pub mod intake;
pub mod promotion;
pub mod ready;
pub mod runner;

use std::sync::Arc;

use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;

pub use final_stage::{FinalSettings, FinalStage, FinalSummary};
pub use handoff::{channel, group_batches, BatchReceiver, BatchSender, OpportunityBatch};
pub use intake::{FeedIntake, IntakeSummary};
pub use promotion::{dedupe, Candidate, ReversePolicy, SamplingRate};
pub use ready::{ReadyOutcome, ReadyStage, ReadySummary};
pub use runner::{feed_loop, final_loop, ready_consumer, run_loop, settlement_loop};

/// Running totals exposed on the status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PipelineStats {
    /// Opportunities parsed from the feed.
    pub opportunities_seen: u64,
    /// Ready-stage passes.
    pub bets_ready: u64,
    /// Bets promoted at the final stage.
    pub bets_promoted: u64,
    /// Bets ignored at the final stage.
    pub bets_ignored: u64,
    /// Promotions stored.
    pub promotions_created: u64,
    /// Promotions surfaced after sampling.
    pub promotions_surfaced: u64,
    /// Promotions graded.
    pub bets_graded: u64,
    /// Last completed feed pass.
    #[serde(with = "time::serde::timestamp::option")]
    pub last_feed_tick: Option<OffsetDateTime>,
    /// Last completed final pass.
    #[serde(with = "time::serde::timestamp::option")]
    pub last_final_tick: Option<OffsetDateTime>,
    /// Last completed settlement pass.
    #[serde(with = "time::serde::timestamp::option")]
    pub last_settlement_tick: Option<OffsetDateTime>,
}

impl PipelineStats {
    /// Fold a final-stage pass into the totals.
    pub fn absorb_final(&mut self, summary: &FinalSummary, at: OffsetDateTime) {
        self.bets_promoted += summary.promoted as u64;
        self.bets_ignored += summary.ignored as u64;
        self.promotions_created += summary.promotions as u64;
        self.promotions_surfaced += summary.surfaced as u64;
        self.last_final_tick = Some(at);
    }
}

/// Stats shared between the loops and the HTTP API.
pub type SharedStats = Arc<RwLock<PipelineStats>>;
