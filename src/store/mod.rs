//! Repository for matches, bet records and promotions.
//!
//! Status writes go through [`BetUpdate`], which the store applies with
//! [`BetStatus::advance`], so a late write never moves a record backwards.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::error::StoreError;
use crate::market::{BetResult, BetStatus, MarketDescriptor, MatchStatus, ScoreSnapshot};
use crate::reference::FixtureMeta;

pub use memory::MemoryStore;

/// One real-world fixture.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchRecord {
    /// Row id.
    pub id: u64,
    /// Reference-site match id.
    pub match_ref: String,
    /// Scheduled kickoff.
    pub kickoff: OffsetDateTime,
    /// Teams and tournament.
    pub fixture: FixtureMeta,
    /// Whether the final stage has run.
    pub status: MatchStatus,
    /// Score provider's fixture id, once found.
    pub score_fixture_id: Option<String>,
    /// Scores recorded so far.
    pub score: ScoreSnapshot,
}

/// Data for creating or refreshing a match.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    /// Reference-site match id.
    pub match_ref: String,
    /// Scheduled kickoff.
    pub kickoff: OffsetDateTime,
    /// Teams and tournament.
    pub fixture: FixtureMeta,
}

/// Per (match, market) unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BetRecord {
    /// Row id.
    pub id: u64,
    /// Owning match.
    pub match_id: u64,
    /// Market as offered by the aggregator.
    pub market: MarketDescriptor,
    /// Aggregator's odds.
    pub aggregator_odds: Decimal,
    /// Reference odds at the ready stage.
    pub reference_odds: Option<Decimal>,
    /// Reference odds at the final stage.
    pub final_reference_odds: Option<Decimal>,
    /// Lifecycle state.
    pub status: BetStatus,
    /// Last write.
    pub updated_at: OffsetDateTime,
}

/// Data for a new bet record.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBet {
    /// Owning match.
    pub match_id: u64,
    /// Market as offered by the aggregator.
    pub market: MarketDescriptor,
    /// Aggregator's odds.
    pub aggregator_odds: Decimal,
    /// Reference odds at the ready stage.
    pub reference_odds: Option<Decimal>,
    /// Initial status.
    pub status: BetStatus,
}

/// Partial update of a bet record. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BetUpdate {
    /// New aggregator odds.
    pub aggregator_odds: Option<Decimal>,
    /// New ready-stage reference odds.
    pub reference_odds: Option<Decimal>,
    /// New final-stage reference odds.
    pub final_reference_odds: Option<Decimal>,
    /// Requested status; ignored if it would go backwards.
    pub status: Option<BetStatus>,
}

/// Settled outcome of a promotion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grade {
    /// Score the market settled on, e.g. `"2:1"`.
    pub score: String,
    /// Result of the main leg.
    pub primary: BetResult,
    /// Result of the secondary leg, if any.
    pub secondary: Option<BetResult>,
    /// Combined result.
    pub result: BetResult,
}

/// A finalized recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromotedBet {
    /// Row id.
    pub id: u64,
    /// Running count of promotions up to and including this one.
    pub sequence: u64,
    /// Source bet record.
    pub bet_id: u64,
    /// Owning match.
    pub match_id: u64,
    /// Recommended market.
    pub market: MarketDescriptor,
    /// Recommendation is the opposite of the offered bet.
    pub reversed: bool,
    /// Came from a favorable line move rather than an exact line.
    pub special: bool,
    /// Optional second leg graded alongside the main one.
    pub secondary: Option<MarketDescriptor>,
    /// Surfaced after sampling.
    pub valid: bool,
    /// Set once graded.
    pub grade: Option<Grade>,
    /// Grading was refused; left for manual inspection.
    pub grade_rejected: bool,
}

impl PromotedBet {
    /// Neither graded nor set aside.
    pub fn awaits_grade(&self) -> bool {
        self.grade.is_none() && !self.grade_rejected
    }
}

/// Data for a new promotion.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPromotion {
    /// Source bet record.
    pub bet_id: u64,
    /// Owning match.
    pub match_id: u64,
    /// Recommended market.
    pub market: MarketDescriptor,
    /// Recommendation is the opposite of the offered bet.
    pub reversed: bool,
    /// Came from a favorable line move.
    pub special: bool,
    /// Optional second leg.
    pub secondary: Option<MarketDescriptor>,
}

/// Persistence used by the pipeline stages.
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Get or create the match for `new.match_ref`, refreshing kickoff and teams.
    async fn upsert_match(&self, new: NewMatch) -> Result<MatchRecord, StoreError>;

    /// Match by reference id.
    async fn find_match(&self, match_ref: &str) -> Result<Option<MatchRecord>, StoreError>;

    /// Match by row id.
    async fn get_match(&self, id: u64) -> Result<MatchRecord, StoreError>;

    /// Bet record for `(match_ref, market)`.
    async fn find_bet(
        &self,
        match_ref: &str,
        market: &MarketDescriptor,
    ) -> Result<Option<BetRecord>, StoreError>;

    /// Create a bet record; returns the existing one if `(match, market)` is already stored.
    async fn insert_bet(&self, new: NewBet) -> Result<BetRecord, StoreError>;

    /// Apply a partial update.
    async fn update_bet(&self, id: u64, update: BetUpdate) -> Result<BetRecord, StoreError>;

    /// Bets of a match, optionally filtered by status.
    async fn bets_for_match(
        &self,
        match_id: u64,
        status: Option<BetStatus>,
    ) -> Result<Vec<BetRecord>, StoreError>;

    /// Unprocessed matches kicking off in `(after, until]` that own a ready bet, by kickoff.
    async fn matches_near_kickoff(
        &self,
        after: OffsetDateTime,
        until: OffsetDateTime,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Mark a match final. Idempotent.
    async fn mark_match_final(&self, id: u64) -> Result<(), StoreError>;

    /// Store a promotion.
    async fn insert_promotion(&self, new: NewPromotion) -> Result<PromotedBet, StoreError>;

    /// Set the sampling flag.
    async fn set_promotion_valid(&self, id: u64, valid: bool) -> Result<(), StoreError>;

    /// Promotions of a match.
    async fn promotions_for_match(&self, match_id: u64) -> Result<Vec<PromotedBet>, StoreError>;

    /// Final matches kicking off in `[from, to]` with an ungraded promotion.
    async fn matches_awaiting_grade(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<MatchRecord>, StoreError>;

    /// Remember the score provider's fixture id.
    async fn set_score_fixture(&self, match_id: u64, fixture_id: &str) -> Result<(), StoreError>;

    /// Merge newly known scores into the match.
    async fn record_score(&self, match_id: u64, score: &ScoreSnapshot) -> Result<(), StoreError>;

    /// Grade a promotion. Returns false if it was already graded.
    async fn record_grade(&self, promotion_id: u64, grade: Grade) -> Result<bool, StoreError>;

    /// Flag a promotion that cannot be graded so settlement stops picking it up.
    async fn mark_grade_rejected(&self, promotion_id: u64) -> Result<(), StoreError>;
}
