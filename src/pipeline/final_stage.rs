//! Final stage: re-check ready bets just before kickoff and promote the survivors.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{HandicapError, ReferenceError, Result};
use crate::market::{BetStatus, Half, MarketDescriptor, MatchStatus, Opportunity, Scope};
use crate::matching::{MatchKind, QuoteMatcher, StageMode};
use crate::metrics;
use crate::reference::{Horizon, ReferenceDriver, ReferenceQuoteSnapshot, SessionManager};
use crate::store::{BetRecord, BetStore, BetUpdate, MatchRecord, NewPromotion};

use super::promotion::{dedupe, Candidate, ReversePolicy, SamplingRate};

/// Final-stage behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FinalSettings {
    /// Corner markets may be promoted.
    pub corner_enabled: bool,
    /// First-half markets may be promoted.
    pub first_half_enabled: bool,
    /// Which scopes are recommended reversed.
    pub reverse: ReversePolicy,
    /// Share of promotions surfaced.
    pub sampling: SamplingRate,
    /// How far before kickoff a match is picked up.
    pub window: Duration,
}

impl Default for FinalSettings {
    fn default() -> Self {
        Self {
            corner_enabled: true,
            first_half_enabled: true,
            reverse: ReversePolicy::default(),
            sampling: SamplingRate::All,
            window: Duration::from_secs(120),
        }
    }
}

impl FinalSettings {
    fn allows(&self, market: &MarketDescriptor) -> bool {
        (self.corner_enabled || market.scope != Scope::Corner)
            && (self.first_half_enabled || market.half != Half::First)
    }
}

/// Counters for one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalSummary {
    /// Matches finalized.
    pub matches: usize,
    /// Bets promoted.
    pub promoted: usize,
    /// Bets ignored.
    pub ignored: usize,
    /// Bets left ready because nothing comparable was listed.
    pub unchanged: usize,
    /// Promotions stored.
    pub promotions: usize,
    /// Promotions surfaced after sampling.
    pub surfaced: usize,
}

impl FinalSummary {
    fn absorb(&mut self, other: FinalSummary) {
        self.matches += other.matches;
        self.promoted += other.promoted;
        self.ignored += other.ignored;
        self.unchanged += other.unchanged;
        self.promotions += other.promotions;
        self.surfaced += other.surfaced;
    }
}

/// Final-stage processor.
pub struct FinalStage<D: ReferenceDriver> {
    session: Arc<Mutex<SessionManager<D>>>,
    matcher: QuoteMatcher,
    store: Arc<dyn BetStore>,
    settings: FinalSettings,
}

impl<D: ReferenceDriver> FinalStage<D> {
    /// Create a final stage.
    pub fn new(
        session: Arc<Mutex<SessionManager<D>>>,
        matcher: QuoteMatcher,
        store: Arc<dyn BetStore>,
        settings: FinalSettings,
    ) -> Self {
        Self {
            session,
            matcher,
            store,
            settings,
        }
    }

    /// Process every match kicking off within the window after `now`.
    ///
    /// A failed match is logged and retried next pass. A missing account
    /// ends the pass early.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: OffsetDateTime) -> Result<FinalSummary> {
        let window = time::Duration::try_from(self.settings.window).unwrap_or(time::Duration::ZERO);
        let matches = self.store.matches_near_kickoff(now, now + window).await?;
        let mut summary = FinalSummary::default();

        for m in &matches {
            match self.process_match(m).await {
                Ok(s) => summary.absorb(s),
                Err(e @ HandicapError::Reference(ReferenceError::Lease(_))) => return Err(e),
                Err(e) => warn!(match_ref = %m.match_ref, error = %e, "Final stage failed for match"),
            }
        }
        Ok(summary)
    }

    /// Process one match by reference id, if it is not final yet.
    pub async fn process_match_ref(&self, match_ref: &str) -> Result<FinalSummary> {
        match self.store.find_match(match_ref).await? {
            Some(m) if m.status != MatchStatus::Final => self.process_match(&m).await,
            _ => Ok(FinalSummary::default()),
        }
    }

    async fn snapshot(&self, match_ref: &str) -> Result<ReferenceQuoteSnapshot> {
        Ok(self
            .session
            .lock()
            .await
            .fetch_snapshot(match_ref, Horizon::NearTerm)
            .await?)
    }

    /// Compare every ready bet of `m`, store promotions, then mark `m` final.
    #[instrument(skip(self, m), fields(match_ref = %m.match_ref))]
    pub async fn process_match(&self, m: &MatchRecord) -> Result<FinalSummary> {
        let bets = self
            .store
            .bets_for_match(m.id, Some(BetStatus::Ready))
            .await?;
        if bets.is_empty() {
            return Ok(FinalSummary::default());
        }

        let mut summary = FinalSummary {
            matches: 1,
            ..Default::default()
        };
        let mut snapshot: Option<ReferenceQuoteSnapshot> = None;
        let mut candidates: Vec<Candidate> = Vec::new();

        for bet in &bets {
            if !self.settings.allows(&bet.market) {
                self.set_status(bet, BetStatus::Ignored, None).await?;
                summary.ignored += 1;
                continue;
            }

            if snapshot.is_none() {
                snapshot = Some(self.snapshot(&m.match_ref).await?);
            }
            let Some(snap) = snapshot.as_ref() else {
                continue;
            };

            let opp = Opportunity {
                match_ref: m.match_ref.clone(),
                kickoff: m.kickoff,
                market: bet.market,
                odds: bet.aggregator_odds,
            };
            let Some(found) = self.matcher.match_quote(&opp, snap, StageMode::Final) else {
                debug!(bet_id = bet.id, "No comparable quote at final stage");
                summary.unchanged += 1;
                continue;
            };

            if !found.passes {
                self.set_status(bet, BetStatus::Ignored, Some(found.quote.odds))
                    .await?;
                summary.ignored += 1;
                continue;
            }

            self.set_status(bet, BetStatus::Promoted, Some(found.quote.odds))
                .await?;
            summary.promoted += 1;
            info!(
                bet_id = bet.id,
                edge = %found.edge,
                special = found.kind == MatchKind::Special,
                "Bet promoted"
            );

            // A favorable line move only gates the pass; the promotion keeps the bet's own line.
            let (market, reversed) = self.settings.reverse.recommend(bet.market);
            candidates.push(Candidate {
                bet_id: bet.id,
                market,
                reversed,
                special: found.kind == MatchKind::Special,
            });
        }

        for c in dedupe(candidates) {
            let promotion = self
                .store
                .insert_promotion(NewPromotion {
                    bet_id: c.bet_id,
                    match_id: m.id,
                    market: c.market,
                    reversed: c.reversed,
                    special: c.special,
                    secondary: None,
                })
                .await?;
            let valid = self.settings.sampling.is_valid(promotion.sequence);
            self.store.set_promotion_valid(promotion.id, valid).await?;
            metrics::inc_promotions_created(valid);
            summary.promotions += 1;
            if valid {
                summary.surfaced += 1;
            }
        }

        self.store.mark_match_final(m.id).await?;
        info!(
            promoted = summary.promoted,
            ignored = summary.ignored,
            promotions = summary.promotions,
            "Match finalized"
        );
        Ok(summary)
    }

    async fn set_status(
        &self,
        bet: &BetRecord,
        status: BetStatus,
        final_odds: Option<rust_decimal::Decimal>,
    ) -> Result<()> {
        self.store
            .update_bet(
                bet.id,
                BetUpdate {
                    final_reference_odds: final_odds,
                    status: Some(status),
                    ..Default::default()
                },
            )
            .await?;
        metrics::inc_bet_transition(status);
        Ok(())
    }
}
