//! Post-match grading loop body.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};

use crate::error::Result;
use crate::metrics;
use crate::schedule::RateLimiter;
use crate::store::{BetStore, MatchRecord};

use super::grader::grade_promotion;
use super::provider::ScoreProvider;

/// How far back a final match is still worth grading.
pub const GRADE_LOOKBACK: time::Duration = time::Duration::hours(24);
/// Minimum time after kickoff before the first score lookup.
pub const GRADE_DELAY: time::Duration = time::Duration::seconds(450);

/// Counters for one settlement pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettlementSummary {
    /// Matches looked at.
    pub matches: usize,
    /// Promotions graded this pass.
    pub graded: usize,
    /// Promotions left ungraded because of a bad condition.
    pub rejected: usize,
}

/// Grades promotions of final matches once the score provider has the scores.
pub struct SettlementEngine {
    store: Arc<dyn BetStore>,
    provider: Arc<dyn ScoreProvider>,
    limiter: Arc<RateLimiter>,
    fixture_window: Duration,
}

impl SettlementEngine {
    /// Create an engine. Every provider call goes through `limiter`.
    pub fn new(
        store: Arc<dyn BetStore>,
        provider: Arc<dyn ScoreProvider>,
        limiter: Arc<RateLimiter>,
        fixture_window: Duration,
    ) -> Self {
        Self {
            store,
            provider,
            limiter,
            fixture_window,
        }
    }

    /// Grade everything that can be graded as of `now`.
    ///
    /// A failure on one match is logged and the pass moves on.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: OffsetDateTime) -> Result<SettlementSummary> {
        let matches = self
            .store
            .matches_awaiting_grade(now - GRADE_LOOKBACK, now - GRADE_DELAY)
            .await?;
        let mut summary = SettlementSummary {
            matches: matches.len(),
            ..Default::default()
        };

        for m in &matches {
            match self.settle_match(m).await {
                Ok((graded, rejected)) => {
                    summary.graded += graded;
                    summary.rejected += rejected;
                }
                Err(e) => {
                    warn!(match_ref = %m.match_ref, error = %e, "Settlement failed for match");
                }
            }
        }

        if summary.graded > 0 {
            info!(
                matches = summary.matches,
                graded = summary.graded,
                "Settlement pass complete"
            );
        }
        Ok(summary)
    }

    async fn fixture_id(&self, m: &MatchRecord) -> Result<Option<String>> {
        if let Some(id) = &m.score_fixture_id {
            return Ok(Some(id.clone()));
        }
        let found = self
            .limiter
            .schedule(|| {
                self.provider.find_fixture(
                    &m.fixture.home,
                    &m.fixture.away,
                    m.kickoff,
                    self.fixture_window,
                )
            })
            .await?;
        if let Some(id) = &found {
            debug!(match_ref = %m.match_ref, fixture = %id, "Score fixture found");
            self.store.set_score_fixture(m.id, id).await?;
        }
        Ok(found)
    }

    #[instrument(skip(self, m), fields(match_ref = %m.match_ref))]
    async fn settle_match(&self, m: &MatchRecord) -> Result<(usize, usize)> {
        let Some(fixture_id) = self.fixture_id(m).await? else {
            debug!(home = %m.fixture.home, away = %m.fixture.away, "No score fixture yet");
            return Ok((0, 0));
        };

        let report = {
            let _timer = metrics::timer_score_fetch();
            self.limiter
                .schedule(|| self.provider.fetch_score(&fixture_id))
                .await?
        };
        let mut scores = m.score;
        scores.merge(&report.settled());
        if scores != m.score {
            self.store.record_score(m.id, &scores).await?;
        }

        let mut graded = 0;
        let mut rejected = 0;
        for promotion in self.store.promotions_for_match(m.id).await? {
            if !promotion.awaits_grade() {
                continue;
            }
            match grade_promotion(&promotion, &scores) {
                Ok(Some(grade)) => {
                    let result = grade.result;
                    if self.store.record_grade(promotion.id, grade).await? {
                        metrics::inc_bets_graded(result.code());
                        debug!(
                            promotion_id = promotion.id,
                            result = result.code(),
                            "Promotion graded"
                        );
                        graded += 1;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        promotion_id = promotion.id,
                        error = %e,
                        "Promotion left ungraded"
                    );
                    self.store.mark_grade_rejected(promotion.id).await?;
                    rejected += 1;
                }
            }
        }
        Ok((graded, rejected))
    }
}
