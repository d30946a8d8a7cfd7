//! Ready stage: compare each new opportunity against a fresh snapshot.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{HandicapError, ReferenceError, Result};
use crate::market::{BetStatus, MatchStatus, Opportunity};
use crate::matching::{QuoteMatcher, StageMode};
use crate::metrics;
use crate::reference::{ReferenceDriver, SessionManager};
use crate::store::{BetStore, BetUpdate, NewBet, NewMatch};
use crate::utils::horizon_for;

use super::handoff::OpportunityBatch;

/// What happened to one opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyOutcome {
    /// Already past the ready stage, or its match is final.
    Skipped,
    /// Nothing comparable listed; record untouched.
    NoMatch,
    /// Matched but below the margin.
    Pending,
    /// Cleared the ready margin.
    Ready,
}

/// Counters for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadySummary {
    /// Opportunities looked at.
    pub seen: usize,
    /// Newly or still ready.
    pub ready: usize,
    /// Matched below the margin.
    pub pending: usize,
    /// Not listed at the reference site.
    pub unmatched: usize,
    /// Skipped as already handled.
    pub skipped: usize,
    /// Failed and skipped.
    pub failed: usize,
}

/// Ready-stage processor. Shares its reference session with the final stage.
pub struct ReadyStage<D: ReferenceDriver> {
    session: Arc<Mutex<SessionManager<D>>>,
    matcher: QuoteMatcher,
    store: Arc<dyn BetStore>,
    utc_offset_hours: i8,
}

impl<D: ReferenceDriver> ReadyStage<D> {
    /// Create a ready stage.
    pub fn new(
        session: Arc<Mutex<SessionManager<D>>>,
        matcher: QuoteMatcher,
        store: Arc<dyn BetStore>,
        utc_offset_hours: i8,
    ) -> Self {
        Self {
            session,
            matcher,
            store,
            utc_offset_hours,
        }
    }

    /// Evaluate one opportunity.
    #[instrument(
        skip(self, opp),
        fields(match_ref = %opp.match_ref, direction = %opp.market.direction, line = %opp.market.line)
    )]
    pub async fn process(&self, opp: &Opportunity, now: OffsetDateTime) -> Result<ReadyOutcome> {
        let existing = self.store.find_bet(&opp.match_ref, &opp.market).await?;
        if existing.as_ref().is_some_and(|b| b.status.is_terminal()) {
            return Ok(ReadyOutcome::Skipped);
        }
        if let Some(m) = self.store.find_match(&opp.match_ref).await? {
            if m.status == MatchStatus::Final {
                return Ok(ReadyOutcome::Skipped);
            }
        }

        let horizon = horizon_for(opp.kickoff, now, self.utc_offset_hours);
        let snapshot = self
            .session
            .lock()
            .await
            .fetch_snapshot(&opp.match_ref, horizon)
            .await?;

        let Some(found) = self.matcher.match_quote(opp, &snapshot, StageMode::Ready) else {
            debug!("No comparable reference quote");
            return Ok(ReadyOutcome::NoMatch);
        };

        let status = if found.passes {
            BetStatus::Ready
        } else {
            BetStatus::Pending
        };

        let stored = match existing {
            Some(bet) => {
                self.store
                    .update_bet(
                        bet.id,
                        BetUpdate {
                            aggregator_odds: Some(opp.odds),
                            reference_odds: Some(found.quote.odds),
                            status: Some(status),
                            ..Default::default()
                        },
                    )
                    .await?
            }
            None => {
                let m = self
                    .store
                    .upsert_match(NewMatch {
                        match_ref: opp.match_ref.clone(),
                        kickoff: opp.kickoff,
                        fixture: found.fixture.clone(),
                    })
                    .await?;
                self.store
                    .insert_bet(NewBet {
                        match_id: m.id,
                        market: opp.market,
                        aggregator_odds: opp.odds,
                        reference_odds: Some(found.quote.odds),
                        status,
                    })
                    .await?
            }
        };

        if stored.status == BetStatus::Ready {
            metrics::inc_bet_transition(BetStatus::Ready);
            info!(
                reference_odds = %found.quote.odds,
                aggregator_odds = %opp.odds,
                edge = %found.edge,
                "Bet ready"
            );
            Ok(ReadyOutcome::Ready)
        } else {
            debug!(edge = %found.edge, "Below ready margin");
            Ok(ReadyOutcome::Pending)
        }
    }

    /// Evaluate a batch in order.
    ///
    /// Item failures are logged and skipped. A missing account aborts the
    /// batch so the caller can wait for its next tick.
    pub async fn process_batch(
        &self,
        batch: &OpportunityBatch,
        now: OffsetDateTime,
    ) -> Result<ReadySummary> {
        let mut summary = ReadySummary::default();
        for opp in &batch.opportunities {
            summary.seen += 1;
            match self.process(opp, now).await {
                Ok(ReadyOutcome::Ready) => summary.ready += 1,
                Ok(ReadyOutcome::Pending) => summary.pending += 1,
                Ok(ReadyOutcome::NoMatch) => summary.unmatched += 1,
                Ok(ReadyOutcome::Skipped) => summary.skipped += 1,
                Err(e @ HandicapError::Reference(ReferenceError::Lease(_))) => return Err(e),
                Err(e) => {
                    warn!(match_ref = %opp.match_ref, error = %e, "Skipping opportunity");
                    summary.failed += 1;
                }
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lease::{Account, AccountLeasePool, MemoryLeaseStore};
    use crate::market::{Direction, Half, MarketDescriptor, Scope, Side};
    use crate::matching::StageThreshold;
    use crate::reference::mock::{QuoteBuilder, ScriptedDriver, ScriptedReply};
    use crate::store::MemoryStore;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use time::macros::datetime;

    const NOW: OffsetDateTime = datetime!(2024-05-01 02:00 UTC);

    struct Fixture {
        stage: ReadyStage<ScriptedDriver>,
        driver: Arc<ScriptedDriver>,
        store: MemoryStore,
    }

    fn fixture(accounts: usize, ready_margin: Decimal) -> Fixture {
        let driver = Arc::new(ScriptedDriver::new());
        let lease_store = Arc::new(MemoryLeaseStore::new((1..=accounts as u64).map(|id| Account {
            id,
            username: format!("user{id}"),
            password: "pw".into(),
        })));
        let pool = AccountLeasePool::new(lease_store, "w1", Duration::from_secs(300));
        let session = SessionManager::new(driver.clone(), pool, Duration::from_secs(900), 3);
        let store = MemoryStore::new();
        let stage = ReadyStage::new(
            Arc::new(Mutex::new(session)),
            QuoteMatcher::new(
                StageThreshold::at_least(ready_margin),
                StageThreshold::at_least(dec!(0.1)),
            ),
            Arc::new(store.clone()),
            8,
        );
        Fixture {
            stage,
            driver,
            store,
        }
    }

    fn opportunity() -> Opportunity {
        Opportunity {
            match_ref: "123".into(),
            kickoff: NOW + time::Duration::hours(3),
            market: MarketDescriptor::new(Scope::Goal, Half::Full, Direction::HandicapTeam1, dec!(-0.5)),
            odds: dec!(2.05),
        }
    }

    fn quote_with_odds(home_raw: &str) -> crate::reference::ReferenceQuote {
        QuoteBuilder::goal()
            .teams("Premier League", "Arsenal", "Chelsea")
            .full_handicap("0.5", Side::Home, home_raw, "0.75")
            .build()
    }

    #[tokio::test]
    async fn passing_quote_makes_bet_ready() {
        let f = fixture(1, Decimal::ZERO);
        f.driver.set_quotes("123", vec![quote_with_odds("1.095")]);

        let outcome = f.stage.process(&opportunity(), NOW).await.unwrap();
        assert_eq!(outcome, ReadyOutcome::Ready);

        let bets = f.store.all_bets().await;
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].status, BetStatus::Ready);
        assert_eq!(bets[0].reference_odds, Some(dec!(2.10)));

        let m = f.store.find_match("123").await.unwrap().unwrap();
        assert_eq!(m.fixture.home, "Arsenal");
    }

    #[tokio::test]
    async fn below_margin_stays_pending_and_is_reevaluated() {
        let f = fixture(1, dec!(0.1));
        f.driver.set_quotes("123", vec![quote_with_odds("1.095")]);
        assert_eq!(
            f.stage.process(&opportunity(), NOW).await.unwrap(),
            ReadyOutcome::Pending
        );
        assert_eq!(f.store.all_bets().await[0].status, BetStatus::Pending);

        f.driver.set_quotes("123", vec![quote_with_odds("1.17")]);
        assert_eq!(
            f.stage.process(&opportunity(), NOW).await.unwrap(),
            ReadyOutcome::Ready
        );
        let bets = f.store.all_bets().await;
        assert_eq!(bets.len(), 1);
        assert_eq!(bets[0].reference_odds, Some(dec!(2.20)));
    }

    #[tokio::test]
    async fn ready_bet_never_regresses() {
        let f = fixture(1, Decimal::ZERO);
        f.driver.set_quotes("123", vec![quote_with_odds("1.095")]);
        f.stage.process(&opportunity(), NOW).await.unwrap();

        let mut worse = opportunity();
        worse.odds = dec!(2.50);
        f.stage.process(&worse, NOW).await.unwrap();

        let bets = f.store.all_bets().await;
        assert_eq!(bets[0].status, BetStatus::Ready);
        assert_eq!(bets[0].aggregator_odds, dec!(2.50));
    }

    #[tokio::test]
    async fn unlisted_market_leaves_nothing() {
        let f = fixture(1, Decimal::ZERO);
        f.driver.set_quotes("123", vec![]);
        assert_eq!(
            f.stage.process(&opportunity(), NOW).await.unwrap(),
            ReadyOutcome::NoMatch
        );
        assert!(f.store.all_bets().await.is_empty());
    }

    #[tokio::test]
    async fn terminal_bet_is_not_fetched_again() {
        let f = fixture(1, Decimal::ZERO);
        f.driver.set_quotes("123", vec![quote_with_odds("1.095")]);
        f.stage.process(&opportunity(), NOW).await.unwrap();
        let id = f.store.all_bets().await[0].id;
        f.store
            .update_bet(
                id,
                BetUpdate {
                    status: Some(BetStatus::Promoted),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let before = f.driver.requests().len();
        assert_eq!(
            f.stage.process(&opportunity(), NOW).await.unwrap(),
            ReadyOutcome::Skipped
        );
        assert_eq!(f.driver.requests().len(), before);
    }

    #[tokio::test]
    async fn batch_aborts_without_account() {
        let f = fixture(0, Decimal::ZERO);
        let batch = OpportunityBatch {
            match_ref: "123".into(),
            kickoff: opportunity().kickoff,
            direct_final: false,
            opportunities: vec![opportunity(), opportunity()],
        };
        let err = f.stage.process_batch(&batch, NOW).await.unwrap_err();
        assert!(matches!(
            err,
            HandicapError::Reference(ReferenceError::Lease(_))
        ));
    }

    #[tokio::test]
    async fn batch_skips_failed_items() {
        let f = fixture(1, Decimal::ZERO);
        for _ in 0..3 {
            f.driver.push_reply("123", ScriptedReply::Fail("down".into()));
        }
        f.driver.set_quotes("123", vec![quote_with_odds("1.095")]);
        let batch = OpportunityBatch {
            match_ref: "123".into(),
            kickoff: opportunity().kickoff,
            direct_final: false,
            opportunities: vec![opportunity(), opportunity()],
        };
        let summary = f.stage.process_batch(&batch, NOW).await.unwrap();
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.ready, 1);
    }
}
