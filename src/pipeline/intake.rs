//! Feed stage: pull the aggregator listing and hand per-match batches to the ready stage.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::{debug, info, instrument};

use crate::error::Result;
use crate::feed::{opportunities, FeedClient};
use crate::market::{MatchStatus, Opportunity};
use crate::metrics;
use crate::store::BetStore;

use super::handoff::{group_batches, BatchSender};

/// Counters for one feed pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeSummary {
    /// Opportunities parsed from the listing.
    pub opportunities: usize,
    /// Batches sent to the ready stage.
    pub batches: usize,
    /// Batches dropped because their match is final.
    pub skipped: usize,
}

/// Feed stage.
pub struct FeedIntake {
    client: FeedClient,
    bookmaker: String,
    store: Arc<dyn BetStore>,
    sender: BatchSender,
    direct_final_window: Duration,
}

impl FeedIntake {
    /// Create a feed stage sending to `sender`.
    pub fn new(
        client: FeedClient,
        bookmaker: impl Into<String>,
        store: Arc<dyn BetStore>,
        sender: BatchSender,
        direct_final_window: Duration,
    ) -> Self {
        Self {
            client,
            bookmaker: bookmaker.into(),
            store,
            sender,
            direct_final_window,
        }
    }

    /// Fetch every listing page and route the result.
    #[instrument(skip(self))]
    pub async fn run_once(&self, now: OffsetDateTime) -> Result<IntakeSummary> {
        let records = self.client.fetch_all().await?;
        let opps = opportunities(&records, &self.bookmaker);
        debug!(records = records.len(), opportunities = opps.len(), "Listing parsed");
        self.route(opps, now).await
    }

    /// Group `opps` by match and send every batch whose match is not final.
    pub async fn route(&self, opps: Vec<Opportunity>, now: OffsetDateTime) -> Result<IntakeSummary> {
        let mut summary = IntakeSummary {
            opportunities: opps.len(),
            ..Default::default()
        };
        metrics::inc_opportunities_received(opps.len());

        for batch in group_batches(opps, now, self.direct_final_window) {
            let finished = self
                .store
                .find_match(&batch.match_ref)
                .await?
                .is_some_and(|m| m.status == MatchStatus::Final);
            if finished {
                summary.skipped += 1;
                continue;
            }
            self.sender.send(&batch).await?;
            summary.batches += 1;
        }

        if summary.batches > 0 {
            info!(
                opportunities = summary.opportunities,
                batches = summary.batches,
                skipped = summary.skipped,
                "Opportunities handed to ready stage"
            );
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::FeedQuery;
    use crate::market::{Direction, Half, MarketDescriptor, Scope};
    use crate::pipeline::handoff::channel;
    use crate::reference::FixtureMeta;
    use crate::schedule::RateLimiter;
    use crate::store::{MemoryStore, NewMatch};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use time::macros::datetime;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NOW: OffsetDateTime = datetime!(2024-05-01 10:00 UTC);

    fn opp(match_ref: &str, minutes: i64) -> Opportunity {
        Opportunity {
            match_ref: match_ref.into(),
            kickoff: NOW + time::Duration::minutes(minutes),
            market: MarketDescriptor::new(Scope::Goal, Half::Full, Direction::Over, dec!(2.5)),
            odds: dec!(1.9),
        }
    }

    fn intake(url: &str, store: &MemoryStore, sender: BatchSender) -> FeedIntake {
        let client = FeedClient::new(
            url,
            "secret",
            FeedQuery {
                sources: "188bet|bet365".into(),
                limit: 100,
                min_profit: dec!(-0.25),
                max_profit: dec!(10),
            },
            Arc::new(RateLimiter::new("feed", Duration::from_millis(1))),
            Duration::from_secs(5),
        )
        .unwrap();
        FeedIntake::new(
            client,
            "188bet",
            Arc::new(store.clone()),
            sender,
            Duration::from_secs(180),
        )
    }

    #[tokio::test]
    async fn final_matches_are_not_forwarded() {
        let store = MemoryStore::new();
        let done = store
            .upsert_match(NewMatch {
                match_ref: "done".into(),
                kickoff: NOW,
                fixture: FixtureMeta::default(),
            })
            .await
            .unwrap();
        store.mark_match_final(done.id).await.unwrap();

        let (tx, mut rx) = channel(8);
        let stage = intake("http://127.0.0.1:9/request", &store, tx);
        let summary = stage
            .route(vec![opp("done", 1), opp("live", 2), opp("later", 600)], NOW)
            .await
            .unwrap();

        assert_eq!(summary.batches, 2);
        assert_eq!(summary.skipped, 1);
        let first = rx.recv().await.unwrap();
        assert_eq!(first.match_ref, "live");
        assert!(first.direct_final);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.match_ref, "later");
        assert!(!second.direct_final);
    }

    #[tokio::test]
    async fn fetches_and_filters_listing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "can_forward": false,
                "records": [{
                    "sort_by": 3.1, "id": "r1",
                    "prongs": [{
                        "value": 2.05, "bk": "188bet", "time": 1714564800000_i64,
                        "type": {"game": "regular", "base": "overall", "variety": "goal",
                                 "period": "regularTime", "type": "ah1", "condition": "-0.5"},
                        "preferred_nav": {"markers": {"eventId": "123"}}
                    }]
                }]
            })))
            .mount(&server)
            .await;

        let store = MemoryStore::new();
        let (tx, mut rx) = channel(8);
        let stage = intake(&format!("{}/request", server.uri()), &store, tx);
        let summary = stage.run_once(NOW).await.unwrap();

        assert_eq!(summary.opportunities, 1);
        let batch = rx.recv().await.unwrap();
        assert_eq!(batch.match_ref, "123");
        assert_eq!(batch.opportunities[0].odds, dec!(2.05));
    }

    #[tokio::test]
    async fn closed_channel_is_an_error() {
        let store = MemoryStore::new();
        let (tx, rx) = channel(1);
        drop(rx);
        let stage = intake("http://127.0.0.1:9/request", &store, tx);
        let err = tokio_test::assert_err!(stage.route(vec![opp("a", 30)], NOW).await);
        assert!(matches!(err, crate::error::HandicapError::ChannelClosed));
    }
}
