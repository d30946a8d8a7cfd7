//! End-to-end pipeline scenarios against in-memory stores and a scripted
//! reference driver. No network access is needed.

use std::sync::Arc;
use std::time::Duration;

use handicap_scout::feed::{FeedClient, FeedQuery};
use handicap_scout::lease::{Account, AccountLeasePool, MemoryLeaseStore};
use handicap_scout::market::{
    BetResult, BetStatus, Direction, Half, MarketDescriptor, MatchStatus, Opportunity, Scope,
    ScorePair, ScoreSnapshot, Side,
};
use handicap_scout::matching::{QuoteMatcher, StageThreshold};
use handicap_scout::pipeline::{
    self, FeedIntake, FinalSettings, FinalStage, ReadyStage, SharedStats,
};
use handicap_scout::reference::mock::{QuoteBuilder, ScriptedDriver};
use handicap_scout::reference::{ReferenceQuote, SessionManager};
use handicap_scout::schedule::RateLimiter;
use handicap_scout::settlement::{
    Fixture, FixtureState, ScoreReport, SettlementEngine, StaticScoreProvider,
};
use handicap_scout::store::{BetStore, MemoryStore};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::macros::datetime;
use time::OffsetDateTime;
use tokio::sync::{watch, Mutex};

const KICKOFF: OffsetDateTime = datetime!(2024-05-01 12:00 UTC);

struct World {
    driver: Arc<ScriptedDriver>,
    store: MemoryStore,
    ready: Arc<ReadyStage<ScriptedDriver>>,
    final_stage: Arc<FinalStage<ScriptedDriver>>,
}

fn world() -> World {
    let driver = Arc::new(ScriptedDriver::new());
    let leases = Arc::new(MemoryLeaseStore::new([Account {
        id: 1,
        username: "scout".into(),
        password: "pw".into(),
    }]));
    let pool = AccountLeasePool::new(leases, "it-worker", Duration::from_secs(300));
    let session = Arc::new(Mutex::new(SessionManager::new(
        driver.clone(),
        pool,
        Duration::from_secs(900),
        3,
    )));
    let matcher = QuoteMatcher::new(
        StageThreshold::at_least(Decimal::ZERO),
        StageThreshold::at_least(dec!(0.1)),
    );
    let store = MemoryStore::new();
    let ready = Arc::new(ReadyStage::new(
        session.clone(),
        matcher,
        Arc::new(store.clone()),
        8,
    ));
    let final_stage = Arc::new(FinalStage::new(
        session,
        matcher,
        Arc::new(store.clone()),
        FinalSettings::default(),
    ));
    World {
        driver,
        store,
        ready,
        final_stage,
    }
}

/// Full-goal handicap, team 1 giving half a goal, team 1 priced from `raw`.
fn quote(raw: &str) -> ReferenceQuote {
    QuoteBuilder::goal()
        .teams("Premier League", "Home FC", "Away United")
        .full_handicap("0.5", Side::Home, raw, "0.75")
        .build()
}

fn opportunity(kickoff: OffsetDateTime) -> Opportunity {
    Opportunity {
        match_ref: "123".into(),
        kickoff,
        market: MarketDescriptor::new(Scope::Goal, Half::Full, Direction::HandicapTeam1, dec!(-0.5)),
        odds: dec!(2.05),
    }
}

#[tokio::test]
async fn opportunity_is_readied_promoted_and_graded() {
    let w = world();

    // Ready: 2.10 against 2.05 clears a zero margin.
    w.driver.set_quotes("123", vec![quote("1.095")]);
    let batch = pipeline::group_batches(
        vec![opportunity(KICKOFF)],
        KICKOFF - time::Duration::hours(3),
        Duration::from_secs(180),
    )
    .remove(0);
    assert!(!batch.direct_final);
    let ready = w
        .ready
        .process_batch(&batch, KICKOFF - time::Duration::hours(3))
        .await
        .unwrap();
    assert_eq!(ready.ready, 1);

    let bet = w.store.all_bets().await.remove(0);
    assert_eq!(bet.status, BetStatus::Ready);
    assert_eq!(bet.reference_odds, Some(dec!(2.10)));

    // Final: 2.20 against 2.05 clears the 0.1 margin.
    w.driver.set_quotes("123", vec![quote("1.17")]);
    let summary = w
        .final_stage
        .run_once(KICKOFF - time::Duration::seconds(90))
        .await
        .unwrap();
    assert_eq!(summary.promoted, 1);
    assert_eq!(summary.surfaced, 1);

    let m = w.store.find_match("123").await.unwrap().unwrap();
    assert_eq!(m.status, MatchStatus::Final);
    assert_eq!(m.fixture.home, "Home FC");

    // Settlement: 2:1, team 1 at -0.5 wins.
    let provider = Arc::new(StaticScoreProvider::new());
    provider.add_fixture(Fixture {
        id: "fx-1".into(),
        kickoff: KICKOFF + time::Duration::minutes(5),
        home: "Home F.C".into(),
        away: "Away United".into(),
    });
    provider.set_report(
        "fx-1",
        ScoreReport {
            state: FixtureState::Finished,
            score: ScoreSnapshot {
                goals: Some(ScorePair::new(2, 1)),
                goals_first_half: Some(ScorePair::new(1, 1)),
                ..Default::default()
            },
        },
    );
    let engine = SettlementEngine::new(
        Arc::new(w.store.clone()),
        provider,
        Arc::new(RateLimiter::new("score", Duration::from_millis(1))),
        Duration::from_secs(1800),
    );
    let settled = engine
        .run_once(KICKOFF + time::Duration::hours(2))
        .await
        .unwrap();
    assert_eq!(settled.graded, 1);

    let promotion = w.store.all_promotions().await.remove(0);
    let grade = promotion.grade.unwrap();
    assert_eq!(grade.score, "2:1");
    assert_eq!(grade.result, BetResult::Win);
    assert_eq!(grade.result.code(), 1);
}

#[tokio::test]
async fn late_batch_goes_straight_through_the_final_stage() {
    let w = world();
    w.driver.set_quotes("123", vec![quote("1.17")]);

    let store: Arc<dyn BetStore> = Arc::new(w.store.clone());
    let (sender, receiver) = pipeline::channel(8);
    let client = FeedClient::new(
        "http://127.0.0.1:9/request",
        "token",
        FeedQuery {
            sources: "188bet|bet365".into(),
            limit: 100,
            min_profit: dec!(-0.25),
            max_profit: dec!(10),
        },
        Arc::new(RateLimiter::new("feed", Duration::from_millis(1))),
        Duration::from_secs(1),
    )
    .unwrap();
    let intake = FeedIntake::new(client, "188bet", store, sender, Duration::from_secs(180));

    let stats = SharedStats::default();
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer = tokio::spawn(pipeline::ready_consumer(
        w.ready.clone(),
        w.final_stage.clone(),
        receiver,
        stats.clone(),
        shutdown_rx,
    ));

    let now = OffsetDateTime::now_utc();
    let routed = intake
        .route(vec![opportunity(now + time::Duration::seconds(60))], now)
        .await
        .unwrap();
    assert_eq!(routed.batches, 1);

    // Dropping the only sender ends the consumer once the batch is done.
    drop(intake);
    tokio::time::timeout(Duration::from_secs(10), consumer)
        .await
        .unwrap()
        .unwrap();

    let promotions = w.store.all_promotions().await;
    assert_eq!(promotions.len(), 1);
    assert!(promotions[0].valid);
    assert_eq!(
        w.store.find_match("123").await.unwrap().unwrap().status,
        MatchStatus::Final
    );

    let s = stats.read().await.clone();
    assert_eq!(s.bets_ready, 1);
    assert_eq!(s.bets_promoted, 1);
}
