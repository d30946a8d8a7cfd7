//! Live-score providers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::error::SettlementError;
use crate::market::{ScorePair, ScoreSnapshot};

use super::fixture::{find_fixture, Fixture};

/// Progress of a fixture as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureState {
    /// Not kicked off.
    NotStarted,
    /// First half in play.
    FirstHalf,
    /// Half-time break.
    HalfTime,
    /// Second half in play.
    SecondHalf,
    /// Full time.
    Finished,
    /// Postponed, cancelled or abandoned.
    Abandoned,
}

impl FixtureState {
    /// Map the provider's numeric state code.
    pub fn from_code(code: i32) -> Self {
        match code {
            -1 => FixtureState::Finished,
            0 => FixtureState::NotStarted,
            1 => FixtureState::FirstHalf,
            2 => FixtureState::HalfTime,
            c if c >= 3 => FixtureState::SecondHalf,
            _ => FixtureState::Abandoned,
        }
    }

    /// First-half counts are final.
    pub fn first_half_known(&self) -> bool {
        matches!(
            self,
            FixtureState::HalfTime | FixtureState::SecondHalf | FixtureState::Finished
        )
    }

    /// Full-time counts are final.
    pub fn full_time_known(&self) -> bool {
        *self == FixtureState::Finished
    }
}

/// Latest counts for one fixture.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreReport {
    /// Match progress.
    pub state: FixtureState,
    /// Counts as reported, final or not.
    pub score: ScoreSnapshot,
}

impl ScoreReport {
    /// Only the counts that can no longer change.
    pub fn settled(&self) -> ScoreSnapshot {
        let mut out = ScoreSnapshot::default();
        if self.state.first_half_known() {
            out.goals_first_half = self.score.goals_first_half;
            out.corners_first_half = self.score.corners_first_half;
        }
        if self.state.full_time_known() {
            out.goals = self.score.goals;
            out.corners = self.score.corners;
        }
        out
    }
}

/// Source of fixtures and scores.
#[async_trait]
pub trait ScoreProvider: Send + Sync {
    /// Fixtures kicking off in `[from, to]`.
    async fn fixtures(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Fixture>, SettlementError>;

    /// Current state and counts of a fixture.
    async fn fetch_score(&self, fixture_id: &str) -> Result<ScoreReport, SettlementError>;

    /// Provider fixture id for a match, if one is close enough.
    async fn find_fixture(
        &self,
        home: &str,
        away: &str,
        kickoff: OffsetDateTime,
        window: Duration,
    ) -> Result<Option<String>, SettlementError> {
        let span = time::Duration::try_from(window).unwrap_or(time::Duration::ZERO);
        let list = self.fixtures(kickoff - span, kickoff + span).await?;
        Ok(find_fixture(&list, home, away, kickoff, window).map(|f| f.id.clone()))
    }
}

#[derive(Debug, Deserialize)]
struct FixturesResponse {
    #[serde(default)]
    fixtures: Vec<Fixture>,
}

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    state: i32,
    home: Option<u32>,
    away: Option<u32>,
    home_half: Option<u32>,
    away_half: Option<u32>,
    home_corner: Option<u32>,
    away_corner: Option<u32>,
    home_corner_half: Option<u32>,
    away_corner_half: Option<u32>,
}

fn pair(home: Option<u32>, away: Option<u32>) -> Option<ScorePair> {
    Some(ScorePair::new(home?, away?))
}

impl From<ScoreResponse> for ScoreReport {
    fn from(r: ScoreResponse) -> Self {
        ScoreReport {
            state: FixtureState::from_code(r.state),
            score: ScoreSnapshot {
                goals: pair(r.home, r.away),
                goals_first_half: pair(r.home_half, r.away_half),
                corners: pair(r.home_corner, r.away_corner),
                corners_first_half: pair(r.home_corner_half, r.away_corner_half),
            },
        }
    }
}

/// [`ScoreProvider`] over the live-score bridge's JSON API.
#[derive(Debug, Clone)]
pub struct ScoreBridge {
    http: reqwest::Client,
    base_url: String,
}

impl ScoreBridge {
    /// Create a client for the bridge at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SettlementError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SettlementError::Provider(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, String)],
    ) -> Result<T, SettlementError> {
        let resp = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| SettlementError::Provider(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SettlementError::Provider(format!("status {status}")));
        }
        resp.json()
            .await
            .map_err(|e| SettlementError::Provider(e.to_string()))
    }
}

#[async_trait]
impl ScoreProvider for ScoreBridge {
    #[instrument(skip(self))]
    async fn fixtures(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Fixture>, SettlementError> {
        let resp: FixturesResponse = self
            .get_json(
                format!("{}/fixtures", self.base_url),
                &[
                    ("from", from.unix_timestamp().to_string()),
                    ("to", to.unix_timestamp().to_string()),
                ],
            )
            .await?;
        debug!(count = resp.fixtures.len(), "Fixtures listed");
        Ok(resp.fixtures)
    }

    #[instrument(skip(self))]
    async fn fetch_score(&self, fixture_id: &str) -> Result<ScoreReport, SettlementError> {
        let resp: ScoreResponse = self
            .get_json(format!("{}/fixtures/{}", self.base_url, fixture_id), &[])
            .await?;
        Ok(resp.into())
    }
}

/// In-memory provider for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct StaticScoreProvider {
    inner: Arc<Mutex<StaticInner>>,
}

#[derive(Debug, Default)]
struct StaticInner {
    fixtures: Vec<Fixture>,
    reports: HashMap<String, ScoreReport>,
    lookups: usize,
}

impl StaticScoreProvider {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// List a fixture.
    pub fn add_fixture(&self, fixture: Fixture) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fixtures.push(fixture);
        }
    }

    /// Set the report returned for a fixture.
    pub fn set_report(&self, fixture_id: &str, report: ScoreReport) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.reports.insert(fixture_id.to_string(), report);
        }
    }

    /// Number of fixture list requests served.
    pub fn lookups(&self) -> usize {
        self.inner.lock().map(|i| i.lookups).unwrap_or(0)
    }
}

#[async_trait]
impl ScoreProvider for StaticScoreProvider {
    async fn fixtures(
        &self,
        from: OffsetDateTime,
        to: OffsetDateTime,
    ) -> Result<Vec<Fixture>, SettlementError> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| SettlementError::Provider("poisoned".into()))?;
        inner.lookups += 1;
        Ok(inner
            .fixtures
            .iter()
            .filter(|f| f.kickoff >= from && f.kickoff <= to)
            .cloned()
            .collect())
    }

    async fn fetch_score(&self, fixture_id: &str) -> Result<ScoreReport, SettlementError> {
        let inner = self
            .inner
            .lock()
            .map_err(|_| SettlementError::Provider("poisoned".into()))?;
        inner
            .reports
            .get(fixture_id)
            .cloned()
            .ok_or_else(|| SettlementError::Provider(format!("no report for {fixture_id}")))
    }
}
