//! HTTP client for the browser-automation bridge that fronts the reference site.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use crate::error::ReferenceError;
use crate::lease::Account;
use crate::metrics;

use super::driver::ReferenceDriver;
use super::types::{Horizon, ReferenceQuote, ReferenceQuoteSnapshot};

/// Session handle issued by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSession {
    /// Bridge-side session id.
    pub id: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    session_id: String,
}

#[derive(Debug, Deserialize)]
struct GamesResponse {
    #[serde(default)]
    games: Vec<ReferenceQuote>,
}

/// [`ReferenceDriver`] backed by the bridge's JSON API.
#[derive(Debug, Clone)]
pub struct BridgeDriver {
    http: reqwest::Client,
    base_url: String,
}

impl BridgeDriver {
    /// Create a driver for the bridge at `base_url`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ReferenceError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn classify(status: StatusCode, body: String) -> ReferenceError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::GONE => {
                ReferenceError::StaleSession
            }
            s if s.is_client_error() => ReferenceError::Malformed(format!("{s}: {body}")),
            s => ReferenceError::Transient(format!("{s}: {body}")),
        }
    }
}

#[async_trait]
impl ReferenceDriver for BridgeDriver {
    type Session = BridgeSession;

    #[instrument(skip(self, account), fields(account_id = account.id))]
    async fn open(&self, account: &Account) -> Result<BridgeSession, ReferenceError> {
        let resp = self
            .http
            .post(format!("{}/sessions", self.base_url))
            .json(&LoginRequest {
                username: &account.username,
                password: &account.password,
            })
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            // A refused login is worth another attempt after a reset.
            return Err(ReferenceError::Transient(format!("login {status}: {body}")));
        }

        let login: LoginResponse = resp
            .json()
            .await
            .map_err(|e| ReferenceError::Malformed(e.to_string()))?;
        debug!(session = %login.session_id, "Bridge session opened");
        Ok(BridgeSession {
            id: login.session_id,
        })
    }

    #[instrument(skip(self, session), fields(session = %session.id))]
    async fn fetch_snapshot(
        &self,
        session: &BridgeSession,
        match_ref: &str,
        horizon: Horizon,
    ) -> Result<ReferenceQuoteSnapshot, ReferenceError> {
        let _timer = metrics::timer_snapshot_fetch();
        let resp = self
            .http
            .get(format!(
                "{}/sessions/{}/matches/{}",
                self.base_url, session.id, match_ref
            ))
            .query(&[("showtype", horizon.to_string())])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            // Not listed (yet or any more).
            return Ok(ReferenceQuoteSnapshot {
                match_ref: match_ref.to_string(),
                fetched_at: OffsetDateTime::now_utc(),
                quotes: Vec::new(),
            });
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::classify(status, body));
        }

        let games: GamesResponse = resp
            .json()
            .await
            .map_err(|e| ReferenceError::Malformed(e.to_string()))?;
        Ok(ReferenceQuoteSnapshot {
            match_ref: match_ref.to_string(),
            fetched_at: OffsetDateTime::now_utc(),
            quotes: games.games,
        })
    }

    async fn close(&self, session: BridgeSession) {
        let result = self
            .http
            .delete(format!("{}/sessions/{}", self.base_url, session.id))
            .send()
            .await;
        if let Err(e) = result {
            warn!(session = %session.id, error = %e, "Failed to close bridge session");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn account() -> Account {
        Account {
            id: 7,
            username: "alice".into(),
            password: "pw".into(),
        }
    }

    async fn driver(server: &MockServer) -> BridgeDriver {
        BridgeDriver::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn login_and_fetch_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s1"})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/sessions/s1/matches/123"))
            .and(query_param("showtype", "early"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "games": [{"ptype_id": "0", "team_h": "Home", "sw_R": "Y", "ratio": "0.5"}]
            })))
            .mount(&server)
            .await;

        let d = driver(&server).await;
        let session = d.open(&account()).await.unwrap();
        assert_eq!(session.id, "s1");

        let snap = d
            .fetch_snapshot(&session, "123", Horizon::FarTerm)
            .await
            .unwrap();
        assert_eq!(snap.quotes.len(), 1);
        assert_eq!(snap.quotes[0].get("ratio"), Some("0.5"));
        assert_eq!(snap.primary().unwrap().meta().home, "Home");
    }

    #[tokio::test]
    async fn expired_session_is_reported_stale() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sessions/old/matches/9"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let d = driver(&server).await;
        let err = d
            .fetch_snapshot(&BridgeSession { id: "old".into() }, "9", Horizon::NearTerm)
            .await
            .unwrap_err();
        assert!(matches!(err, ReferenceError::StaleSession));
    }

    #[tokio::test]
    async fn server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let d = driver(&server).await;
        let err = d
            .fetch_snapshot(&BridgeSession { id: "s".into() }, "9", Horizon::NearTerm)
            .await
            .unwrap_err();
        assert!(matches!(err, ReferenceError::Transient(_)));
    }

    #[tokio::test]
    async fn unlisted_match_yields_empty_snapshot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let d = driver(&server).await;
        let snap = d
            .fetch_snapshot(&BridgeSession { id: "s".into() }, "9", Horizon::NearTerm)
            .await
            .unwrap();
        assert!(snap.quotes.is_empty());
    }
}
