//! Paginated client for the aggregator's surebet listing.

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing::{debug, instrument};
use url::Url;

use crate::config::Config;
use crate::error::FeedError;
use crate::metrics;
use crate::schedule::RateLimiter;
use crate::utils::truncate;

use super::types::{OddsRecord, OddsResp};

/// Listing filters sent with every page request.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedQuery {
    /// Pipe-separated bookmakers.
    pub sources: String,
    /// Records per page.
    pub limit: u32,
    /// Lower profit bound.
    pub min_profit: Decimal,
    /// Upper profit bound.
    pub max_profit: Decimal,
}

impl FeedQuery {
    fn params(&self, cursor: Option<&str>) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("product", "surebets".to_string()),
            ("source", self.sources.clone()),
            ("sport", "Football".to_string()),
            ("limit", self.limit.to_string()),
            ("oddsFormat", "eu".to_string()),
            ("outcomes", "2".to_string()),
            ("min-profit", self.min_profit.to_string()),
            ("max-profit", self.max_profit.to_string()),
            ("hide-different-rules", "True".to_string()),
            ("startOf", "PT3M".to_string()),
            ("endOf", "PT16H".to_string()),
        ];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor.to_string()));
        }
        params
    }
}

/// Surebet listing client. Page requests share one [`RateLimiter`].
#[derive(Debug, Clone)]
pub struct FeedClient {
    http: reqwest::Client,
    url: Url,
    token: String,
    query: FeedQuery,
    limiter: Arc<RateLimiter>,
}

impl FeedClient {
    /// Create a client from explicit parts.
    pub fn new(
        url: &str,
        token: impl Into<String>,
        query: FeedQuery,
        limiter: Arc<RateLimiter>,
        timeout: Duration,
    ) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: Url::parse(url)?,
            token: token.into(),
            query,
            limiter,
        })
    }

    /// Create a client from config.
    pub fn from_config(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self, FeedError> {
        Self::new(
            &config.feed_url,
            config.feed_token.clone(),
            FeedQuery {
                sources: config.feed_sources.clone(),
                limit: config.feed_page_limit,
                min_profit: config.feed_min_profit,
                max_profit: config.feed_max_profit,
            },
            limiter,
            config.http_timeout(),
        )
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<OddsResp, FeedError> {
        let _timer = metrics::timer_feed_page();
        let resp = self
            .http
            .get(self.url.clone())
            .bearer_auth(&self.token)
            .query(&self.query.params(cursor))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200).to_string(),
            });
        }
        Ok(resp.json().await?)
    }

    /// Every record, following the cursor while the feed has more pages.
    #[instrument(skip(self))]
    pub async fn fetch_all(&self) -> Result<Vec<OddsRecord>, FeedError> {
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = self
                .limiter
                .schedule(|| self.fetch_page(cursor.as_deref()))
                .await?;
            let Some(batch) = page.records else {
                break;
            };
            let next = batch.last().map(OddsRecord::cursor);
            records.extend(batch);

            match next {
                Some(c) if page.can_forward => cursor = Some(c),
                _ => break,
            }
        }

        debug!(count = records.len(), "Feed records fetched");
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn rec(id: &str) -> Value {
        json!({"sort_by": 10, "id": id, "prongs": []})
    }

    async fn client(server: &MockServer) -> FeedClient {
        FeedClient::new(
            &format!("{}/request", server.uri()),
            "secret",
            FeedQuery {
                sources: "188bet|bet365".into(),
                limit: 2,
                min_profit: dec!(-0.25),
                max_profit: dec!(10),
            },
            Arc::new(RateLimiter::new("feed", Duration::from_millis(1))),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn follows_cursor_until_exhausted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("authorization", "Bearer secret"))
            .and(query_param("product", "surebets"))
            .and(query_param("min-profit", "-0.25"))
            .and(query_param_is_missing("cursor"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "can_forward": true, "records": [rec("a"), rec("b")]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("cursor", "10:b"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "can_forward": false, "records": [rec("c")]
            })))
            .mount(&server)
            .await;

        let records = client(&server).await.fetch_all().await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn missing_records_ends_pagination() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"can_forward": true})))
            .expect(1)
            .mount(&server)
            .await;

        let records = client(&server).await.fetch_all().await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let err = client(&server).await.fetch_all().await.unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 429, .. }));
    }
}
