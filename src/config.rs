//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::lease::Account;
use crate::matching::{Comparison, FallbackPolicy, StageThreshold};
use crate::pipeline::{FinalSettings, ReversePolicy, SamplingRate};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Opportunity Feed ===
    /// Feed endpoint.
    #[serde(default = "default_feed_url")]
    pub feed_url: String,

    /// Bearer token for the feed.
    pub feed_token: String,

    /// Bookmaker whose prong is taken from each record.
    #[serde(default = "default_feed_bookmaker")]
    pub feed_bookmaker: String,

    /// `source` query parameter (pipe-separated bookmakers).
    #[serde(default = "default_feed_sources")]
    pub feed_sources: String,

    /// Records per page.
    #[serde(default = "default_feed_page_limit")]
    pub feed_page_limit: u32,

    /// Minimum milliseconds between page requests.
    #[serde(default = "default_feed_page_interval_ms")]
    pub feed_page_interval_ms: u64,

    /// Lower profit bound sent to the feed.
    #[serde(default = "default_feed_min_profit")]
    pub feed_min_profit: Decimal,

    /// Upper profit bound sent to the feed.
    #[serde(default = "default_feed_max_profit")]
    pub feed_max_profit: Decimal,

    // === External Bridges ===
    /// Browser-automation bridge in front of the reference site.
    #[serde(default = "default_reference_bridge_url")]
    pub reference_bridge_url: String,

    /// Live-score bridge.
    #[serde(default = "default_score_bridge_url")]
    pub score_bridge_url: String,

    /// Timeout for outbound HTTP calls, in seconds.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    // === Accounts & Leasing ===
    /// Reference accounts as `user:password` pairs separated by commas.
    #[serde(default)]
    pub reference_accounts: String,

    /// Worker identity used for leases. Falls back to `HOSTNAME`.
    #[serde(default)]
    pub worker_id: Option<String>,

    /// Lease time-to-live in seconds.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: u64,

    /// Idle seconds after which a reference session is rebuilt.
    #[serde(default = "default_session_idle_secs")]
    pub session_idle_secs: u64,

    /// Attempts per snapshot before giving up.
    #[serde(default = "default_snapshot_attempts")]
    pub snapshot_attempts: u32,

    // === Stage Thresholds ===
    /// Ready-stage margin.
    #[serde(default)]
    pub ready_margin: Decimal,

    /// Ready-stage comparison: `gte` or `lte`.
    #[serde(default = "default_comparison")]
    pub ready_comparison: String,

    /// Ready-stage fallback: `disabled`, `first` or `all`.
    #[serde(default = "default_fallback")]
    pub ready_fallback: String,

    /// Final-stage margin.
    #[serde(default = "default_final_margin")]
    pub final_margin: Decimal,

    /// Final-stage comparison: `gte` or `lte`.
    #[serde(default = "default_comparison")]
    pub final_comparison: String,

    /// Final-stage fallback: `disabled`, `first` or `all`.
    #[serde(default = "default_fallback")]
    pub final_fallback: String,

    // === Market Flags ===
    /// Promote corner markets.
    #[serde(default = "default_true")]
    pub corner_enabled: bool,

    /// Promote first-half markets.
    #[serde(default = "default_true")]
    pub first_half_enabled: bool,

    /// Recommend the opposite side of goal markets.
    #[serde(default)]
    pub promote_reverse: bool,

    /// Recommend the opposite side of corner markets.
    #[serde(default)]
    pub corner_reverse: bool,

    /// Sampling tier: 0 = all, 1/2/3 = that many in four.
    #[serde(default)]
    pub filter_rate: u8,

    // === Loop Timing ===
    /// Ready loop interval in milliseconds.
    #[serde(default = "default_ready_interval_ms")]
    pub ready_interval_ms: u64,

    /// Final loop interval in milliseconds.
    #[serde(default = "default_final_interval_ms")]
    pub final_interval_ms: u64,

    /// Settlement loop interval in milliseconds.
    #[serde(default = "default_settlement_interval_ms")]
    pub settlement_interval_ms: u64,

    /// Minimum milliseconds between score provider calls.
    #[serde(default = "default_score_interval_ms")]
    pub score_interval_ms: u64,

    /// Seconds before kickoff the final stage looks ahead.
    #[serde(default = "default_final_window_secs")]
    pub final_window_secs: u64,

    /// Batches kicking off within this many seconds go straight to the final stage.
    #[serde(default = "default_direct_final_secs")]
    pub direct_final_secs: u64,

    /// Allowed kickoff difference when looking up a score fixture, in seconds.
    #[serde(default = "default_fixture_window_secs")]
    pub fixture_window_secs: u64,

    /// UTC offset, in hours, of the reference site's trading day.
    #[serde(default = "default_horizon_utc_offset")]
    pub horizon_utc_offset: i8,

    // === Server Configuration ===
    /// HTTP server port for health/status endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Prometheus exporter port.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_feed_url() -> String {
    "https://api.apostasseguras.com/request".to_string()
}

fn default_feed_bookmaker() -> String {
    "188bet".to_string()
}

fn default_feed_sources() -> String {
    "188bet|bet365".to_string()
}

fn default_feed_page_limit() -> u32 {
    100
}

fn default_feed_page_interval_ms() -> u64 {
    500
}

fn default_feed_min_profit() -> Decimal {
    Decimal::new(-25, 2) // -0.25
}

fn default_feed_max_profit() -> Decimal {
    Decimal::new(10, 0)
}

fn default_reference_bridge_url() -> String {
    "http://127.0.0.1:7400".to_string()
}

fn default_score_bridge_url() -> String {
    "http://127.0.0.1:7500".to_string()
}

fn default_http_timeout_secs() -> u64 {
    30
}

fn default_lease_ttl_secs() -> u64 {
    300
}

fn default_session_idle_secs() -> u64 {
    900
}

fn default_snapshot_attempts() -> u32 {
    3
}

fn default_comparison() -> String {
    "gte".to_string()
}

fn default_fallback() -> String {
    "disabled".to_string()
}

fn default_final_margin() -> Decimal {
    Decimal::new(1, 1) // 0.1
}

fn default_true() -> bool {
    true
}

fn default_ready_interval_ms() -> u64 {
    60_000
}

fn default_final_interval_ms() -> u64 {
    10_000
}

fn default_settlement_interval_ms() -> u64 {
    120_000
}

fn default_score_interval_ms() -> u64 {
    1_000
}

fn default_final_window_secs() -> u64 {
    120
}

fn default_direct_final_secs() -> u64 {
    180
}

fn default_fixture_window_secs() -> u64 {
    1_800
}

fn default_horizon_utc_offset() -> i8 {
    8
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

fn parse_comparison(raw: &str) -> Option<Comparison> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "gte" | ">=" => Some(Comparison::AtLeast),
        "lte" | "<=" => Some(Comparison::AtMost),
        _ => None,
    }
}

fn parse_fallback(raw: &str) -> Option<FallbackPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "disabled" | "off" | "" => Some(FallbackPolicy::Disabled),
        "first" => Some(FallbackPolicy::First),
        "all" => Some(FallbackPolicy::All),
        _ => None,
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.feed_token.is_empty() {
            return Err("FEED_TOKEN is required".to_string());
        }

        if url::Url::parse(&self.feed_url).is_err() {
            return Err("FEED_URL is not a valid URL".to_string());
        }

        if self.feed_page_limit == 0 {
            return Err("FEED_PAGE_LIMIT must be positive".to_string());
        }

        if self.feed_min_profit > self.feed_max_profit {
            return Err("FEED_MIN_PROFIT must not exceed FEED_MAX_PROFIT".to_string());
        }

        for (key, raw) in [
            ("READY_COMPARISON", &self.ready_comparison),
            ("FINAL_COMPARISON", &self.final_comparison),
        ] {
            if parse_comparison(raw).is_none() {
                return Err(format!("{key} must be gte or lte"));
            }
        }

        for (key, raw) in [
            ("READY_FALLBACK", &self.ready_fallback),
            ("FINAL_FALLBACK", &self.final_fallback),
        ] {
            if parse_fallback(raw).is_none() {
                return Err(format!("{key} must be disabled, first or all"));
            }
        }

        if self.filter_rate > 3 {
            return Err("FILTER_RATE must be 0, 1, 2 or 3".to_string());
        }

        if self.snapshot_attempts == 0 {
            return Err("SNAPSHOT_ATTEMPTS must be at least 1".to_string());
        }

        if self.lease_ttl_secs < 5 {
            return Err("LEASE_TTL_SECS must be at least 5".to_string());
        }

        if !(-12..=14).contains(&self.horizon_utc_offset) {
            return Err("HORIZON_UTC_OFFSET must be between -12 and 14".to_string());
        }

        self.accounts()?;

        Ok(())
    }

    /// Reference accounts, numbered from 1 in listed order.
    pub fn accounts(&self) -> Result<Vec<Account>, String> {
        self.reference_accounts
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .enumerate()
            .map(|(i, pair)| {
                let (username, password) = pair
                    .split_once(':')
                    .ok_or_else(|| format!("REFERENCE_ACCOUNTS entry {} is not user:password", i + 1))?;
                Ok(Account {
                    id: i as u64 + 1,
                    username: username.to_string(),
                    password: password.to_string(),
                })
            })
            .collect()
    }

    /// Lease owner name for this process.
    pub fn worker_identity(&self) -> String {
        self.worker_id
            .clone()
            .or_else(|| std::env::var("HOSTNAME").ok())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("worker-{}", std::process::id()))
    }

    /// Ready-stage threshold.
    pub fn ready_threshold(&self) -> StageThreshold {
        StageThreshold {
            margin: self.ready_margin,
            comparison: parse_comparison(&self.ready_comparison).unwrap_or_default(),
            fallback: parse_fallback(&self.ready_fallback).unwrap_or_default(),
        }
    }

    /// Final-stage threshold.
    pub fn final_threshold(&self) -> StageThreshold {
        StageThreshold {
            margin: self.final_margin,
            comparison: parse_comparison(&self.final_comparison).unwrap_or_default(),
            fallback: parse_fallback(&self.final_fallback).unwrap_or_default(),
        }
    }

    /// Outbound HTTP timeout.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Lease time-to-live.
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Session idle limit.
    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }

    /// Fixture lookup window.
    pub fn fixture_window(&self) -> Duration {
        Duration::from_secs(self.fixture_window_secs)
    }

    /// Feed page pacing.
    pub fn feed_page_interval(&self) -> Duration {
        Duration::from_millis(self.feed_page_interval_ms)
    }

    /// Feed and ready loop cadence.
    pub fn ready_interval(&self) -> Duration {
        Duration::from_millis(self.ready_interval_ms)
    }

    /// Final loop cadence.
    pub fn final_interval(&self) -> Duration {
        Duration::from_millis(self.final_interval_ms)
    }

    /// Settlement loop cadence.
    pub fn settlement_interval(&self) -> Duration {
        Duration::from_millis(self.settlement_interval_ms)
    }

    /// Spacing between score provider calls.
    pub fn score_interval(&self) -> Duration {
        Duration::from_millis(self.score_interval_ms)
    }

    /// Kickoff distance under which a batch goes straight to the final stage.
    pub fn direct_final_window(&self) -> Duration {
        Duration::from_secs(self.direct_final_secs)
    }

    /// Final-stage switches.
    pub fn final_settings(&self) -> FinalSettings {
        FinalSettings {
            corner_enabled: self.corner_enabled,
            first_half_enabled: self.first_half_enabled,
            reverse: ReversePolicy {
                goal: self.promote_reverse,
                corner: self.corner_reverse,
            },
            sampling: SamplingRate::from_tier(self.filter_rate),
            window: Duration::from_secs(self.final_window_secs),
        }
    }
}
