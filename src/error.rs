//! Unified error types for the handicap scout.

use thiserror::Error;

/// Unified error type for the handicap scout.
#[derive(Error, Debug)]
pub enum HandicapError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Odds conversion error.
    #[error("odds error: {0}")]
    Odds(#[from] OddsError),

    /// Opportunity feed error.
    #[error("feed error: {0}")]
    Feed(#[from] FeedError),

    /// Reference bookmaker error.
    #[error("reference error: {0}")]
    Reference(#[from] ReferenceError),

    /// Account lease error.
    #[error("lease error: {0}")]
    Lease(#[from] LeaseError),

    /// Repository error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Settlement/grading error.
    #[error("settlement error: {0}")]
    Settlement(#[from] SettlementError),

    /// Stage handoff channel has no receiver.
    #[error("handoff channel closed")]
    ChannelClosed,

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while converting the reference site's native quote format.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OddsError {
    /// Line string could not be parsed.
    #[error("invalid line: {0:?}")]
    InvalidLine(String),

    /// Raw odds value could not be parsed.
    #[error("invalid raw odds: {0:?}")]
    InvalidOdds(String),
}

/// Opportunity feed errors.
#[derive(Error, Debug)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Feed answered with a non-success status.
    #[error("feed returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (truncated).
        body: String,
    },

    /// Feed URL could not be built.
    #[error("invalid feed url: {0}")]
    Url(#[from] url::ParseError),
}

/// Reference quote source errors.
#[derive(Error, Debug)]
pub enum ReferenceError {
    /// Site unreachable or returned garbage; worth retrying.
    #[error("transient reference failure: {0}")]
    Transient(String),

    /// Session expired on the site side; rebuild and carry on.
    #[error("reference session is stale")]
    StaleSession,

    /// Snapshot could not be decoded.
    #[error("malformed snapshot: {0}")]
    Malformed(String),

    /// HTTP request to the bridge failed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Could not obtain a scraping account.
    #[error(transparent)]
    Lease(#[from] LeaseError),

    /// All attempts failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// Last error message.
        last: String,
    },
}

/// Account lease errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LeaseError {
    /// Every enabled account is held by another live worker.
    #[error("no account available")]
    NoAccountAvailable,

    /// Lease storage backend failed.
    #[error("lease store failure: {0}")]
    Store(String),
}

/// Repository errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Row not found.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Entity kind.
        entity: &'static str,
        /// Row identifier.
        id: u64,
    },

    /// Backend failure.
    #[error("store backend failure: {0}")]
    Backend(String),
}

/// Settlement errors. These are fatal for one record only.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// Condition string is not a valid line.
    #[error("invalid condition: {0:?}")]
    InvalidCondition(String),

    /// Score provider returned an unusable payload.
    #[error("score provider failure: {0}")]
    Provider(String),
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, HandicapError>;
