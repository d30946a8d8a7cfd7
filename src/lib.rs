//! Asian-handicap mispricing scout.
//!
//! Watches an odds aggregator for lines quoted by a soft bookmaker, checks each
//! one against a reference bookmaker's live quotes, and promotes the ones that
//! still hold just before kickoff. Promoted bets are graded once the score
//! provider has the result.
//!
//! # Pipeline
//!
//! ```text
//! feed ──batches──▶ ready stage ──(near kickoff)──▶ final stage ──▶ settlement
//!  │                    │                              │
//!  RateLimiter          SessionManager ◀── AccountLeasePool
//! ```
//!
//! A bet record only moves forward: `'' -> ready -> {promoted, ignored}`.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`schedule`]: Rate limiters and bounded retries
//! - [`odds`]: Reference-site line and odds conversion
//! - [`market`]: Markets, opportunities and status enums
//! - [`reference`]: Reference snapshots, drivers and the leased session
//! - [`matching`]: Quote matching with per-stage thresholds
//! - [`lease`]: Scraping-account leases
//! - [`store`]: Match, bet and promotion repository
//! - [`feed`]: Aggregator client and record filter
//! - [`pipeline`]: Ready and final stages and their loops
//! - [`settlement`]: Score lookup and grading
//! - [`api`]: HTTP API for health/status
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod lease;
pub mod market;
pub mod matching;
pub mod metrics;
pub mod odds;
pub mod pipeline;
pub mod reference;
pub mod schedule;
pub mod settlement;
pub mod store;
pub mod utils;

pub use config::Config;
pub use error::{HandicapError, Result};
