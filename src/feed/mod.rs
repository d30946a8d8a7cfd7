//! Opportunity feed: the aggregator client and the record filter.

pub mod client;
pub mod filter;
pub mod types;

pub use client::{FeedClient, FeedQuery};
pub use filter::{opportunities, prong_to_opportunity};
pub use types::{OddType, OddsRecord, OddsResp, Prong};
