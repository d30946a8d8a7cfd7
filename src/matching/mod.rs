//! Quote matching against reference snapshots.

pub mod fields;
pub mod matcher;

pub use fields::{fields_for, resolve, MarketFields, ResolvedQuote};
pub use matcher::{
    Comparison, FallbackPolicy, MatchKind, QuoteMatch, QuoteMatcher, StageMode, StageThreshold,
};
