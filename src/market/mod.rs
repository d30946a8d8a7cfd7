//! Market domain types shared by every stage.

pub mod score;
pub mod types;

pub use score::{ScorePair, ScoreSnapshot};
pub use types::{
    BetResult, BetStatus, Direction, Half, MarketDescriptor, MarketKey, MarketKind, MatchStatus,
    Opportunity, Scope, Side,
};
