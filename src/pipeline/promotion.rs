//! Turning final-stage passes into promotions: reversal, dedupe and sampling.

use serde::Serialize;

use crate::market::{MarketDescriptor, Scope};

/// How many promotions in each run of four are surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum SamplingRate {
    /// Every promotion.
    #[default]
    All,
    /// One in four.
    OneInFour,
    /// Two in four.
    TwoInFour,
    /// Three in four.
    ThreeInFour,
}

impl SamplingRate {
    /// Map the configured tier. Unknown tiers surface everything.
    pub fn from_tier(tier: u8) -> Self {
        match tier {
            1 => SamplingRate::OneInFour,
            2 => SamplingRate::TwoInFour,
            3 => SamplingRate::ThreeInFour,
            _ => SamplingRate::All,
        }
    }

    /// Whether the promotion with running count `sequence` is surfaced.
    pub fn is_valid(&self, sequence: u64) -> bool {
        match self {
            SamplingRate::All => true,
            SamplingRate::OneInFour => sequence % 4 == 0,
            SamplingRate::TwoInFour => sequence % 2 == 0,
            SamplingRate::ThreeInFour => sequence % 4 != 3,
        }
    }
}

/// Which scopes are recommended on the opposite side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReversePolicy {
    /// Reverse goal markets.
    pub goal: bool,
    /// Reverse corner markets.
    pub corner: bool,
}

impl ReversePolicy {
    /// Whether markets of `scope` are reversed.
    pub fn applies_to(&self, scope: Scope) -> bool {
        match scope {
            Scope::Goal => self.goal,
            Scope::Corner => self.corner,
        }
    }

    /// Market to recommend for `market`, and whether it was reversed.
    pub fn recommend(&self, market: MarketDescriptor) -> (MarketDescriptor, bool) {
        if self.applies_to(market.scope) {
            (market.reversed(), true)
        } else {
            (market, false)
        }
    }
}

/// A promotion before it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Source bet record.
    pub bet_id: u64,
    /// Recommended market.
    pub market: MarketDescriptor,
    /// Opposite of the offered bet.
    pub reversed: bool,
    /// Came from a favorable line move.
    pub special: bool,
}

/// Keep one candidate per market key, the one with the line easiest to win.
///
/// Order of first appearance is kept.
pub fn dedupe(candidates: impl IntoIterator<Item = Candidate>) -> Vec<Candidate> {
    let mut kept: Vec<Candidate> = Vec::new();
    for c in candidates {
        match kept.iter_mut().find(|k| k.market.key() == c.market.key()) {
            Some(existing) => {
                if existing.market.is_improved_by(c.market.line) {
                    *existing = c;
                }
            }
            None => kept.push(c),
        }
    }
    kept
}
