//! Market descriptors, opportunities and the status enums that drive the pipeline.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

/// What is being counted: goals or corners.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Scope {
    /// Goal markets.
    #[default]
    Goal,
    /// Corner markets.
    Corner,
}

impl Scope {
    /// Market category id the reference site files this scope under.
    pub fn category(&self) -> u32 {
        match self {
            Scope::Goal => 0,
            Scope::Corner => 146,
        }
    }
}

/// Which part of the match a market settles on.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Half {
    /// Regular time.
    #[default]
    Full,
    /// First half only.
    First,
}

/// Handicap or over/under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum MarketKind {
    /// Asian handicap.
    Handicap,
    /// Over/under total.
    Total,
}

/// Home (team 1) or away (team 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Side {
    /// Team 1.
    Home,
    /// Team 2.
    Away,
}

/// Side of a market the bettor takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
pub enum Direction {
    /// Asian handicap on team 1.
    #[serde(rename = "ah1")]
    #[strum(serialize = "ah1")]
    HandicapTeam1,
    /// Asian handicap on team 2.
    #[serde(rename = "ah2")]
    #[strum(serialize = "ah2")]
    HandicapTeam2,
    /// Total above the line.
    #[serde(rename = "over")]
    #[strum(serialize = "over")]
    Over,
    /// Total below the line.
    #[serde(rename = "under")]
    #[strum(serialize = "under")]
    Under,
}

impl Direction {
    /// Handicap or total.
    pub fn kind(&self) -> MarketKind {
        match self {
            Direction::HandicapTeam1 | Direction::HandicapTeam2 => MarketKind::Handicap,
            Direction::Over | Direction::Under => MarketKind::Total,
        }
    }

    /// Position of this direction's price in the reference site's odds pair.
    pub fn odds_index(&self) -> usize {
        match self {
            Direction::HandicapTeam1 | Direction::Under => 0,
            Direction::HandicapTeam2 | Direction::Over => 1,
        }
    }

    /// Team backed by a handicap bet.
    pub fn backed_side(&self) -> Option<Side> {
        match self {
            Direction::HandicapTeam1 => Some(Side::Home),
            Direction::HandicapTeam2 => Some(Side::Away),
            _ => None,
        }
    }

    /// The other side of the same market.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::HandicapTeam1 => Direction::HandicapTeam2,
            Direction::HandicapTeam2 => Direction::HandicapTeam1,
            Direction::Over => Direction::Under,
            Direction::Under => Direction::Over,
        }
    }

    /// Whether a larger line is better for the bettor.
    pub fn prefers_higher_line(&self) -> bool {
        !matches!(self, Direction::Over)
    }
}

/// Market identity without the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketKey {
    /// Goals or corners.
    pub scope: Scope,
    /// Full match or first half.
    pub half: Half,
    /// Side taken.
    pub direction: Direction,
}

/// A fully specified market: scope, half, direction and signed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MarketDescriptor {
    /// Goals or corners.
    pub scope: Scope,
    /// Full match or first half.
    pub half: Half,
    /// Side taken.
    pub direction: Direction,
    /// Handicap (signed from the backed team) or total.
    pub line: Decimal,
}

impl MarketDescriptor {
    /// Create a descriptor.
    pub fn new(scope: Scope, half: Half, direction: Direction, line: Decimal) -> Self {
        Self {
            scope,
            half,
            direction,
            line,
        }
    }

    /// Identity without the line.
    pub fn key(&self) -> MarketKey {
        MarketKey {
            scope: self.scope,
            half: self.half,
            direction: self.direction,
        }
    }

    /// The opposite bet on the same market.
    ///
    /// Totals keep their line, handicaps flip sign because the line is
    /// always expressed from the backed team's side.
    pub fn reversed(&self) -> Self {
        let line = match self.direction.kind() {
            MarketKind::Handicap => -self.line,
            MarketKind::Total => self.line,
        };
        Self {
            direction: self.direction.opposite(),
            line,
            ..*self
        }
    }

    /// Whether `line` would be strictly better for the bettor than this descriptor's line.
    pub fn is_improved_by(&self, line: Decimal) -> bool {
        if self.direction.prefers_higher_line() {
            line > self.line
        } else {
            line < self.line
        }
    }
}

/// One candidate from the aggregator feed. Identity is `(match_ref, market)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    /// Reference-site match identifier.
    pub match_ref: String,
    /// Scheduled kickoff.
    #[serde(with = "time::serde::timestamp::milliseconds")]
    pub kickoff: OffsetDateTime,
    /// Market being offered.
    pub market: MarketDescriptor,
    /// Aggregator's decimal odds.
    pub odds: Decimal,
}

/// Lifecycle of a bet record. Only moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    /// Seen, not yet past the ready threshold.
    #[default]
    #[serde(rename = "")]
    Pending,
    /// Cleared the ready threshold.
    Ready,
    /// Cleared the final threshold.
    Promoted,
    /// Rejected at the final stage.
    Ignored,
}

impl BetStatus {
    fn rank(&self) -> u8 {
        match self {
            BetStatus::Pending => 0,
            BetStatus::Ready => 1,
            BetStatus::Promoted | BetStatus::Ignored => 2,
        }
    }

    /// Promoted or ignored.
    pub fn is_terminal(&self) -> bool {
        self.rank() == 2
    }

    /// Whether moving to `next` is allowed.
    pub fn can_advance_to(&self, next: BetStatus) -> bool {
        *self == next || next.rank() > self.rank()
    }

    /// Apply a transition, keeping the current status when `next` would go backwards.
    pub fn advance(self, next: BetStatus) -> BetStatus {
        if self.can_advance_to(next) {
            next
        } else {
            self
        }
    }
}

/// Whether the near-kickoff stage has processed a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    /// Final stage not run yet.
    #[default]
    #[serde(rename = "")]
    Pending,
    /// Final stage ran. Terminal.
    Final,
}

/// Discrete result of a graded bet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BetResult {
    /// Stake lost.
    Loss,
    /// Stake returned.
    Push,
    /// Bet won.
    Win,
}

impl BetResult {
    /// Stored result code: -1, 0 or 1.
    pub fn code(&self) -> i8 {
        match self {
            BetResult::Loss => -1,
            BetResult::Push => 0,
            BetResult::Win => 1,
        }
    }

    /// Reduce a summed leg score to a result.
    pub fn from_sign(value: i32) -> Self {
        match value.signum() {
            1 => BetResult::Win,
            -1 => BetResult::Loss,
            _ => BetResult::Push,
        }
    }
}
