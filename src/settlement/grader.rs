//! Grading promoted bets against final scores.

use rust_decimal::Decimal;
use strum::Display;

use crate::error::SettlementError;
use crate::market::{BetResult, Direction, MarketDescriptor, ScorePair, ScoreSnapshot};
use crate::store::{Grade, PromotedBet};

use super::condition::Condition;

/// Settlement of one market before reduction to a stored result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum LegOutcome {
    /// Every leg won.
    Win,
    /// One leg won, the other pushed.
    HalfWin,
    /// Stake returned.
    Push,
    /// One leg lost, the other pushed.
    HalfLoss,
    /// Every leg lost.
    Loss,
}

impl LegOutcome {
    /// Stored result. Half outcomes are not definitive and reduce to a push.
    pub fn result(&self) -> BetResult {
        match self {
            LegOutcome::Win => BetResult::Win,
            LegOutcome::Loss => BetResult::Loss,
            LegOutcome::HalfWin | LegOutcome::Push | LegOutcome::HalfLoss => BetResult::Push,
        }
    }
}

fn leg_sign(direction: Direction, leg: Decimal, score: ScorePair) -> i32 {
    let home = Decimal::from(score.home);
    let away = Decimal::from(score.away);
    let total = Decimal::from(score.total());
    let margin = match direction {
        Direction::HandicapTeam1 => home + leg - away,
        Direction::HandicapTeam2 => away + leg - home,
        Direction::Over => total - leg,
        Direction::Under => leg - total,
    };
    if margin.is_sign_positive() && !margin.is_zero() {
        1
    } else if margin.is_zero() {
        0
    } else {
        -1
    }
}

/// Grade one market on a score.
pub fn grade_market(
    market: &MarketDescriptor,
    score: ScorePair,
) -> Result<LegOutcome, SettlementError> {
    let condition = Condition::from_line(market.line)?;
    let sum: i32 = condition
        .legs()
        .map(|leg| leg_sign(market.direction, leg, score))
        .sum();

    let outcome = if condition.is_split() {
        match sum {
            2 => LegOutcome::Win,
            1 => LegOutcome::HalfWin,
            0 => LegOutcome::Push,
            -1 => LegOutcome::HalfLoss,
            _ => LegOutcome::Loss,
        }
    } else {
        match sum {
            1 => LegOutcome::Win,
            0 => LegOutcome::Push,
            _ => LegOutcome::Loss,
        }
    };
    Ok(outcome)
}

/// Combine the main result with a secondary leg.
///
/// Any win wins, two pushes push, anything else loses.
pub fn combine(primary: BetResult, secondary: BetResult) -> BetResult {
    match (primary, secondary) {
        (BetResult::Win, _) | (_, BetResult::Win) => BetResult::Win,
        (BetResult::Push, BetResult::Push) => BetResult::Push,
        _ => BetResult::Loss,
    }
}

/// Grade a promotion. `Ok(None)` means a needed score is not known yet.
pub fn grade_promotion(
    promotion: &PromotedBet,
    scores: &ScoreSnapshot,
) -> Result<Option<Grade>, SettlementError> {
    let market = &promotion.market;
    let Some(pair) = scores.pair(market.scope, market.half) else {
        return Ok(None);
    };
    let primary = grade_market(market, pair)?.result();

    let secondary = match &promotion.secondary {
        None => None,
        Some(second) => {
            let Some(second_pair) = scores.pair(second.scope, second.half) else {
                return Ok(None);
            };
            Some(grade_market(second, second_pair)?.result())
        }
    };

    let result = match secondary {
        Some(s) => combine(primary, s),
        None => primary,
    };

    Ok(Some(Grade {
        score: pair.to_string(),
        primary,
        secondary,
        result,
    }))
}
