//! Score lines recorded against a match.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::{Half, Scope};

/// Home/away count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScorePair {
    /// Team 1.
    pub home: u32,
    /// Team 2.
    pub away: u32,
}

impl ScorePair {
    /// Create a pair.
    pub fn new(home: u32, away: u32) -> Self {
        Self { home, away }
    }

    /// Sum of both sides.
    pub fn total(&self) -> u32 {
        self.home + self.away
    }
}

impl fmt::Display for ScorePair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.home, self.away)
    }
}

/// Goal and corner counts, each known once the provider reports them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    /// Full-time goals.
    pub goals: Option<ScorePair>,
    /// Half-time goals.
    pub goals_first_half: Option<ScorePair>,
    /// Full-time corners.
    pub corners: Option<ScorePair>,
    /// Half-time corners.
    pub corners_first_half: Option<ScorePair>,
}

impl ScoreSnapshot {
    /// The pair a market settles on.
    pub fn pair(&self, scope: Scope, half: Half) -> Option<ScorePair> {
        match (scope, half) {
            (Scope::Goal, Half::Full) => self.goals,
            (Scope::Goal, Half::First) => self.goals_first_half,
            (Scope::Corner, Half::Full) => self.corners,
            (Scope::Corner, Half::First) => self.corners_first_half,
        }
    }

    /// Fill in anything `newer` knows that this snapshot does not.
    pub fn merge(&mut self, newer: &ScoreSnapshot) {
        self.goals = newer.goals.or(self.goals);
        self.goals_first_half = newer.goals_first_half.or(self.goals_first_half);
        self.corners = newer.corners.or(self.corners);
        self.corners_first_half = newer.corners_first_half.or(self.corners_first_half);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_selection_and_display() {
        let s = ScoreSnapshot {
            goals: Some(ScorePair::new(2, 1)),
            corners_first_half: Some(ScorePair::new(3, 0)),
            ..Default::default()
        };
        assert_eq!(s.pair(Scope::Goal, Half::Full).unwrap().to_string(), "2:1");
        assert_eq!(s.pair(Scope::Corner, Half::First).unwrap().total(), 3);
        assert_eq!(s.pair(Scope::Goal, Half::First), None);
    }

    #[test]
    fn merge_keeps_known_values() {
        let mut s = ScoreSnapshot {
            goals_first_half: Some(ScorePair::new(1, 0)),
            ..Default::default()
        };
        s.merge(&ScoreSnapshot {
            goals: Some(ScorePair::new(2, 0)),
            ..Default::default()
        });
        assert_eq!(s.goals_first_half, Some(ScorePair::new(1, 0)));
        assert_eq!(s.goals, Some(ScorePair::new(2, 0)));
    }
}
