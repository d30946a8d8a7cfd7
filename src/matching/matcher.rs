//! Locate an opportunity's market in a reference snapshot and test it against a margin.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, instrument, warn};

use crate::market::Opportunity;
use crate::reference::{FixtureMeta, ReferenceQuoteSnapshot};

use super::fields::{resolve, ResolvedQuote};

/// Pipeline stage a comparison runs for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum StageMode {
    /// First sighting, well before kickoff.
    Ready,
    /// Just before kickoff.
    Final,
}

/// How the edge is compared with the margin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Comparison {
    /// `edge >= margin`.
    #[default]
    #[serde(rename = "gte", alias = ">=")]
    AtLeast,
    /// `edge <= margin`.
    #[serde(rename = "lte", alias = "<=")]
    AtMost,
}

/// What to do when no quote carries the opportunity's exact line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FallbackPolicy {
    /// No fallback: report no match.
    #[default]
    Disabled,
    /// Take the first quote whose line moved in the bettor's favor.
    First,
    /// Take every quote whose line moved in the bettor's favor.
    All,
}

/// Margin test for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageThreshold {
    /// Required improvement of reference odds over aggregator odds.
    pub margin: Decimal,
    /// Direction of the comparison.
    pub comparison: Comparison,
    /// Behaviour when there is no exact line.
    pub fallback: FallbackPolicy,
}

impl StageThreshold {
    /// `edge >= margin` with no fallback.
    pub fn at_least(margin: Decimal) -> Self {
        Self {
            margin,
            comparison: Comparison::AtLeast,
            fallback: FallbackPolicy::Disabled,
        }
    }

    /// Same threshold with a different fallback policy.
    pub fn with_fallback(self, fallback: FallbackPolicy) -> Self {
        Self { fallback, ..self }
    }

    /// Whether `edge` clears the margin.
    pub fn passes(&self, edge: Decimal) -> bool {
        match self.comparison {
            Comparison::AtLeast => edge >= self.margin,
            Comparison::AtMost => edge <= self.margin,
        }
    }
}

/// Exact line or a line that moved in the bettor's favor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Same line as the opportunity.
    Exact,
    /// Better line than the opportunity; exempt from the margin.
    Special,
}

/// Result of a successful lookup. `passes` tells apart "below margin" from a usable match.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteMatch {
    /// Exact or special.
    pub kind: MatchKind,
    /// Matched quote.
    pub quote: ResolvedQuote,
    /// Further favorable quotes, only under [`FallbackPolicy::All`].
    pub alternatives: Vec<ResolvedQuote>,
    /// Reference odds minus aggregator odds.
    pub edge: Decimal,
    /// Whether the stage threshold is met.
    pub passes: bool,
    /// Teams and tournament from the primary market row.
    pub fixture: FixtureMeta,
}

impl QuoteMatch {
    /// Matched quote followed by any alternatives.
    pub fn candidates(&self) -> impl Iterator<Item = &ResolvedQuote> {
        std::iter::once(&self.quote).chain(self.alternatives.iter())
    }
}

/// Per-stage thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteMatcher {
    /// Ready-stage threshold.
    pub ready: StageThreshold,
    /// Final-stage threshold.
    pub final_stage: StageThreshold,
}

impl QuoteMatcher {
    /// Create a matcher.
    pub fn new(ready: StageThreshold, final_stage: StageThreshold) -> Self {
        Self { ready, final_stage }
    }

    /// Threshold applied in `mode`.
    pub fn threshold(&self, mode: StageMode) -> &StageThreshold {
        match mode {
            StageMode::Ready => &self.ready,
            StageMode::Final => &self.final_stage,
        }
    }

    /// Find `opp`'s market in `snapshot`. `None` means nothing comparable is listed.
    #[instrument(
        skip(self, opp, snapshot),
        fields(match_ref = %opp.match_ref, direction = %opp.market.direction, line = %opp.market.line)
    )]
    pub fn match_quote(
        &self,
        opp: &Opportunity,
        snapshot: &ReferenceQuoteSnapshot,
        mode: StageMode,
    ) -> Option<QuoteMatch> {
        let threshold = self.threshold(mode);
        let market = &opp.market;

        let candidates: Vec<ResolvedQuote> = snapshot
            .in_category(market.scope.category())
            .filter_map(|q| match resolve(q, market.half, market.direction) {
                Ok(resolved) => resolved,
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable reference quote");
                    None
                }
            })
            .collect();

        let fixture = snapshot.primary().map(|q| q.meta()).unwrap_or_default();

        if let Some(exact) = candidates.iter().find(|c| c.line == market.line) {
            let edge = exact.odds - opp.odds;
            let passes = threshold.passes(edge);
            debug!(%edge, passes, "Exact line found");
            return Some(QuoteMatch {
                kind: MatchKind::Exact,
                quote: *exact,
                alternatives: Vec::new(),
                edge,
                passes,
                fixture,
            });
        }

        if threshold.fallback == FallbackPolicy::Disabled {
            return None;
        }

        let mut favorable = candidates
            .into_iter()
            .filter(|c| market.is_improved_by(c.line));
        let first = favorable.next()?;
        let alternatives = match threshold.fallback {
            FallbackPolicy::All => favorable.collect(),
            _ => Vec::new(),
        };
        let edge = first.odds - opp.odds;
        debug!(line = %first.line, %edge, extra = alternatives.len(), "Line moved in bettor's favor");
        Some(QuoteMatch {
            kind: MatchKind::Special,
            quote: first,
            alternatives,
            edge,
            passes: true,
            fixture,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{Direction, Half, MarketDescriptor, Scope, Side};
    use crate::reference::mock::QuoteBuilder;
    use crate::reference::ReferenceQuote;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    fn opp(direction: Direction, line: Decimal, odds: Decimal) -> Opportunity {
        Opportunity {
            match_ref: "123".into(),
            kickoff: OffsetDateTime::UNIX_EPOCH,
            market: MarketDescriptor::new(Scope::Goal, Half::Full, direction, line),
            odds,
        }
    }

    fn snapshot(quotes: Vec<ReferenceQuote>) -> ReferenceQuoteSnapshot {
        ReferenceQuoteSnapshot {
            match_ref: "123".into(),
            fetched_at: OffsetDateTime::UNIX_EPOCH,
            quotes,
        }
    }

    fn matcher(fallback: FallbackPolicy) -> QuoteMatcher {
        QuoteMatcher::new(
            StageThreshold::at_least(Decimal::ZERO),
            StageThreshold::at_least(dec!(0.1)).with_fallback(fallback),
        )
    }

    fn handicap(line: &str) -> ReferenceQuote {
        QuoteBuilder::goal()
            .teams("Liga", "Home", "Away")
            .full_handicap(line, Side::Home, "1.095", "0.75")
            .build()
    }

    #[test]
    fn exact_line_passes_ready_margin() {
        let m = matcher(FallbackPolicy::Disabled);
        let r = m
            .match_quote(
                &opp(Direction::HandicapTeam1, dec!(-0.5), dec!(2.05)),
                &snapshot(vec![handicap("0.5")]),
                StageMode::Ready,
            )
            .unwrap();
        assert_eq!(r.kind, MatchKind::Exact);
        assert_eq!(r.edge, dec!(0.05));
        assert!(r.passes);
        assert_eq!(r.fixture.home, "Home");
    }

    #[test]
    fn below_margin_is_still_a_match() {
        let m = matcher(FallbackPolicy::Disabled);
        let r = m
            .match_quote(
                &opp(Direction::HandicapTeam1, dec!(-0.5), dec!(2.05)),
                &snapshot(vec![handicap("0.5")]),
                StageMode::Final,
            )
            .unwrap();
        assert!(!r.passes);
    }

    #[test]
    fn at_most_comparison() {
        let t = StageThreshold {
            margin: dec!(0.02),
            comparison: Comparison::AtMost,
            fallback: FallbackPolicy::Disabled,
        };
        assert!(t.passes(dec!(0.01)));
        assert!(!t.passes(dec!(0.05)));
    }

    #[test]
    fn no_exact_line_without_fallback_is_none() {
        let m = matcher(FallbackPolicy::Disabled);
        let r = m.match_quote(
            &opp(Direction::HandicapTeam2, dec!(0.25), dec!(1.7)),
            &snapshot(vec![handicap("0.5")]),
            StageMode::Final,
        );
        assert!(r.is_none());
    }

    #[test]
    fn fallback_takes_favorable_line_and_skips_margin() {
        let m = matcher(FallbackPolicy::First);
        // Away backed at +0.25; reference now offers +0.5.
        let r = m
            .match_quote(
                &opp(Direction::HandicapTeam2, dec!(0.25), dec!(1.9)),
                &snapshot(vec![handicap("0.5")]),
                StageMode::Final,
            )
            .unwrap();
        assert_eq!(r.kind, MatchKind::Special);
        assert_eq!(r.quote.line, dec!(0.5));
        assert!(r.passes);
        assert!(r.edge < Decimal::ZERO);
    }

    #[test]
    fn fallback_ignores_unfavorable_moves() {
        let m = matcher(FallbackPolicy::First);
        let r = m.match_quote(
            &opp(Direction::HandicapTeam1, dec!(-0.25), dec!(1.9)),
            &snapshot(vec![handicap("0.5")]),
            StageMode::Final,
        );
        assert!(r.is_none());
    }

    #[test]
    fn fallback_all_collects_every_favorable_line() {
        let m = matcher(FallbackPolicy::All);
        let quotes = vec![
            QuoteBuilder::goal().full_total("2.25", "0.9", "0.9").build(),
            QuoteBuilder::goal().full_total("2.75", "0.9", "0.9").build(),
            QuoteBuilder::goal().full_total("2", "0.9", "0.9").build(),
        ];
        let r = m
            .match_quote(
                &opp(Direction::Over, dec!(2.5), dec!(1.9)),
                &snapshot(quotes),
                StageMode::Final,
            )
            .unwrap();
        let lines: Vec<_> = r.candidates().map(|c| c.line).collect();
        assert_eq!(lines, vec![dec!(2.25), dec!(2)]);
    }

    #[test]
    fn corner_markets_only_see_corner_rows() {
        let m = matcher(FallbackPolicy::Disabled);
        let mut o = opp(Direction::Over, dec!(9.5), dec!(1.8));
        o.market.scope = Scope::Corner;
        let quotes = vec![
            QuoteBuilder::goal().teams("L", "Real", "Other").full_total("9.5", "0.9", "0.9").build(),
            QuoteBuilder::corner().teams("L", "Real - Corners", "Other - Corners").build(),
        ];
        assert!(m.match_quote(&o, &snapshot(quotes.clone()), StageMode::Ready).is_none());

        let mut with_corner = quotes;
        with_corner[1] = QuoteBuilder::corner()
            .teams("L", "Real - Corners", "Other - Corners")
            .full_total("9.5", "0.9", "0.9")
            .build();
        let r = m.match_quote(&o, &snapshot(with_corner), StageMode::Ready).unwrap();
        assert_eq!(r.fixture.home, "Real");
    }

    #[test]
    fn exact_line_always_wins_over_fallback() {
        let m = matcher(FallbackPolicy::All);
        for exact_pos in 0..3 {
            let mut quotes = vec![
                QuoteBuilder::goal().full_total("3", "0.9", "0.9").build(),
                QuoteBuilder::goal().full_total("2", "0.9", "0.9").build(),
            ];
            quotes.insert(exact_pos, QuoteBuilder::goal().full_total("2.5", "0.8", "0.8").build());
            for direction in [Direction::Over, Direction::Under] {
                let r = m
                    .match_quote(&opp(direction, dec!(2.5), dec!(1.9)), &snapshot(quotes.clone()), StageMode::Final)
                    .unwrap();
                assert_eq!(r.kind, MatchKind::Exact);
                assert_eq!(r.quote.line, dec!(2.5));
            }
        }
    }

    #[test]
    fn raising_margin_never_turns_fail_into_pass() {
        let snap = snapshot(vec![handicap("0.5")]);
        let margins: Vec<Decimal> = (-20..=20).map(|i| Decimal::new(i, 2)).collect();
        for odds_cents in 190..=230 {
            let o = opp(Direction::HandicapTeam1, dec!(-0.5), Decimal::new(odds_cents, 2));
            let mut failed = false;
            for margin in &margins {
                let m = QuoteMatcher::new(
                    StageThreshold::at_least(*margin),
                    StageThreshold::at_least(*margin),
                );
                let passes = m.match_quote(&o, &snap, StageMode::Ready).unwrap().passes;
                assert!(!(failed && passes), "margin {margin} passed after a lower one failed");
                failed |= !passes;
            }
        }
    }
}
