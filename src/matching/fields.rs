//! Which raw snapshot fields hold each market.

use rust_decimal::Decimal;

use crate::error::OddsError;
use crate::market::{Direction, Half, MarketKind};
use crate::odds::{normalize_line, normalize_odds};
use crate::reference::ReferenceQuote;

/// Field names for one (half, market kind) cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarketFields {
    /// `Y` when the market is open.
    pub switch: &'static str,
    /// Raw line.
    pub line: &'static str,
    /// Favored side (`H`/`C`); handicaps only.
    pub favored: Option<&'static str>,
    /// Raw odds: team1/under first, team2/over second.
    pub odds: [&'static str; 2],
}

const FULL_HANDICAP: MarketFields = MarketFields {
    switch: "sw_R",
    line: "ratio",
    favored: Some("strong"),
    odds: ["ior_RH", "ior_RC"],
};

const FIRST_HALF_HANDICAP: MarketFields = MarketFields {
    switch: "sw_HR",
    line: "hratio",
    favored: Some("hstrong"),
    odds: ["ior_HRH", "ior_HRC"],
};

const FULL_TOTAL: MarketFields = MarketFields {
    switch: "sw_OU",
    line: "ratio_o",
    favored: None,
    odds: ["ior_OUH", "ior_OUC"],
};

const FIRST_HALF_TOTAL: MarketFields = MarketFields {
    switch: "sw_HOU",
    line: "ratio_ho",
    favored: None,
    odds: ["ior_HOUH", "ior_HOUC"],
};

/// Field table lookup.
pub fn fields_for(half: Half, kind: MarketKind) -> &'static MarketFields {
    match (half, kind) {
        (Half::Full, MarketKind::Handicap) => &FULL_HANDICAP,
        (Half::First, MarketKind::Handicap) => &FIRST_HALF_HANDICAP,
        (Half::Full, MarketKind::Total) => &FULL_TOTAL,
        (Half::First, MarketKind::Total) => &FIRST_HALF_TOTAL,
    }
}

/// A reference quote read from the backed side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedQuote {
    /// Canonical line, signed from the backed team for handicaps.
    pub line: Decimal,
    /// Decimal odds for the backed side.
    pub odds: Decimal,
}

/// Read the market `(half, direction)` from `quote`. `Ok(None)` when it is switched off.
pub fn resolve(
    quote: &ReferenceQuote,
    half: Half,
    direction: Direction,
) -> Result<Option<ResolvedQuote>, OddsError> {
    let fields = fields_for(half, direction.kind());
    if !quote.is_open(fields.switch) {
        return Ok(None);
    }

    let raw_line = quote
        .get(fields.line)
        .ok_or_else(|| OddsError::InvalidLine(format!("missing {}", fields.line)))?;
    let mut line = normalize_line(raw_line)?;
    if let (Some(key), Some(backed)) = (fields.favored, direction.backed_side()) {
        // Giving goals: the line is negative for the backed team.
        if quote.favored(key) == Some(backed) {
            line = -line;
        }
    }

    let raw = |key: &str| {
        quote
            .get(key)
            .ok_or_else(|| OddsError::InvalidOdds(format!("missing {key}")))
    };
    let (first, second) = normalize_odds(raw(fields.odds[0])?, raw(fields.odds[1])?)?;
    let odds = if direction.odds_index() == 0 {
        first
    } else {
        second
    };

    Ok(Some(ResolvedQuote { line, odds }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Side;
    use crate::reference::mock::QuoteBuilder;
    use rust_decimal_macros::dec;

    #[test]
    fn table_covers_every_cell() {
        assert_eq!(fields_for(Half::Full, MarketKind::Handicap).switch, "sw_R");
        assert_eq!(fields_for(Half::First, MarketKind::Handicap).line, "hratio");
        assert_eq!(fields_for(Half::Full, MarketKind::Total).odds, ["ior_OUH", "ior_OUC"]);
        assert_eq!(fields_for(Half::First, MarketKind::Total).favored, None);
    }

    #[test]
    fn favored_team_gets_negative_line() {
        let q = QuoteBuilder::goal()
            .full_handicap("0.5", Side::Home, "1.095", "0.75")
            .build();
        let home = resolve(&q, Half::Full, Direction::HandicapTeam1).unwrap().unwrap();
        assert_eq!(home.line, dec!(-0.5));
        assert_eq!(home.odds, dec!(2.10));

        let away = resolve(&q, Half::Full, Direction::HandicapTeam2).unwrap().unwrap();
        assert_eq!(away.line, dec!(0.5));
        assert_eq!(away.odds, dec!(1.75));
    }

    #[test]
    fn first_half_handicap_reads_its_own_fields() {
        let q = QuoteBuilder::goal()
            .first_half_handicap("0/0.5", Side::Away, "1.095", "0.75")
            .build();
        let home = resolve(&q, Half::First, Direction::HandicapTeam1).unwrap().unwrap();
        assert_eq!(home.line, dec!(0.25));
        assert_eq!(home.odds, dec!(2.10));

        let away = resolve(&q, Half::First, Direction::HandicapTeam2).unwrap().unwrap();
        assert_eq!(away.line, dec!(-0.25));
        assert_eq!(away.odds, dec!(1.75));

        assert_eq!(resolve(&q, Half::Full, Direction::HandicapTeam1).unwrap(), None);
    }

    #[test]
    fn totals_pick_under_then_over() {
        let q = QuoteBuilder::goal()
            .first_half_total("1/1.5", "0.95", "0.85")
            .build();
        let under = resolve(&q, Half::First, Direction::Under).unwrap().unwrap();
        assert_eq!(under.line, dec!(1.25));
        assert_eq!(under.odds, dec!(1.95));
        let over = resolve(&q, Half::First, Direction::Over).unwrap().unwrap();
        assert_eq!(over.odds, dec!(1.85));
    }

    #[test]
    fn closed_market_resolves_to_none() {
        let q = QuoteBuilder::goal()
            .full_total("2.5", "0.95", "0.85")
            .field("sw_OU", "N")
            .build();
        assert_eq!(resolve(&q, Half::Full, Direction::Over).unwrap(), None);
        assert_eq!(resolve(&q, Half::Full, Direction::HandicapTeam1).unwrap(), None);
    }

    #[test]
    fn missing_odds_is_an_error() {
        let q = QuoteBuilder::goal()
            .field("sw_R", "Y")
            .field("ratio", "0")
            .build();
        assert!(resolve(&q, Half::Full, Direction::HandicapTeam1).is_err());
    }
}
