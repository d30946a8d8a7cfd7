//! Turning feed records into [`Opportunity`] values.

use std::str::FromStr;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use crate::market::{Direction, Half, MarketDescriptor, Opportunity, Scope};

use super::types::{OddsRecord, Prong};

fn scope(variety: &str) -> Option<Scope> {
    match variety {
        "goal" => Some(Scope::Goal),
        "corner" => Some(Scope::Corner),
        _ => None,
    }
}

fn half(period: &str) -> Option<Half> {
    match period {
        "regularTime" => Some(Half::Full),
        "period1" => Some(Half::First),
        _ => None,
    }
}

/// Opportunity for a prong, if its market is one the pipeline handles.
pub fn prong_to_opportunity(prong: &Prong) -> Option<Opportunity> {
    let t = &prong.odd_type;
    if t.game != "regular" || t.base != "overall" {
        return None;
    }
    let direction = Direction::from_str(&t.kind).ok()?;
    let line = match t.condition.as_deref() {
        Some(raw) => Decimal::from_str(raw.trim()).ok()?,
        None => Decimal::ZERO,
    };
    let odds = Decimal::from_str(&prong.value.to_string()).ok()?;
    let kickoff =
        OffsetDateTime::from_unix_timestamp_nanos(i128::from(prong.time) * 1_000_000).ok()?;

    Some(Opportunity {
        match_ref: prong.preferred_nav.markers.event_id.clone(),
        kickoff,
        market: MarketDescriptor::new(scope(&t.variety)?, half(&t.period)?, direction, line),
        odds,
    })
}

/// Opportunities quoted by `bookmaker`, one per record at most.
pub fn opportunities(records: &[OddsRecord], bookmaker: &str) -> Vec<Opportunity> {
    records
        .iter()
        .filter_map(|r| r.prongs.iter().find(|p| p.bk == bookmaker))
        .filter_map(prong_to_opportunity)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn record(bk: &str, variety: &str, period: &str, kind: &str, condition: &str) -> OddsRecord {
        serde_json::from_value(json!({
            "sort_by": 1.5,
            "id": "r1",
            "prongs": [
                {
                    "value": 1.5, "bk": "bet365", "time": 1714564800000_i64,
                    "type": {"game": "regular", "base": "overall", "variety": variety,
                             "period": period, "type": "ah2", "condition": "0.5"},
                    "preferred_nav": {"markers": {"eventId": "x"}}
                },
                {
                    "value": 2.05, "bk": bk, "time": 1714564800000_i64,
                    "type": {"game": "regular", "base": "overall", "variety": variety,
                             "period": period, "type": kind, "condition": condition},
                    "preferred_nav": {"markers": {"eventId": "123"}},
                    "teams": ["A", "B"]
                }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn picks_the_configured_bookmaker() {
        let records = vec![record("188bet", "goal", "regularTime", "ah1", "-0.5")];
        let opps = opportunities(&records, "188bet");
        assert_eq!(opps.len(), 1);
        let o = &opps[0];
        assert_eq!(o.match_ref, "123");
        assert_eq!(o.odds, dec!(2.05));
        assert_eq!(o.market.direction, Direction::HandicapTeam1);
        assert_eq!(o.market.line, dec!(-0.5));
        assert_eq!(o.kickoff.unix_timestamp(), 1_714_564_800);
    }

    #[test]
    fn maps_corner_first_half_totals() {
        let records = vec![record("188bet", "corner", "period1", "under", "4.5")];
        let o = &opportunities(&records, "188bet")[0];
        assert_eq!(o.market.scope, Scope::Corner);
        assert_eq!(o.market.half, Half::First);
        assert_eq!(o.market.direction, Direction::Under);
    }

    #[test]
    fn drops_unsupported_markets() {
        let records = vec![
            record("188bet", "card", "regularTime", "over", "3.5"),
            record("188bet", "goal", "overtime", "over", "0.5"),
            record("188bet", "goal", "regularTime", "win1", ""),
            record("pinnacle", "goal", "regularTime", "over", "2.5"),
        ];
        assert!(opportunities(&records, "188bet").is_empty());
    }

    #[test]
    fn cursor_format() {
        let r = record("188bet", "goal", "regularTime", "ah1", "0");
        assert_eq!(r.cursor(), "1.5:r1");
    }
}
