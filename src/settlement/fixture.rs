//! Locating a match in the score provider's fixture list.
//!
//! Team names differ between sites in spacing, bracketed suffixes and the
//! odd typo. Names are normalized first, an exact pair wins, and otherwise
//! both names must be within a small edit distance.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

static NAME_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[()（）\s]").expect("valid regex"));

/// A fixture as listed by the score provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fixture {
    /// Provider's fixture id.
    pub id: String,
    /// Scheduled kickoff.
    #[serde(with = "time::serde::timestamp")]
    pub kickoff: OffsetDateTime,
    /// Team 1 name.
    pub home: String,
    /// Team 2 name.
    pub away: String,
}

/// Strip brackets and whitespace.
pub fn normalize_name(name: &str) -> String {
    NAME_NOISE.replace_all(name, "").into_owned()
}

/// Edit distance allowed between two normalized names: a third of the
/// shorter name, at least 1 and at most 2.
pub fn tolerance(a: &str, b: &str) -> usize {
    let shorter = a.chars().count().min(b.chars().count());
    (shorter / 3).clamp(1, 2)
}

fn close_enough(a: &str, b: &str) -> bool {
    strsim::levenshtein(a, b) <= tolerance(a, b)
}

/// Find the fixture for `home` v `away` kicking off within `window` of `kickoff`.
pub fn find_fixture<'a>(
    fixtures: &'a [Fixture],
    home: &str,
    away: &str,
    kickoff: OffsetDateTime,
    window: Duration,
) -> Option<&'a Fixture> {
    let home = normalize_name(home);
    let away = normalize_name(away);
    let window = time::Duration::try_from(window).unwrap_or(time::Duration::ZERO);

    let candidates: Vec<(&Fixture, String, String)> = fixtures
        .iter()
        .filter(|f| (f.kickoff - kickoff).abs() <= window)
        .map(|f| (f, normalize_name(&f.home), normalize_name(&f.away)))
        .collect();

    candidates
        .iter()
        .find(|(_, h, a)| *h == home && *a == away)
        .or_else(|| {
            candidates
                .iter()
                .find(|(_, h, a)| close_enough(h, &home) && close_enough(a, &away))
        })
        .map(|(f, _, _)| *f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn fixture(id: &str, home: &str, away: &str, kickoff: OffsetDateTime) -> Fixture {
        Fixture {
            id: id.to_string(),
            kickoff,
            home: home.to_string(),
            away: away.to_string(),
        }
    }

    const WINDOW: Duration = Duration::from_secs(30 * 60);

    #[test]
    fn normalizes_brackets_and_spaces() {
        assert_eq!(normalize_name("Real Madrid (W)"), "RealMadridW");
        assert_eq!(normalize_name("横滨水手（后备）"), "横滨水手后备");
    }

    #[test]
    fn tolerance_bounds() {
        assert_eq!(tolerance("ab", "abc"), 1);
        assert_eq!(tolerance("abcdef", "abcdefgh"), 2);
        assert_eq!(tolerance("abcdefghijkl", "abcdefghijkl"), 2);
    }

    #[test]
    fn exact_match_preferred() {
        let ko = datetime!(2024-05-01 12:00 UTC);
        let fixtures = vec![
            fixture("1", "Arsenol", "Chelsea", ko),
            fixture("2", "Arsenal", "Chelsea", ko),
        ];
        let f = find_fixture(&fixtures, "Arsenal", "Chelsea", ko, WINDOW).unwrap();
        assert_eq!(f.id, "2");
    }

    #[test]
    fn fuzzy_match_within_tolerance() {
        let ko = datetime!(2024-05-01 12:00 UTC);
        let fixtures = vec![fixture("7", "Manchester Utd", "Everton FC", ko)];
        let f = find_fixture(&fixtures, "Manchester Ut", "Everton (FC)", ko, WINDOW);
        assert_eq!(f.map(|f| f.id.as_str()), Some("7"));
        assert!(find_fixture(&fixtures, "Liverpool", "Everton", ko, WINDOW).is_none());
    }

    #[test]
    fn respects_time_window() {
        let ko = datetime!(2024-05-01 12:00 UTC);
        let fixtures = vec![fixture("1", "Arsenal", "Chelsea", datetime!(2024-05-01 13:00 UTC))];
        assert!(find_fixture(&fixtures, "Arsenal", "Chelsea", ko, WINDOW).is_none());
        assert!(find_fixture(&fixtures, "Arsenal", "Chelsea", ko, Duration::from_secs(3600)).is_some());
    }
}
