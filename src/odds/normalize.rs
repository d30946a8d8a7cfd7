//! Conversion of the reference site's native lines and prices.
//!
//! The odds conversion mirrors the site's own published formula, which runs on
//! IEEE doubles with floor rounding at every step. It is computed in `f64` on
//! purpose so the two-decimal result matches the site bit-for-bit, and only the
//! final cents value is turned into a [`Decimal`].

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::OddsError;

/// Canonical line from a raw line string.
///
/// `"1.5"` stays `1.5`; a quarter line such as `"0.5/1"` becomes the mean of its parts.
pub fn normalize_line(raw: &str) -> Result<Decimal, OddsError> {
    let parts: Vec<&str> = raw.split('/').map(str::trim).collect();
    let parse = |s: &str| Decimal::from_str(s).map_err(|_| OddsError::InvalidLine(raw.to_string()));
    match parts.as_slice() {
        [single] => parse(single),
        [a, b] => Ok((parse(a)? + parse(b)?) / Decimal::TWO),
        _ => Err(OddsError::InvalidLine(raw.to_string())),
    }
}

/// Decimal odds for both sides of a raw Hong-Kong style pair.
pub fn normalize_odds(raw_home: &str, raw_away: &str) -> Result<(Decimal, Decimal), OddsError> {
    let home = scale(parse_raw(raw_home)?);
    let away = scale(parse_raw(raw_away)?);
    let [h, a] = hong_kong_pair(home, away);
    Ok((
        Decimal::new(to_cents((h + 1e3) / 1e3), 2),
        Decimal::new(to_cents((a + 1e3) / 1e3), 2),
    ))
}

fn parse_raw(raw: &str) -> Result<f64, OddsError> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| OddsError::InvalidOdds(raw.to_string()))
}

/// Thousandths, floor-rounded. Values under 11 are plain prices and get scaled up.
fn scale(raw: f64) -> f64 {
    let v = (raw * 1e3 + 0.001).floor() / 1e3;
    if v < 11.0 {
        v * 1e3
    } else {
        v
    }
}

fn floor_to_ten(v: f64) -> f64 {
    (v / 10.0 + 1e-4).floor() * 10.0
}

fn hong_kong_pair(home: f64, away: f64) -> [f64; 2] {
    if home <= 1e3 && away <= 1e3 {
        return [floor_to_ten(home), floor_to_ten(away)];
    }

    let line = 2e3 - (home + away);
    let (low, low_is_home) = if home > away {
        (away, false)
    } else {
        (home, true)
    };
    let counterpart = if 2e3 - line - low > 1e3 {
        -(low + line)
    } else {
        2e3 - line - low
    };
    let high = if counterpart < 0.0 {
        ((1e3 / counterpart).abs() * 1e3).floor()
    } else {
        2e3 - line - counterpart
    };

    if low_is_home {
        [floor_to_ten(low), floor_to_ten(high)]
    } else {
        [floor_to_ten(high), floor_to_ten(low)]
    }
}

fn to_cents(v: f64) -> i64 {
    let cents = (v.abs() * 100.0 + 0.01).floor() as i64;
    if v < 0.0 {
        -cents
    } else {
        cents
    }
}
