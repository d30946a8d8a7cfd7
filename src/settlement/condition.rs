//! Bet conditions split into the legs they settle on.

use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use smallvec::{smallvec, SmallVec};

use crate::error::SettlementError;

static CONDITION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([+-]?)(\d+(?:\.\d+)?)(?:\s*/\s*(\d+(?:\.\d+)?))?$").expect("valid regex")
});

/// A line as sign plus one or two unsigned leg values.
///
/// Quarter lines become two legs a quarter either side, e.g. `-0.25` is
/// sign `-1` with legs `[0, 0.5]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// `1` or `-1`.
    pub sign: i8,
    /// Unsigned leg values, ascending.
    pub values: SmallVec<[Decimal; 2]>,
}

impl Condition {
    /// Build from a canonical line.
    pub fn from_line(line: Decimal) -> Result<Self, SettlementError> {
        let invalid = || SettlementError::InvalidCondition(line.to_string());
        let sign = if line.is_sign_negative() && !line.is_zero() {
            -1
        } else {
            1
        };
        let abs = line.abs();
        let quarters = abs * dec!(4);
        if quarters.fract() != Decimal::ZERO {
            return Err(invalid());
        }

        let values = if (quarters % Decimal::TWO).is_zero() {
            smallvec![abs]
        } else {
            smallvec![abs - dec!(0.25), abs + dec!(0.25)]
        };
        Ok(Self { sign, values })
    }

    /// Signed line of each leg.
    pub fn legs(&self) -> impl Iterator<Item = Decimal> + '_ {
        let sign = Decimal::from(self.sign);
        self.values.iter().map(move |v| *v * sign)
    }

    /// Whether the stake is split over two legs.
    pub fn is_split(&self) -> bool {
        self.values.len() == 2
    }
}

impl FromStr for Condition {
    type Err = SettlementError;

    /// Accepts `"-0.25"`, `"2.5"` or the slash form `"-0/0.5"`.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || SettlementError::InvalidCondition(raw.to_string());
        let caps = CONDITION_RE.captures(raw.trim()).ok_or_else(invalid)?;
        let sign: i8 = if &caps[1] == "-" { -1 } else { 1 };
        let first = Decimal::from_str(&caps[2]).map_err(|_| invalid())?;

        match caps.get(3) {
            None => Condition::from_line(first * Decimal::from(sign)).map(|mut c| {
                // "-0" keeps its sign for the slash-less zero line too.
                if first.is_zero() {
                    c.sign = sign;
                }
                c
            }),
            Some(second) => {
                let second = Decimal::from_str(second.as_str()).map_err(|_| invalid())?;
                let (low, high) = if first <= second {
                    (first, second)
                } else {
                    (second, first)
                };
                if high - low != dec!(0.5) {
                    return Err(invalid());
                }
                Ok(Self {
                    sign,
                    values: smallvec![low, high],
                })
            }
        }
    }
}
