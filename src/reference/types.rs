//! Reference bookmaker snapshot types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use strum::Display;
use time::OffsetDateTime;

use crate::market::Side;

/// Which listing the reference site keeps a match under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, Default)]
pub enum Horizon {
    /// Matches kicking off before noon tomorrow.
    #[default]
    #[serde(rename = "today")]
    #[strum(serialize = "today")]
    NearTerm,
    /// Everything later.
    #[serde(rename = "early")]
    #[strum(serialize = "early")]
    FarTerm,
}

/// Team and tournament metadata carried by a quote.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FixtureMeta {
    /// Tournament id.
    pub league_id: String,
    /// Tournament name.
    pub league: String,
    /// Home team id.
    pub home_id: String,
    /// Home team name.
    pub home: String,
    /// Away team id.
    pub away_id: String,
    /// Away team name.
    pub away: String,
}

/// One market-category row of a snapshot, as the site publishes it.
///
/// The site ships every market of a category as flat string fields; the
/// matcher picks them out through its field table.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceQuote {
    fields: HashMap<String, String>,
}

impl ReferenceQuote {
    /// Build from raw key/value pairs.
    pub fn from_fields<I, K, V>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Raw field value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Set a raw field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    /// Market category id (`0` goals, `146` corners).
    pub fn category(&self) -> Option<u32> {
        self.get("ptype_id").and_then(|v| v.trim().parse().ok())
    }

    /// Whether the named switch field reads `Y`.
    pub fn is_open(&self, switch_key: &str) -> bool {
        self.get(switch_key) == Some("Y")
    }

    /// Favored side named by a strong-side field.
    pub fn favored(&self, key: &str) -> Option<Side> {
        match self.get(key) {
            Some("H") => Some(Side::Home),
            Some("C") => Some(Side::Away),
            _ => None,
        }
    }

    /// Team/tournament metadata.
    pub fn meta(&self) -> FixtureMeta {
        let field = |k: &str| self.get(k).unwrap_or_default().to_string();
        FixtureMeta {
            league_id: field("lid"),
            league: field("league"),
            home_id: field("team_id_h"),
            home: field("team_h"),
            away_id: field("team_id_c"),
            away: field("team_c"),
        }
    }
}

/// All quotes the reference site shows for one match at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceQuoteSnapshot {
    /// Reference-site match id.
    pub match_ref: String,
    /// When the snapshot was taken.
    pub fetched_at: OffsetDateTime,
    /// One row per market category.
    pub quotes: Vec<ReferenceQuote>,
}

impl ReferenceQuoteSnapshot {
    /// The goal-category row, falling back to the first row.
    pub fn primary(&self) -> Option<&ReferenceQuote> {
        self.quotes
            .iter()
            .find(|q| q.category() == Some(0))
            .or_else(|| self.quotes.first())
    }

    /// Rows for one market category.
    pub fn in_category(&self, category: u32) -> impl Iterator<Item = &ReferenceQuote> {
        self.quotes
            .iter()
            .filter(move |q| q.category() == Some(category))
    }
}
