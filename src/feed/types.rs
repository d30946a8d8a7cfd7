//! Wire types of the odds aggregator's surebet listing.

use serde::Deserialize;

/// One page of the listing.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsResp {
    /// Response generation time (ms).
    #[serde(default)]
    pub updated_at: i64,
    /// More pages follow.
    #[serde(default)]
    pub can_forward: bool,
    /// Earlier pages exist.
    #[serde(default)]
    pub can_backward: bool,
    /// Page size the feed applied.
    #[serde(default)]
    pub limit: u32,
    /// Records on this page. A missing list ends pagination.
    #[serde(default)]
    pub records: Option<Vec<OddsRecord>>,
}

/// One recommended surebet.
#[derive(Debug, Clone, Deserialize)]
pub struct OddsRecord {
    /// Sort key, first half of the cursor.
    pub sort_by: f64,
    /// Record id, second half of the cursor.
    pub id: String,
    /// One prong per bookmaker.
    #[serde(default)]
    pub prongs: Vec<Prong>,
}

impl OddsRecord {
    /// Cursor pointing after this record.
    pub fn cursor(&self) -> String {
        format!("{}:{}", self.sort_by, self.id)
    }
}

/// Bet type of a prong.
#[derive(Debug, Clone, Deserialize)]
pub struct OddType {
    /// Line or total, if the type takes one.
    #[serde(default)]
    pub condition: Option<String>,
    /// Game situation, `regular` for the match itself.
    pub game: String,
    /// Team the bet applies to, `overall` for both.
    pub base: String,
    /// What is counted: `goal`, `corner`, ...
    pub variety: String,
    /// Part of the match: `regularTime`, `period1`, ...
    pub period: String,
    /// Logical bet: `ah1`, `ah2`, `over`, `under`, ...
    #[serde(rename = "type")]
    pub kind: String,
}

/// Markers pointing at the bookmaker's own event.
#[derive(Debug, Clone, Deserialize)]
pub struct Markers {
    /// Bookmaker event id.
    #[serde(rename = "eventId")]
    pub event_id: String,
}

/// Navigation block of a prong.
#[derive(Debug, Clone, Deserialize)]
pub struct PreferredNav {
    /// Event markers.
    pub markers: Markers,
}

/// One bookmaker's side of a surebet.
#[derive(Debug, Clone, Deserialize)]
pub struct Prong {
    /// Decimal odds.
    pub value: f64,
    /// Bookmaker key.
    pub bk: String,
    /// Kickoff as shown by the bookmaker (ms).
    pub time: i64,
    /// Bet type.
    #[serde(rename = "type")]
    pub odd_type: OddType,
    /// Navigation markers.
    pub preferred_nav: PreferredNav,
    /// Team names.
    #[serde(default)]
    pub teams: Vec<String>,
}
