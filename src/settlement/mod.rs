//! Post-match grading.
//!
//! - [`condition`]: lines split into settlement legs
//! - [`grader`]: leg grading and result reduction
//! - [`fixture`]: fuzzy fixture lookup
//! - [`provider`]: score provider clients
//! - [`engine`]: the settlement pass

pub mod condition;
pub mod engine;
pub mod fixture;
pub mod grader;
pub mod provider;

pub use condition::Condition;
pub use engine::{SettlementEngine, SettlementSummary};
pub use fixture::{find_fixture, normalize_name, Fixture};
pub use grader::{combine, grade_market, grade_promotion, LegOutcome};
pub use provider::{FixtureState, ScoreBridge, ScoreProvider, ScoreReport, StaticScoreProvider};
