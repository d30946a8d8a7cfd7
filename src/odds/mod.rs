//! Odds and line normalization for the reference bookmaker's native format.

pub mod normalize;

pub use normalize::{normalize_line, normalize_odds};
