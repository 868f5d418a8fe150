//! Scoring of collected signals.

pub mod calc;
mod score;

pub use calc::round3;
pub use score::Score;
