#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Trust scoring for open-source packages.
//!
//! Given a list of package URLs (registry package pages or direct source repository links),
//! this library resolves each one to its source repository, gathers signals from the
//! repository host's REST API and from a shallow checkout of the code, and turns those
//! signals into a set of normalized scores in `[0, 1]` plus a weighted net score.
//!
//! # Module Organization
//!
//! - [`analysis`]: The orchestrator that drives evaluation of a batch of URLs
//! - [`config`]: Injected configuration (endpoints, retry policy, concurrency, deadlines)
//! - [`facts`]: Data collection from the registry, the repository host, and checkouts
//! - [`metrics`]: Pure scoring functions over collected signals
//!
//! # Example
//!
//! ```no_run
//! # async fn demo() -> netscore::Result<()> {
//! use netscore::{Analyzer, config::AnalysisConfig};
//!
//! let analyzer = Analyzer::new(AnalysisConfig::default(), "ghp_example")?;
//! let scores = analyzer.run_analysis(&["https://github.com/expressjs/express".to_string()]).await?;
//! println!("{}", scores[0].net_score);
//! # Ok(())
//! # }
//! ```

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod analysis;
pub mod config;
pub mod facts;
pub mod metrics;

pub use crate::analysis::{Analyzer, CancelHandle};
pub use crate::metrics::Score;
