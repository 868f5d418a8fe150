//! Signal collection for package trust scoring.
//!
//! Two independent collectors feed the scorer:
//!
//! - **Host collector** ([`host`]): talks to the repository host's REST API to count issues,
//!   commits, contributors, sampled lines of code, pull request review coverage, and licenses.
//! - **Registry collector** ([`registry`]): materializes a shallow checkout of the repository to
//!   read README documentation, the last commit date, and the dependency manifest.
//!
//! URLs are first mapped to repositories by the [`resolver`]. Each collector returns a partial
//! record; the two partial records are merged into [`CombinedSignals`] at a single join point.

pub mod combined;
pub mod host;
pub mod registry;
pub mod repo_spec;
pub mod resilient_http;
pub mod resolver;
pub mod signal;
pub mod throttler;

pub use combined::CombinedSignals;
pub use repo_spec::RepoSpec;
pub use resolver::{ResolvedRepo, Resolver};
pub use signal::Measured;
