//! Repository host signals.
//!
//! Everything here talks to the host's REST API: issue and commit counts, contributors,
//! a bounded line sample of the file tree, pull request review coverage, and the license
//! declared by the manifest at the repository root.

mod client;
mod collector;
mod line_walker;
mod repo_signals;

const LOG_TARGET: &str = "      host";

pub use client::{Client, Credential};
pub use collector::{HostCollector, HostLimits};
pub use line_walker::count_text_lines;
pub use repo_signals::{PullRequestStats, RepoSignals};
