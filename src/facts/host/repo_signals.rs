use crate::facts::{Measured, RepoSpec};
use std::collections::BTreeSet;

/// Review coverage of a sample of recently closed pull requests.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PullRequestStats {
    /// Lines added across all sampled pull requests
    pub total_additions: u64,

    /// Lines added by sampled pull requests that received at least one review
    pub reviewed_additions: u64,

    /// `reviewed_additions / total_additions`, rounded to three decimals; 0 when nothing was added
    pub reviewed_fraction: f64,
}

impl PullRequestStats {
    #[must_use]
    pub fn new(total_additions: u64, reviewed_additions: u64) -> Self {
        #[expect(clippy::cast_precision_loss, reason = "line counts are far below 2^52")]
        let reviewed_fraction = if total_additions == 0 {
            0.0
        } else {
            crate::metrics::round3(reviewed_additions as f64 / total_additions as f64)
        };

        Self {
            total_additions,
            reviewed_additions,
            reviewed_fraction,
        }
    }
}

/// Signals gathered from the repository host's API.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoSignals {
    pub repo_url: String,
    pub repo: Option<RepoSpec>,
    pub contributors: Measured<u64>,
    pub open_issues: Measured<u64>,
    pub closed_issues: Measured<u64>,
    pub licenses: Measured<BTreeSet<String>>,
    pub commits: Measured<u64>,
    pub line_sample: Measured<u64>,
    pub pull_requests: Measured<PullRequestStats>,
}

impl RepoSignals {
    /// A record naming only the repository, with no signal computed.
    #[must_use]
    pub fn empty(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }
}
