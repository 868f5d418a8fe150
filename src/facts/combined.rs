use crate::facts::host::RepoSignals;
use crate::facts::registry::PackageSignals;

/// Everything known about one repository: the host signals and the checkout signals.
///
/// Each collector fills in its own half independently; [`CombinedSignals::merge`] is the only
/// place where the halves meet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CombinedSignals {
    pub repo: RepoSignals,
    pub package: PackageSignals,
}

impl CombinedSignals {
    #[must_use]
    pub fn merge(repo: RepoSignals, package: PackageSignals) -> Self {
        debug_assert!(
            package.repo_url.is_empty() || repo.repo_url.is_empty() || package.repo_url == repo.repo_url,
            "merging signals of different repositories"
        );

        Self { repo, package }
    }

    /// A record with no signal computed, used when a URL could not be evaluated.
    #[must_use]
    pub fn empty(repo_url: &str) -> Self {
        Self::merge(RepoSignals::empty(repo_url), PackageSignals::empty(repo_url))
    }
}
