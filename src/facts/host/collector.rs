use super::LOG_TARGET;
use super::client::{Client, PullRequestFile, PullRequestRef, Repository};
use super::line_walker;
use super::repo_signals::{PullRequestStats, RepoSignals};
use crate::Result;
use crate::facts::RepoSpec;
use crate::facts::registry::manifest::{MANIFEST_FILE, Manifest};
use crate::facts::signal::measure;
use futures_util::future::join_all;
use ohno::EnrichableExt;
use serde::de::IgnoredAny;
use std::collections::BTreeSet;

const PAGE_SIZE: u32 = 100;

/// Upper bound on pages fetched by any single pagination loop.
const MAX_PAGES: u32 = 100;

/// Limits applied while collecting host signals.
#[derive(Debug, Clone, Copy)]
pub struct HostLimits {
    pub line_sample_cap: u64,
    pub line_walk_concurrency: usize,
    pub commit_cap: u64,
    pub pull_request_sample: u32,
}

/// Gathers repository signals from the host's REST API.
#[derive(Debug, Clone)]
pub struct HostCollector {
    client: Client,
    limits: HostLimits,
}

impl HostCollector {
    #[must_use]
    pub const fn new(client: Client, limits: HostLimits) -> Self {
        Self { client, limits }
    }

    #[must_use]
    pub const fn client(&self) -> &Client {
        &self.client
    }

    /// Single request to `url`; true when it succeeds.
    pub async fn check_connection(&self, url: &str) -> bool {
        self.client.probe(url).await
    }

    /// Open issue count as reported by the repository summary.
    pub async fn fetch_open_issues(&self, spec: &RepoSpec) -> Result<u64> {
        let repo: Repository = self.client.get_json(&self.client.repo_url(spec, "")).await?;
        Ok(repo.open_issues_count)
    }

    /// License names declared in the manifest at the repository root.
    pub async fn fetch_license(&self, spec: &RepoSpec) -> Result<BTreeSet<String>> {
        let url = self.client.repo_url(spec, &format!("/contents/{MANIFEST_FILE}"));
        let text = self.client.get_raw(&url).await?;
        let manifest = Manifest::parse(&text).map_err(|e| e.enrich_with(|| format!("reading the manifest of {spec}")))?;
        Ok(manifest.license_names())
    }

    /// Closed issue count.
    ///
    /// Pages are fetched while twice the open count is at least the closed count seen so far
    /// and the previous page was not empty. With an unknown open count only one page is read.
    pub async fn fetch_closed_issues(&self, spec: &RepoSpec, open_issues: Option<u64>) -> Result<u64> {
        let mut closed = 0_u64;

        for page in 1..=MAX_PAGES {
            let url = self
                .client
                .repo_url(spec, &format!("/issues?state=closed&per_page={PAGE_SIZE}&page={page}"));
            let issues: Vec<IgnoredAny> = self.client.get_json(&url).await?;
            closed += issues.len() as u64;

            let keep_going = open_issues.is_some_and(|open| open.saturating_mul(2) >= closed) && !issues.is_empty();
            if !keep_going {
                break;
            }
        }

        Ok(closed)
    }

    /// Sampled line count of the repository's files, stopping near the configured cap.
    pub async fn fetch_lines(&self, spec: &RepoSpec) -> Result<u64> {
        let root_url = self.client.repo_url(spec, "/contents");
        line_walker::count_lines(&self.client, &root_url, self.limits.line_sample_cap, self.limits.line_walk_concurrency).await
    }

    /// Commit count, paginating while pages are full and the total is under the cap.
    pub async fn fetch_commits(&self, spec: &RepoSpec) -> Result<u64> {
        let mut commits = 0_u64;

        for page in 1..=MAX_PAGES {
            let url = self.client.repo_url(spec, &format!("/commits?per_page={PAGE_SIZE}&page={page}"));
            let entries: Vec<IgnoredAny> = self.client.get_json(&url).await?;
            commits += entries.len() as u64;

            if entries.len() < PAGE_SIZE as usize || commits >= self.limits.commit_cap {
                break;
            }
        }

        Ok(commits)
    }

    /// Contributor count, following `rel="next"` links until exhausted.
    pub async fn fetch_contributors(&self, spec: &RepoSpec) -> Result<u64> {
        let mut contributors = 0_u64;

        for page in 1..=MAX_PAGES {
            let url = self.client.repo_url(spec, &format!("/contributors?per_page={PAGE_SIZE}&page={page}"));
            let (entries, has_next) = self.client.get_page::<IgnoredAny>(&url).await?;
            contributors += entries.len() as u64;

            if !has_next {
                break;
            }
        }

        Ok(contributors)
    }

    /// Review coverage of the most recently closed pull requests.
    ///
    /// Pull requests whose details cannot be fetched are left out of the sample.
    pub async fn fetch_pull_requests(&self, spec: &RepoSpec) -> Result<PullRequestStats> {
        let sample = self.limits.pull_request_sample;
        let url = self.client.repo_url(spec, &format!("/pulls?state=closed&per_page={sample}&page=1"));
        let pulls: Vec<PullRequestRef> = self.client.get_json(&url).await?;

        let details = join_all(
            pulls
                .iter()
                .take(sample as usize)
                .map(|pull| self.fetch_pull_request_detail(spec, pull.number)),
        )
        .await;

        let mut total_additions = 0;
        let mut reviewed_additions = 0;

        for (number, detail) in pulls.iter().map(|p| p.number).zip(details) {
            match detail {
                Ok((additions, reviewed)) => {
                    total_additions += additions;
                    if reviewed {
                        reviewed_additions += additions;
                    }
                }
                Err(e) => log::debug!(target: LOG_TARGET, "Leaving pull request #{number} of {spec} out of the sample: {e:#}"),
            }
        }

        Ok(PullRequestStats::new(total_additions, reviewed_additions))
    }

    async fn fetch_pull_request_detail(&self, spec: &RepoSpec, number: u64) -> Result<(u64, bool)> {
        let reviews_url = self.client.repo_url(spec, &format!("/pulls/{number}/reviews"));

        let (additions, reviews) = tokio::join!(
            self.fetch_pull_request_additions(spec, number),
            self.client.get_json::<Vec<IgnoredAny>>(&reviews_url),
        );

        Ok((additions?, !reviews?.is_empty()))
    }

    /// Lines added by a pull request, summed over every page of its changed files.
    async fn fetch_pull_request_additions(&self, spec: &RepoSpec, number: u64) -> Result<u64> {
        let mut additions = 0_u64;

        for page in 1..=MAX_PAGES {
            let url = self
                .client
                .repo_url(spec, &format!("/pulls/{number}/files?per_page={PAGE_SIZE}&page={page}"));
            let (files, has_next) = self.client.get_page::<PullRequestFile>(&url).await?;
            additions += files.iter().map(|f| f.additions).sum::<u64>();

            if !has_next {
                break;
            }
        }

        Ok(additions)
    }

    /// Collect every host signal for `repo_url`.
    ///
    /// When the repository cannot be reached the returned record names the repository and
    /// nothing else. Individual failures leave only their own signal uncomputed.
    pub async fn run_tasks(&self, repo_url: &str) -> RepoSignals {
        let mut signals = RepoSignals::empty(repo_url);

        let spec = match RepoSpec::parse(repo_url) {
            Ok(spec) => spec,
            Err(e) => {
                log::info!(target: LOG_TARGET, "Cannot collect host signals for '{repo_url}': {e:#}");
                return signals;
            }
        };

        if !self.check_connection(&self.client.repo_url(&spec, "")).await {
            log::info!(target: LOG_TARGET, "Repository {spec} is not reachable through the host API");
            return signals;
        }

        log::info!(target: LOG_TARGET, "Collecting host signals for {spec}");

        let (open_issues, licenses) = tokio::join!(
            measure(LOG_TARGET, "open issues", self.fetch_open_issues(&spec)),
            measure(LOG_TARGET, "licenses", self.fetch_license(&spec)),
        );

        signals.closed_issues = measure(
            LOG_TARGET,
            "closed issues",
            self.fetch_closed_issues(&spec, open_issues.value().copied()),
        )
        .await;
        signals.open_issues = open_issues;
        signals.licenses = licenses;
        signals.line_sample = measure(LOG_TARGET, "line sample", self.fetch_lines(&spec)).await;
        signals.commits = measure(LOG_TARGET, "commits", self.fetch_commits(&spec)).await;
        signals.contributors = measure(LOG_TARGET, "contributors", self.fetch_contributors(&spec)).await;
        signals.pull_requests = measure(LOG_TARGET, "pull requests", self.fetch_pull_requests(&spec)).await;
        signals.repo = Some(spec);

        signals
    }
}

