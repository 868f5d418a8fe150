use super::calc::{self, SubScores, round3};
use crate::facts::CombinedSignals;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Scores for one input URL, each in `[0, 1]`, with the seconds spent gathering their inputs.
///
/// A score of 0 can mean either "measured and bad" or "could not be measured".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Score {
    #[serde(rename = "URL")]
    pub url: String,
    pub net_score: f64,
    pub net_score_latency: f64,
    pub ramp_up: f64,
    pub ramp_up_latency: f64,
    pub correctness: f64,
    pub correctness_latency: f64,
    pub bus_factor: f64,
    pub bus_factor_latency: f64,
    pub responsive_maintainer: f64,
    pub responsive_maintainer_latency: f64,
    pub license_score: f64,
    pub license_score_latency: f64,
    pub good_pinning_practice: f64,
    pub good_pinning_practice_latency: f64,
    pub pull_request: f64,
    pub pull_request_latency: f64,
}

impl Score {
    /// Score `signals`, attributing the result to the input `url`. `now` anchors responsiveness.
    #[must_use]
    pub fn from_signals(url: &str, signals: &CombinedSignals, now: DateTime<Utc>) -> Self {
        let repo = &signals.repo;
        let package = &signals.package;

        let sub = SubScores {
            responsiveness: calc::responsiveness(package.last_commit.value().copied(), now),
            correctness: calc::correctness(repo.open_issues.value().copied(), repo.closed_issues.value().copied()),
            rampup: calc::rampup(
                repo.line_sample.value().copied(),
                repo.commits.value().copied(),
                package.documentation.value(),
            ),
            bus_factor: calc::bus_factor(repo.contributors.value().copied()),
            pinned_dependencies: calc::pinned_dependency_score(package.dependencies.value().map(|d| d.dependencies.as_slice())),
            pull_requests: calc::pull_request_score(repo.pull_requests.value()),
        };

        let license_score = calc::license_score(repo.licenses.value());

        let net_latency = repo.open_issues.latency_secs().max(repo.licenses.latency_secs())
            + repo.line_sample.latency_secs()
            + repo.closed_issues.latency_secs()
            + repo.commits.latency_secs()
            + repo.contributors.latency_secs()
            + repo.pull_requests.latency_secs()
            + package.dependencies.latency_secs();

        Self {
            url: url.to_string(),
            net_score: calc::net_score(license_score, &sub),
            net_score_latency: round3(net_latency),
            ramp_up: sub.rampup,
            ramp_up_latency: round3(
                repo.line_sample.latency_secs() + repo.commits.latency_secs() + package.documentation.latency_secs(),
            ),
            correctness: sub.correctness,
            correctness_latency: round3(repo.open_issues.latency_secs() + repo.closed_issues.latency_secs()),
            bus_factor: sub.bus_factor,
            bus_factor_latency: round3(repo.contributors.latency_secs()),
            responsive_maintainer: sub.responsiveness,
            responsive_maintainer_latency: round3(package.last_commit.latency_secs()),
            license_score,
            license_score_latency: round3(repo.licenses.latency_secs()),
            good_pinning_practice: sub.pinned_dependencies,
            good_pinning_practice_latency: round3(package.dependencies.latency_secs()),
            pull_request: sub.pull_requests,
            pull_request_latency: round3(repo.pull_requests.latency_secs()),
        }
    }

    /// The score of a URL that could not be evaluated at all.
    #[must_use]
    pub fn unavailable(url: &str, now: DateTime<Utc>) -> Self {
        Self::from_signals(url, &CombinedSignals::empty(""), now)
    }
}
