//! Sub-score functions.
//!
//! Every function here is pure and total: an input that was not computed yields a score of
//! exactly 0, never an error.

use crate::facts::host::PullRequestStats;
use crate::facts::registry::{Dependency, Documentation, is_pinned};
use chrono::{DateTime, Datelike, Utc};
use std::collections::BTreeSet;

/// License identifiers that satisfy the license gate. Matching is exact and case-sensitive.
pub const ALLOWED_LICENSES: [&str; 4] = ["MIT", "BSD-3-Clause", "Apache-2.0", "LGPL-2.1"];

const RESPONSIVENESS_WEIGHT: f64 = 0.25;
const CORRECTNESS_WEIGHT: f64 = 0.20;
const RAMP_UP_WEIGHT: f64 = 0.15;
const BUS_FACTOR_WEIGHT: f64 = 0.15;
const PINNING_WEIGHT: f64 = 0.10;
const PULL_REQUEST_WEIGHT: f64 = 0.15;

const LARGE_CODEBASE_LINES: u64 = 500;
const ACTIVE_HISTORY_COMMITS: u64 = 500;
const LONG_README_LINES: u64 = 300;

/// Round to three decimal places.
#[must_use]
pub fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Ratio of open to closed issues, mapped so that a low ratio scores well.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "issue counts are far below 2^52")]
pub fn correctness(open_issues: Option<u64>, closed_issues: Option<u64>) -> f64 {
    let (Some(open), Some(closed)) = (open_issues, closed_issues) else {
        return 0.0;
    };

    if closed == 0 {
        return 0.0;
    }

    let ratio = open as f64 / closed as f64;
    if ratio >= 1.0 {
        0.0
    } else if ratio <= 0.5 {
        1.0
    } else {
        round3(1.0 - ratio)
    }
}

/// Step function over the contributor count.
#[must_use]
pub fn bus_factor(contributors: Option<u64>) -> f64 {
    match contributors {
        None | Some(0..15) => 0.0,
        Some(15..50) => 0.25,
        Some(50..100) => 0.5,
        Some(100..200) => 0.75,
        Some(_) => 1.0,
    }
}

/// How easy the project is to pick up: codebase size, history depth, and README quality.
///
/// A missing README zeroes only the documentation bonus; the size and history bonuses still apply.
#[must_use]
pub fn rampup(line_sample: Option<u64>, commits: Option<u64>, documentation: Option<&Documentation>) -> f64 {
    let (Some(lines), Some(commits), Some(documentation)) = (line_sample, commits, documentation) else {
        return 0.0;
    };

    let Some(readme_lines) = documentation.readme_lines else {
        return 0.0;
    };

    let doc_bonus = if documentation.has_readme {
        bonus(readme_lines > LONG_README_LINES, 0.1) + bonus(documentation.has_examples, 0.1) + bonus(documentation.has_documentation, 0.14)
    } else {
        0.0
    };

    round3(bonus(lines >= LARGE_CODEBASE_LINES, 0.33) + bonus(commits >= ACTIVE_HISTORY_COMMITS, 0.33) + doc_bonus)
}

/// Decays linearly from 1 to 0 over the twelve months following the last commit.
#[must_use]
pub fn responsiveness(last_commit: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(last_commit) = last_commit else {
        return 0.0;
    };

    let months = (i64::from(now.year()) - i64::from(last_commit.year())) * 12 + i64::from(now.month()) - i64::from(last_commit.month());

    #[expect(clippy::cast_precision_loss, reason = "month counts are small")]
    let score = 1.0 - months.max(0) as f64 / 12.0;
    round3(score.max(0.0))
}

/// 1 when any declared license is on the allow-list, else 0.
#[must_use]
pub fn license_score(licenses: Option<&BTreeSet<String>>) -> f64 {
    let allowed = licenses.is_some_and(|licenses| ALLOWED_LICENSES.iter().any(|allowed| licenses.contains(*allowed)));
    bonus(allowed, 1.0)
}

/// Fraction of dependencies whose version is pinned; 1 when there are none.
#[must_use]
#[expect(clippy::cast_precision_loss, reason = "dependency counts are small")]
pub fn pinned_dependency_score(dependencies: Option<&[Dependency]>) -> f64 {
    let Some(dependencies) = dependencies else {
        return 0.0;
    };

    if dependencies.is_empty() {
        return 1.0;
    }

    let pinned = dependencies.iter().filter(|d| is_pinned(&d.requirement)).count();
    round3(pinned as f64 / dependencies.len() as f64)
}

#[must_use]
pub fn pull_request_score(stats: Option<&PullRequestStats>) -> f64 {
    stats.map_or(0.0, |s| s.reviewed_fraction)
}

/// The six weighted sub-scores that make up the net score.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SubScores {
    pub responsiveness: f64,
    pub correctness: f64,
    pub rampup: f64,
    pub bus_factor: f64,
    pub pinned_dependencies: f64,
    pub pull_requests: f64,
}

/// License-gated weighted sum of the sub-scores.
#[must_use]
pub fn net_score(license_score: f64, sub: &SubScores) -> f64 {
    license_score
        * round3(
            RESPONSIVENESS_WEIGHT * sub.responsiveness
                + CORRECTNESS_WEIGHT * sub.correctness
                + RAMP_UP_WEIGHT * sub.rampup
                + BUS_FACTOR_WEIGHT * sub.bus_factor
                + PINNING_WEIGHT * sub.pinned_dependencies
                + PULL_REQUEST_WEIGHT * sub.pull_requests,
        )
}

const fn bonus(condition: bool, value: f64) -> f64 {
    if condition { value } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn approx(actual: f64, expected: f64) {
        assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
    }

    fn dep(requirement: &str) -> Dependency {
        Dependency {
            name: "x".into(),
            requirement: requirement.into(),
        }
    }

    fn full_docs() -> Documentation {
        Documentation {
            has_readme: true,
            readme_lines: Some(1000),
            has_examples: true,
            has_documentation: true,
        }
    }

    #[test]
    fn test_round3() {
        approx(round3(0.333_333), 0.333);
        approx(round3(0.6666), 0.667);
        approx(round3(1.0), 1.0);
    }

    #[test]
    fn test_correctness() {
        approx(correctness(Some(0), Some(20)), 1.0);
        approx(correctness(Some(15), Some(20)), 0.25);
        approx(correctness(Some(5), Some(0)), 0.0);
        approx(correctness(Some(10), Some(10)), 0.0);
        approx(correctness(Some(10), Some(20)), 1.0);
        approx(correctness(Some(12), Some(20)), 0.4);
    }

    #[test]
    fn test_correctness_uncomputed_inputs() {
        approx(correctness(None, Some(20)), 0.0);
        approx(correctness(Some(1), None), 0.0);
    }

    #[test]
    fn test_bus_factor_breakpoints() {
        let cases = [
            (14, 0.0),
            (15, 0.25),
            (49, 0.25),
            (50, 0.5),
            (99, 0.5),
            (100, 0.75),
            (199, 0.75),
            (200, 1.0),
            (1000, 1.0),
        ];

        for (contributors, expected) in cases {
            approx(bus_factor(Some(contributors)), expected);
        }

        approx(bus_factor(None), 0.0);
    }

    #[test]
    fn test_rampup_full() {
        approx(rampup(Some(600), Some(1200), Some(&full_docs())), 1.0);
    }

    #[test]
    fn test_rampup_small_project() {
        let docs = Documentation {
            has_readme: true,
            readme_lines: Some(20),
            has_examples: true,
            has_documentation: false,
        };
        approx(rampup(Some(100), Some(600), Some(&docs)), 0.43);
    }

    #[test]
    fn test_rampup_without_readme_keeps_size_bonuses() {
        let docs = Documentation {
            has_readme: false,
            ..full_docs()
        };
        approx(rampup(Some(600), Some(1200), Some(&docs)), 0.66);
    }

    #[test]
    fn test_rampup_uncomputed_inputs() {
        approx(rampup(None, Some(1200), Some(&full_docs())), 0.0);
        approx(rampup(Some(600), None, Some(&full_docs())), 0.0);
        approx(rampup(Some(600), Some(1200), None), 0.0);
        approx(rampup(Some(600), Some(1200), Some(&Documentation::absent())), 0.0);
    }

    #[test]
    fn test_responsiveness() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap();

        approx(responsiveness(Some(now), now), 1.0);
        approx(responsiveness(Some(Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap()), now), 0.75);
        approx(responsiveness(Some(Utc.with_ymd_and_hms(2024, 6, 30, 0, 0, 0).unwrap()), now), 0.0);
        approx(responsiveness(Some(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()), now), 0.0);
        approx(responsiveness(Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()), now), 1.0);
        approx(responsiveness(None, now), 0.0);
    }

    #[test]
    fn test_license_score() {
        for allowed in ALLOWED_LICENSES {
            let licenses = BTreeSet::from([allowed.to_string()]);
            approx(license_score(Some(&licenses)), 1.0);
        }

        approx(license_score(Some(&BTreeSet::new())), 0.0);
        approx(license_score(Some(&BTreeSet::from(["GPL-3.0".to_string()]))), 0.0);
        approx(license_score(Some(&BTreeSet::from(["mit".to_string()]))), 0.0);
        approx(license_score(Some(&BTreeSet::from(["ISC".to_string(), "MIT".to_string()]))), 1.0);
        approx(license_score(None), 0.0);
    }

    #[test]
    fn test_pinned_dependency_score() {
        approx(pinned_dependency_score(Some(&[])), 1.0);
        approx(pinned_dependency_score(Some(&[dep("1.0.0"), dep("^1.2.3"), dep("2.3.x")])), 0.333);
        approx(pinned_dependency_score(Some(&[dep("1.0.0"), dep("2.0.1")])), 1.0);
        approx(pinned_dependency_score(None), 0.0);
    }

    #[test]
    fn test_pull_request_score() {
        let stats = PullRequestStats::new(400, 300);
        approx(pull_request_score(Some(&stats)), 0.75);
        approx(pull_request_score(None), 0.0);
    }

    #[test]
    fn test_net_score_weights_sum_to_one() {
        let all = SubScores {
            responsiveness: 1.0,
            correctness: 1.0,
            rampup: 1.0,
            bus_factor: 1.0,
            pinned_dependencies: 1.0,
            pull_requests: 1.0,
        };
        approx(net_score(1.0, &all), 1.0);
    }

    #[test]
    fn test_net_score_is_license_gated() {
        let all = SubScores {
            responsiveness: 1.0,
            correctness: 1.0,
            rampup: 1.0,
            bus_factor: 1.0,
            pinned_dependencies: 1.0,
            pull_requests: 1.0,
        };
        approx(net_score(0.0, &all), 0.0);
    }

    #[test]
    fn test_net_score_partial() {
        let sub = SubScores {
            responsiveness: 0.5,
            correctness: 0.25,
            ..SubScores::default()
        };
        approx(net_score(1.0, &sub), 0.175);
    }
}
