use super::manifest::Dependency;
use crate::facts::Measured;
use crate::facts::host::count_text_lines;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static EXAMPLES_REGEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)example").expect("invalid regex pattern"));

static DOCUMENTATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)documentation|docs").expect("invalid regex pattern"));

/// What the README tells us about a repository's documentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Documentation {
    pub has_readme: bool,

    /// `None` when no README could be read
    pub readme_lines: Option<u64>,

    pub has_examples: bool,
    pub has_documentation: bool,
}

impl Documentation {
    /// Documentation derived from README text.
    #[must_use]
    pub fn from_readme(text: &str) -> Self {
        Self {
            has_readme: true,
            readme_lines: Some(count_text_lines(text)),
            has_examples: EXAMPLES_REGEX.is_match(text),
            has_documentation: DOCUMENTATION_REGEX.is_match(text),
        }
    }

    /// No README was found anywhere.
    #[must_use]
    pub const fn absent() -> Self {
        Self {
            has_readme: false,
            readme_lines: None,
            has_examples: false,
            has_documentation: false,
        }
    }
}

/// Pinning statistics over a manifest's declared dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct DependencySummary {
    pub dependencies: Vec<Dependency>,
    pub total: u64,
    pub pinned: u64,

    /// `pinned / total` rounded to three decimals; 1.0 when there are no dependencies
    pub fraction_pinned: f64,
}

impl DependencySummary {
    #[must_use]
    pub fn new(dependencies: Vec<Dependency>) -> Self {
        let total = dependencies.len() as u64;
        let pinned = dependencies.iter().filter(|d| d.is_pinned()).count() as u64;

        #[expect(clippy::cast_precision_loss, reason = "dependency counts are small")]
        let fraction_pinned = if total == 0 {
            1.0
        } else {
            crate::metrics::round3(pinned as f64 / total as f64)
        };

        Self {
            dependencies,
            total,
            pinned,
            fraction_pinned,
        }
    }

    /// The summary reported when the manifest is missing or unreadable.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new())
    }
}

/// Signals gathered from a checkout of the repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageSignals {
    pub repo_url: String,
    pub last_commit: Measured<DateTime<Utc>>,
    pub documentation: Measured<Documentation>,
    pub dependencies: Measured<DependencySummary>,
}

impl PackageSignals {
    #[must_use]
    pub fn empty(repo_url: impl Into<String>) -> Self {
        Self {
            repo_url: repo_url.into(),
            ..Self::default()
        }
    }
}
