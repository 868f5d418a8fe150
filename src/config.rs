//! Injected configuration for an analysis run.

use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Highest number of URLs that may be evaluated at once.
pub const MAX_URL_CONCURRENCY: usize = 4;

/// Largest pull request sample; the host API returns at most this many items per page.
pub const MAX_PULL_REQUEST_SAMPLE: u32 = 100;

/// Endpoints, retry policy, concurrency bounds, and deadlines for an analysis run.
///
/// Every field has a default, so a configuration file only needs to name what it overrides.
/// The host API credential is deliberately not part of this structure.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct AnalysisConfig {
    /// Domain accepted by the direct repository URL pattern
    pub host_domain: String,

    /// Base URL of the repository host's REST API
    pub host_api_url: String,

    /// Domain of package-page URLs
    pub registry_site: String,

    /// Base URL of the package registry's metadata API
    pub registry_api_url: String,

    /// Parent directory for shallow checkouts
    pub work_dir: PathBuf,

    /// Timeout applied to every host API request
    pub request_timeout_secs: u64,

    /// Number of retries after the first failed attempt of a host API request
    pub max_retries: u32,

    /// Delay before the first retry; doubled after every further failure
    pub initial_retry_delay_ms: u64,

    /// Host API requests allowed in flight at once across all tasks
    pub max_concurrent_requests: usize,

    /// Requests allowed in flight at once while walking a repository's file tree
    pub line_walk_concurrency: usize,

    /// URLs evaluated at once; 1 evaluates them strictly one after another
    pub url_concurrency: usize,

    /// Time budget for evaluating a single URL
    pub url_deadline_secs: u64,

    /// Line count at which the file tree walk stops issuing new requests
    pub line_sample_cap: u64,

    /// Commit count at which commit pagination stops
    pub commit_cap: u64,

    /// Number of recently closed pull requests examined
    pub pull_request_sample: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            host_domain: "github.com".into(),
            host_api_url: "https://api.github.com".into(),
            registry_site: "www.npmjs.com".into(),
            registry_api_url: "https://registry.npmjs.org".into(),
            work_dir: std::env::temp_dir().join("netscore"),
            request_timeout_secs: 5,
            max_retries: 10,
            initial_retry_delay_ms: 1000,
            max_concurrent_requests: 8,
            line_walk_concurrency: 4,
            url_concurrency: 1,
            url_deadline_secs: 600,
            line_sample_cap: 500,
            commit_cap: 500,
            pull_request_sample: 20,
        }
    }
}

impl AnalysisConfig {
    /// Load configuration from a TOML file, or use defaults when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{}'", path.display()))?;
        let config: Self = toml::from_str(&text).into_app_err_with(|| format!("parsing configuration file '{}'", path.display()))?;
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if !(1..=MAX_URL_CONCURRENCY).contains(&self.url_concurrency) {
            return Err(app_err!(
                "url_concurrency must be between 1 and {MAX_URL_CONCURRENCY}, got {}",
                self.url_concurrency
            ));
        }

        if self.max_concurrent_requests == 0 {
            return Err(app_err!("max_concurrent_requests must be at least 1"));
        }

        if self.line_walk_concurrency == 0 {
            return Err(app_err!("line_walk_concurrency must be at least 1"));
        }

        if self.request_timeout_secs == 0 {
            return Err(app_err!("request_timeout_secs must be at least 1"));
        }

        if self.url_deadline_secs == 0 {
            return Err(app_err!("url_deadline_secs must be at least 1"));
        }

        if !(1..=MAX_PULL_REQUEST_SAMPLE).contains(&self.pull_request_sample) {
            return Err(app_err!(
                "pull_request_sample must be between 1 and {MAX_PULL_REQUEST_SAMPLE}, got {}",
                self.pull_request_sample
            ));
        }

        for (name, value) in [("host_api_url", &self.host_api_url), ("registry_api_url", &self.registry_api_url)] {
            let _ = url::Url::parse(value).into_app_err_with(|| format!("{name} is not a valid URL: '{value}'"))?;
        }

        Ok(())
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    #[must_use]
    pub const fn initial_retry_delay(&self) -> Duration {
        Duration::from_millis(self.initial_retry_delay_ms)
    }

    #[must_use]
    pub const fn url_deadline(&self) -> Duration {
        Duration::from_secs(self.url_deadline_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_matches_reference_policy() {
        let config = AnalysisConfig::default();
        assert_eq!(config.max_retries, 10);
        assert_eq!(config.initial_retry_delay(), Duration::from_secs(1));
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.url_concurrency, 1);
        assert_eq!(config.line_sample_cap, 500);
    }

    #[test]
    fn test_validate_url_concurrency_out_of_range() {
        let config = AnalysisConfig { url_concurrency: 0, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());

        let config = AnalysisConfig { url_concurrency: MAX_URL_CONCURRENCY + 1, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_request_limits() {
        let config = AnalysisConfig { max_concurrent_requests: 0, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());

        let config = AnalysisConfig { line_walk_concurrency: 0, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_pull_request_sample_bounds() {
        let config = AnalysisConfig { pull_request_sample: 0, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());

        let config = AnalysisConfig { pull_request_sample: MAX_PULL_REQUEST_SAMPLE + 1, ..AnalysisConfig::default() };
        assert!(config.validate().is_err());

        let config = AnalysisConfig { pull_request_sample: MAX_PULL_REQUEST_SAMPLE, ..AnalysisConfig::default() };
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_bad_api_url() {
        let config = AnalysisConfig { host_api_url: "not a url".into(), ..AnalysisConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_without_path_uses_defaults() {
        let config = AnalysisConfig::load(None).unwrap();
        assert_eq!(config.host_domain, "github.com");
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url_concurrency = 3\nmax_retries = 2").unwrap();

        let config = AnalysisConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.url_concurrency, 3);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.commit_cap, 500);
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no_such_setting = true").unwrap();

        assert!(AnalysisConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "url_concurrency = 9").unwrap();

        assert!(AnalysisConfig::load(Some(file.path())).is_err());
    }
}
