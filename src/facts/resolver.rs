//! Maps input URLs to source repositories.
//!
//! Two URL shapes are understood: direct repository links on the configured host, and package
//! pages on the configured registry site. Package pages are resolved through the registry's
//! metadata API, whose `repository` field is normalized into an `https://` URL.

use crate::Result;
use crate::config::AnalysisConfig;
use ohno::{IntoAppError, bail};
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use url::Url;

const LOG_TARGET: &str = "  resolver";

static SCP_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^git@([^:/]+):(.+)$").expect("invalid regex pattern"));

static SHORTHAND_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:(github|gitlab|bitbucket):)?([\w.-]+/[\w.-]+)$").expect("invalid regex pattern"));

/// A source repository an input URL maps to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRepo {
    pub repo_url: String,

    /// Version named by a package-page URL, if any.
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PackageMetadata {
    repository: Option<RepositoryField>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RepositoryField {
    Url(String),
    Object { url: Option<String> },
}

impl RepositoryField {
    fn url(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url),
            Self::Object { url } => url.as_deref(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Resolver {
    client: reqwest::Client,
    host_domain: String,
    registry_api_url: String,
    repo_pattern: Regex,
    package_pattern: Regex,
}

impl Resolver {
    pub fn new(config: &AnalysisConfig) -> Result<Self> {
        let host = regex::escape(&config.host_domain);
        let repo_pattern = Regex::new(&format!(r"^https://(?:www\.)?{host}/([\w.-]+)/([\w.-]+?)(?:\.git)?/?$"))
            .into_app_err("building repository URL pattern")?;

        let site = regex::escape(&config.registry_site);
        let package_pattern = Regex::new(&format!(r"^https://{site}/package/((?:@[\w.-]+/)?[\w.-]+)(?:/v/([^/\s]+))?/?$"))
            .into_app_err("building package URL pattern")?;

        let client = reqwest::Client::builder()
            .user_agent("netscore")
            .timeout(config.request_timeout())
            .build()?;

        Ok(Self {
            client,
            host_domain: config.host_domain.clone(),
            registry_api_url: config.registry_api_url.trim_end_matches('/').to_string(),
            repo_pattern,
            package_pattern,
        })
    }

    /// Map an input URL to a repository URL and optional version.
    ///
    /// Returns `None` when the URL matches neither accepted shape, or when the registry lookup
    /// fails or yields no repository. Never fails otherwise.
    pub async fn resolve(&self, url: &str) -> Option<ResolvedRepo> {
        let url = url.trim();

        if let Some(caps) = self.repo_pattern.captures(url) {
            let repo_url = format!("https://{}/{}/{}", self.host_domain, &caps[1], &caps[2]);
            log::debug!(target: LOG_TARGET, "'{url}' is a repository URL: {repo_url}");
            return Some(ResolvedRepo { repo_url, version: None });
        }

        let Some(caps) = self.package_pattern.captures(url) else {
            log::info!(target: LOG_TARGET, "'{url}' is neither a repository nor a package URL");
            return None;
        };

        let name = &caps[1];
        let version = caps.get(2).map(|m| m.as_str().to_string());

        match self.lookup_repository(name).await {
            Ok(repo_url) => {
                log::debug!(target: LOG_TARGET, "Package '{name}' lives at {repo_url}");
                Some(ResolvedRepo { repo_url, version })
            }
            Err(e) => {
                log::info!(target: LOG_TARGET, "Could not resolve package '{name}': {e:#}");
                None
            }
        }
    }

    async fn lookup_repository(&self, name: &str) -> Result<String> {
        let mut url = Url::parse(&self.registry_api_url).into_app_err("invalid registry API URL")?;
        let _ = url
            .path_segments_mut()
            .map_err(|()| ohno::app_err!("registry API URL cannot have path segments"))?
            .pop_if_empty()
            .push(name);

        let metadata: PackageMetadata = self
            .client
            .get(url.as_str())
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
            .into_app_err_with(|| format!("parsing registry metadata for '{name}'"))?;

        let Some(raw) = metadata.repository.as_ref().and_then(RepositoryField::url) else {
            bail!("registry metadata for '{name}' has no repository URL");
        };

        let repo_url = normalize_repository_url(raw);
        if repo_url.is_empty() {
            bail!("registry metadata for '{name}' has an empty repository URL");
        }

        Ok(repo_url)
    }
}

/// Rewrite the many ways a manifest can spell a repository into a plain `https://` URL.
#[must_use]
pub fn normalize_repository_url(raw: &str) -> String {
    let mut url = raw.trim().trim_start_matches("git+").to_string();

    if let Some(caps) = SHORTHAND_REGEX.captures(&url) {
        let host = match caps.get(1).map(|m| m.as_str()) {
            Some("gitlab") => "gitlab.com",
            Some("bitbucket") => "bitbucket.org",
            _ => "github.com",
        };
        url = format!("https://{host}/{}", &caps[2]);
    } else if let Some(caps) = SCP_REGEX.captures(&url) {
        url = format!("https://{}/{}", &caps[1], &caps[2]);
    } else if let Some(rest) = url.strip_prefix("ssh://git@") {
        url = format!("https://{rest}");
    } else if let Some(rest) = url.strip_prefix("git://") {
        url = format!("https://{rest}");
    }

    let url = url.trim_end_matches('/');
    url.strip_suffix(".git").unwrap_or(url).to_string()
}
