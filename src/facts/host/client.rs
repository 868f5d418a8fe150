//! Repository host REST API client
//!
//! Thin wrapper over `reqwest` that adds bearer authentication, a per-request timeout, the
//! shared request [`Throttler`], and exponential backoff on transient failures.

use super::LOG_TARGET;
use crate::Result;
use crate::facts::resilient_http::{self, BackoffPolicy, Failure};
use crate::facts::throttler::Throttler;
use crate::facts::RepoSpec;
use chrono::Utc;
use core::fmt::{Debug, Formatter};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, LINK};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;

const JSON_MEDIA_TYPE: &str = "application/vnd.github.v3+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.raw+json";

/// Bearer credential for the host API. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Debug for Credential {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// Repository summary; only the fields we need
#[derive(Debug, Deserialize)]
pub struct Repository {
    pub open_issues_count: u64,
}

/// One entry of a directory listing from the contents endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub download_url: Option<String>,
}

/// Pull request reference from the pull request list
#[derive(Debug, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
}

/// One changed file of a pull request
#[derive(Debug, Deserialize)]
pub struct PullRequestFile {
    #[serde(default)]
    pub additions: u64,
}

/// Host API client
#[derive(Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
    credential: Credential,
    throttler: Arc<Throttler>,
    policy: BackoffPolicy,
}

impl Debug for Client {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url)
            .field("credential", &self.credential)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Create a client authenticating with `credential` against the API rooted at `base_url`
    pub fn new(
        credential: Credential,
        base_url: impl Into<String>,
        timeout: Duration,
        policy: BackoffPolicy,
        throttler: Arc<Throttler>,
    ) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static(JSON_MEDIA_TYPE));

        if !credential.is_empty() {
            let mut auth_val =
                HeaderValue::from_str(&format!("Bearer {}", credential.0.trim())).into_app_err("credential is not a valid header value")?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent("netscore")
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credential,
            throttler,
            policy,
        })
    }

    /// API URL of a repository, optionally followed by a sub-path such as `/commits?page=1`
    #[must_use]
    pub fn repo_url(&self, spec: &RepoSpec, suffix: &str) -> String {
        format!("{}/repos/{}/{}{suffix}", self.base_url, spec.owner(), spec.repo())
    }

    /// Confirm the credential is accepted by the host.
    pub async fn validate_credential(&self) -> Result<()> {
        if self.credential.is_empty() {
            bail!("no host API credential was provided");
        }

        let url = format!("{}/rate_limit", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .into_app_err("could not reach the host API to validate the credential")?;

        if !resp.status().is_success() {
            bail!("host API rejected the credential (status {})", resp.status());
        }

        Ok(())
    }

    /// Single GET without retries; true on a successful status.
    pub async fn probe(&self, url: &str) -> bool {
        let _permit = self.throttler.acquire().await;

        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => true,
            Ok(resp) => {
                log::debug!(target: LOG_TARGET, "Probe of '{url}' returned status {}", resp.status());
                false
            }
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Probe of '{url}' failed: {e:#}");
                false
            }
        }
    }

    /// GET with backoff, returning the response for header inspection
    pub async fn get(&self, url: &str) -> Result<reqwest::Response> {
        resilient_http::exponential_backoff(self.policy, url, || self.send_once(url, None)).await
    }

    /// GET with backoff and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.get(url)
            .await?
            .json()
            .await
            .into_app_err_with(|| format!("decoding response from '{url}'"))
    }

    /// GET a page of a paginated list, reporting whether the `Link` header advertises a next page
    pub async fn get_page<T: DeserializeOwned>(&self, url: &str) -> Result<(Vec<T>, bool)> {
        let resp = self.get(url).await?;
        let has_next = has_next_page(resp.headers());
        let items = resp.json().await.into_app_err_with(|| format!("decoding response from '{url}'"))?;
        Ok((items, has_next))
    }

    /// GET with backoff, asking for the raw file body rather than its JSON envelope
    pub async fn get_raw(&self, url: &str) -> Result<String> {
        resilient_http::exponential_backoff(self.policy, url, || self.send_once(url, Some(RAW_MEDIA_TYPE)))
            .await?
            .text()
            .await
            .into_app_err_with(|| format!("reading body of '{url}'"))
    }

    async fn send_once(&self, url: &str, accept: Option<&'static str>) -> Result<reqwest::Response, Failure> {
        if self.throttler.is_paused() {
            log::debug!(target: LOG_TARGET, "Waiting for the rate limit pause to end before requesting '{url}'");
        }

        let _permit = self.throttler.acquire().await;

        let mut request = self.client.get(url);
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let result = resilient_http::classify_response(request.send().await, Utc::now());

        if let Err(Failure::Transient {
            retry_after: Some(wait), ..
        }) = &result
            && self.throttler.pause_for(*wait)
        {
            log::warn!(target: LOG_TARGET, "Rate limited by the host API, pausing requests for {}s", wait.as_secs());
        }

        result
    }
}

fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get(LINK)
        .and_then(|link| link.to_str().ok())
        .is_some_and(|link_str| link_str.contains(r#"rel="next""#))
}
