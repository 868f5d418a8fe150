//! Retry with exponential backoff for host API requests.
//!
//! Every host API read goes through [`exponential_backoff`]. Responses are classified by
//! [`classify_response`] so that transient failures (network errors, 5xx, rate limiting) are
//! retried while permanent ones (other 4xx) fail immediately.

use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::EnrichableExt;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, RETRY_AFTER};

const LOG_TARGET: &str = "     retry";

/// Longest we are willing to wait for a rate limit window to reset.
pub const MAX_RATE_LIMIT_WAIT: Duration = Duration::from_secs(3600);

/// How many times to retry and how long to wait before the first retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_retries: 10,
            initial_delay: Duration::from_secs(1),
        }
    }
}

/// Why a single attempt failed.
#[derive(Debug)]
pub enum Failure {
    /// Worth retrying. `retry_after` is a server-requested minimum wait.
    Transient {
        error: ohno::AppError,
        retry_after: Option<Duration>,
    },

    /// Retrying cannot help.
    Permanent(ohno::AppError),
}

impl Failure {
    #[must_use]
    pub const fn transient(error: ohno::AppError) -> Self {
        Self::Transient { error, retry_after: None }
    }
}

/// Rate limit information from response headers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    pub remaining: usize,
    pub reset_at: DateTime<Utc>,
}

/// Run `request_fn` until it succeeds, fails permanently, or the retry budget is spent.
///
/// The wait starts at `policy.initial_delay` and doubles after each failed attempt. A
/// server-requested wait longer than the current delay takes precedence for that attempt.
pub async fn exponential_backoff<T, F, Fut>(policy: BackoffPolicy, what: &str, mut request_fn: F) -> crate::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let mut delay = policy.initial_delay;
    let mut retries = 0;

    loop {
        match request_fn().await {
            Ok(value) => return Ok(value),
            Err(Failure::Permanent(error)) => return Err(error),
            Err(Failure::Transient { error, retry_after }) => {
                if retries >= policy.max_retries {
                    log::warn!(target: LOG_TARGET, "Giving up on {what} after {retries} retries: {error:#}");
                    return Err(error.enrich_with(|| format!("{what} failed after {retries} retries")));
                }

                let wait = retry_after.map_or(delay, |requested| requested.max(delay));
                log::debug!(target: LOG_TARGET, "Retrying {what} in {}ms (retry {}): {error:#}", wait.as_millis(), retries + 1);

                tokio::time::sleep(wait).await;
                delay = delay.saturating_mul(2);
                retries += 1;
            }
        }
    }
}

/// Classify an HTTP response for retry purposes.
///
/// Successful responses pass through. Network errors, 5xx, 429, and 403 responses carrying a
/// `Retry-After` header or an exhausted rate limit are transient. Everything else is permanent.
pub fn classify_response(result: reqwest::Result<reqwest::Response>, now: DateTime<Utc>) -> Result<reqwest::Response, Failure> {
    let resp = match result {
        Ok(resp) => resp,
        Err(e) => return Err(Failure::transient(e.into())),
    };

    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let headers = resp.headers();
    let retry_after = parse_retry_after(headers);
    let rate_limit_wait = extract_rate_limit_from_headers(headers)
        .filter(|info| info.remaining == 0)
        .map(|info| wait_until(info.reset_at, now));

    let transient = status.is_server_error()
        || status == StatusCode::TOO_MANY_REQUESTS
        || (status == StatusCode::FORBIDDEN && (retry_after.is_some() || rate_limit_wait.is_some()));

    let error = match resp.error_for_status() {
        Ok(resp) => ohno::app_err!("unexpected status {} from '{}'", resp.status(), resp.url()),
        Err(e) => e.into(),
    };

    if transient {
        Err(Failure::Transient {
            error,
            retry_after: retry_after.or(rate_limit_wait),
        })
    } else {
        Err(Failure::Permanent(error))
    }
}

/// Parse the `Retry-After` header value as seconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let secs = headers.get(RETRY_AFTER)?.to_str().ok()?.parse::<u64>().ok()?;
    Some(Duration::from_secs(secs).min(MAX_RATE_LIMIT_WAIT))
}

/// Extract rate limit information from API response headers
pub fn extract_rate_limit_from_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let remaining = headers.get("x-ratelimit-remaining")?.to_str().ok()?.parse::<usize>().ok()?;
    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    Some(RateLimitInfo { remaining, reset_at })
}

fn wait_until(reset_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (reset_at - now).to_std().unwrap_or_default().min(MAX_RATE_LIMIT_WAIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use ohno::app_err;
    use reqwest::header::HeaderValue;

    const FAST: BackoffPolicy = BackoffPolicy {
        max_retries: 3,
        initial_delay: Duration::from_millis(1),
    };

    #[tokio::test]
    async fn test_backoff_returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = exponential_backoff(FAST, "op", || {
            let _ = calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, Failure>(7) }
        })
        .await
        .unwrap();

        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = exponential_backoff(FAST, "op", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(Failure::transient(app_err!("flaky")))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_backoff_gives_up_after_max_retries() {
        let calls = AtomicU32::new(0);
        let result: crate::Result<()> = exponential_backoff(FAST, "op", || {
            let _ = calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure::transient(app_err!("down"))) }
        })
        .await;

        assert!(result.is_err());
        // one initial attempt plus three retries
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_backoff_does_not_retry_permanent() {
        let calls = AtomicU32::new(0);
        let result: crate::Result<()> = exponential_backoff(FAST, "op", || {
            let _ = calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Failure::Permanent(app_err!("not found"))) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_backoff_delay_doubles() {
        let policy = BackoffPolicy {
            max_retries: 3,
            initial_delay: Duration::from_millis(20),
        };

        let start = std::time::Instant::now();
        let _: crate::Result<()> = exponential_backoff(policy, "op", || async { Err(Failure::transient(app_err!("down"))) }).await;

        // 20 + 40 + 80
        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[test]
    fn test_extract_rate_limit_from_headers() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("4999"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        let rate_limit = extract_rate_limit_from_headers(&headers).unwrap();

        assert_eq!(rate_limit.remaining, 4999);
        assert_eq!(rate_limit.reset_at.timestamp(), 1_704_067_200);
    }

    #[test]
    fn test_extract_rate_limit_missing_headers() {
        assert!(extract_rate_limit_from_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_extract_rate_limit_invalid_remaining() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert("x-ratelimit-remaining", HeaderValue::from_static("invalid"));
        let _ = headers.insert("x-ratelimit-reset", HeaderValue::from_static("1704067200"));

        assert!(extract_rate_limit_from_headers(&headers).is_none());
    }

    #[test]
    fn test_parse_retry_after_is_capped() {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(RETRY_AFTER, HeaderValue::from_static("999999"));
        assert_eq!(parse_retry_after(&headers), Some(MAX_RATE_LIMIT_WAIT));
    }

    #[test]
    fn test_wait_until_past_reset_is_zero() {
        let now = DateTime::from_timestamp(2_000, 0).unwrap();
        let reset = DateTime::from_timestamp(1_000, 0).unwrap();
        assert_eq!(wait_until(reset, now), Duration::ZERO);
    }

    #[test]
    fn test_wait_until_future_reset() {
        let now = DateTime::from_timestamp(1_000, 0).unwrap();
        let reset = DateTime::from_timestamp(1_030, 0).unwrap();
        assert_eq!(wait_until(reset, now), Duration::from_secs(30));
    }
}
