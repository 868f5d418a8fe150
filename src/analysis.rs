//! Batch evaluation of package URLs.
//!
//! [`Analyzer::run_analysis`] validates the host credential once, then evaluates each URL:
//! resolve it to a repository, run the host and checkout collectors side by side, merge their
//! signals, and score the result. Scores come back in input order, one per URL.

use crate::Result;
use crate::config::AnalysisConfig;
use crate::facts::host::{Client, Credential, HostCollector, HostLimits};
use crate::facts::registry::RegistryCollector;
use crate::facts::resilient_http::BackoffPolicy;
use crate::facts::throttler::Throttler;
use crate::facts::{CombinedSignals, ResolvedRepo, Resolver};
use crate::metrics::Score;
use chrono::Utc;
use core::sync::atomic::{AtomicU64, Ordering};
use futures_util::StreamExt;
use futures_util::stream;
use ohno::EnrichableExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::watch;

const LOG_TARGET: &str = "  analysis";

/// Cooperative cancellation for an [`Analyzer`].
///
/// Cancelling makes the URL currently being evaluated, and every URL after it, yield an
/// all-zero score. Cancellation is permanent for the analyzer it came from.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.sender.send_replace(true);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Evaluates batches of package URLs.
#[derive(Debug)]
pub struct Analyzer {
    config: AnalysisConfig,
    resolver: Resolver,
    host: HostCollector,
    registry: RegistryCollector,
    cancel: CancelHandle,
    runs: AtomicU64,
}

impl Analyzer {
    /// Build an analyzer from `config`, authenticating to the host API with `credential`.
    pub fn new(config: AnalysisConfig, credential: impl Into<String>) -> Result<Self> {
        config.validate()?;

        let policy = BackoffPolicy {
            max_retries: config.max_retries,
            initial_delay: config.initial_retry_delay(),
        };

        let client = Client::new(
            Credential::new(credential),
            config.host_api_url.as_str(),
            config.request_timeout(),
            policy,
            Throttler::new(config.max_concurrent_requests),
        )?;

        let limits = HostLimits {
            line_sample_cap: config.line_sample_cap,
            line_walk_concurrency: config.line_walk_concurrency,
            commit_cap: config.commit_cap,
            pull_request_sample: config.pull_request_sample,
        };

        let (sender, _) = watch::channel(false);

        Ok(Self {
            resolver: Resolver::new(&config)?,
            host: HostCollector::new(client, limits),
            registry: RegistryCollector::new(config.request_timeout())?,
            cancel: CancelHandle { sender: Arc::new(sender) },
            runs: AtomicU64::new(0),
            config,
        })
    }

    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Score every URL in `urls`, preserving order.
    ///
    /// Fails only when the host API credential is missing or rejected, in which case no URL is
    /// evaluated. Any other problem degrades the affected scores to 0.
    pub async fn run_analysis(&self, urls: &[String]) -> Result<Vec<Score>> {
        if let Err(e) = self.host.client().validate_credential().await {
            log::error!(target: LOG_TARGET, "Host API credential check failed: {e:#}");
            return Err(e.enrich_with(|| "validating the host API credential".to_string()));
        }

        let run = self.runs.fetch_add(1, Ordering::Relaxed);
        log::info!(target: LOG_TARGET, "Evaluating {} URL(s)", urls.len());

        let scores = stream::iter(urls.iter().enumerate())
            .map(|(index, url)| self.evaluate(url, self.checkout_dir(run, index)))
            .buffered(self.config.url_concurrency)
            .collect()
            .await;

        Ok(scores)
    }

    async fn evaluate(&self, url: &str, dir: PathBuf) -> Score {
        if self.cancel.is_cancelled() {
            log::debug!(target: LOG_TARGET, "Skipping '{url}': analysis was cancelled");
            return Score::unavailable(url, Utc::now());
        }

        let Some(resolved) = self.resolver.resolve(url).await else {
            return Score::unavailable(url, Utc::now());
        };

        log::info!(target: LOG_TARGET, "Evaluating '{url}' from {}", resolved.repo_url);

        let mut cancelled = self.cancel.sender.subscribe();
        let deadline = self.config.url_deadline();

        let signals = tokio::select! {
            result = tokio::time::timeout(deadline, self.collect(&resolved, &dir)) => {
                result.unwrap_or_else(|_| {
                    log::warn!(target: LOG_TARGET, "Evaluation of '{url}' exceeded its {}s deadline", deadline.as_secs());
                    CombinedSignals::empty(&resolved.repo_url)
                })
            }
            () = wait_for_cancel(&mut cancelled) => {
                log::info!(target: LOG_TARGET, "Evaluation of '{url}' was cancelled");
                CombinedSignals::empty(&resolved.repo_url)
            }
        };

        // collectors clean up after themselves, except when interrupted
        self.registry.cleanup(&dir).await;

        Score::from_signals(url, &signals, Utc::now())
    }

    /// Run both collectors for one repository and merge their signals.
    pub async fn collect(&self, resolved: &ResolvedRepo, dir: &Path) -> CombinedSignals {
        let (repo, package) = tokio::join!(
            self.host.run_tasks(&resolved.repo_url),
            self.registry.run_tasks(&resolved.repo_url, dir, resolved.version.as_deref()),
        );

        CombinedSignals::merge(repo, package)
    }

    fn checkout_dir(&self, run: u64, index: usize) -> PathBuf {
        self.config.work_dir.join(format!("{}-{run}-{index}", std::process::id()))
    }
}

async fn wait_for_cancel(receiver: &mut watch::Receiver<bool>) {
    if receiver.wait_for(|cancelled| *cancelled).await.is_err() {
        core::future::pending::<()>().await;
    }
}
