use super::LOG_TARGET;
use super::git;
use super::manifest::{MANIFEST_FILE, Manifest};
use super::package_signals::{DependencySummary, Documentation, PackageSignals};
use crate::Result;
use crate::facts::signal::measure;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::fs;
use std::io;
use std::path::Path;

/// README file names recognized at the repository root, in order of preference.
const README_NAMES: &[&str] = &["readme.md", "readme", "readme.txt", "readme.rst"];

/// Gathers signals from a shallow checkout of a repository.
#[derive(Debug, Clone)]
pub struct RegistryCollector {
    http: reqwest::Client,
}

impl RegistryCollector {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().user_agent("netscore").timeout(timeout).build()?;
        Ok(Self { http })
    }

    /// Shallow-clone `repo_url` into `dir`, at `version` when one is known.
    ///
    /// An existing `dir` is taken to be a previous checkout and left alone. A version is tried
    /// as a tag both bare and with a `v` prefix before falling back to the default branch.
    pub async fn materialize(&self, repo_url: &str, dir: &Path, version: Option<&str>) -> Result<()> {
        let target = dir.to_path_buf();
        let reuse = tokio::task::spawn_blocking(move || prepare_checkout_dir(&target))
            .await
            .into_app_err("checkout preparation task panicked")??;

        if reuse {
            log::debug!(target: LOG_TARGET, "Reusing existing checkout at '{}'", dir.display());
            return Ok(());
        }

        let prefixed = version.map(|v| format!("v{v}"));
        let references: Vec<Option<&str>> = version
            .into_iter()
            .map(Some)
            .chain(prefixed.as_deref().map(Some))
            .chain([None])
            .collect();

        let mut last_error = None;
        for reference in references {
            match git::shallow_clone(dir, repo_url, reference).await {
                Ok(()) => {
                    if version.is_some() && reference.is_none() {
                        log::info!(target: LOG_TARGET, "No tag found for version of '{repo_url}', using the default branch");
                    }
                    return Ok(());
                }
                Err(e) => {
                    log::debug!(target: LOG_TARGET, "Clone of '{repo_url}' at {reference:?} failed: {e:#}");
                    remove_dir(dir).await?;
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => bail!("could not clone '{repo_url}'"),
        }
    }

    /// README-derived documentation signals.
    ///
    /// The README is looked up at the root of the checkout first, then fetched from the
    /// repository's web page. When neither works the documentation is reported as absent.
    pub async fn read_documentation(&self, dir: &Path, repo_url: &str) -> Documentation {
        match read_readme_from_checkout(dir).await {
            Ok(Some(text)) => return Documentation::from_readme(&text),
            Ok(None) => log::debug!(target: LOG_TARGET, "No README in the checkout of '{repo_url}'"),
            Err(e) => log::debug!(target: LOG_TARGET, "Could not inspect the checkout of '{repo_url}': {e:#}"),
        }

        let readme_url = format!("{repo_url}#readme");
        match self.fetch_text(&readme_url).await {
            Ok(text) => Documentation::from_readme(&text),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "Could not retrieve README from '{readme_url}': {e:#}");
                Documentation::absent()
            }
        }
    }

    /// Date of the checkout's most recent commit.
    pub async fn read_last_commit_date(&self, dir: &Path) -> Result<DateTime<Utc>> {
        git::last_commit_date(dir).await
    }

    /// Pinning statistics over the manifest's dependencies; a missing or unreadable manifest
    /// yields an empty summary.
    pub async fn analyze_dependencies(&self, dir: &Path) -> DependencySummary {
        match load_manifest(dir).await {
            Ok(manifest) => DependencySummary::new(manifest.dependencies()),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "No usable manifest in '{}': {e:#}", dir.display());
                DependencySummary::empty()
            }
        }
    }

    /// Remove the checkout directory. Failures are logged, never returned.
    pub async fn cleanup(&self, dir: &Path) {
        if let Err(e) = remove_dir(dir).await {
            log::warn!(target: LOG_TARGET, "Could not remove checkout '{}': {e:#}", dir.display());
        }
    }

    /// Materialize the repository into `dir`, collect every checkout signal, then remove `dir`.
    pub async fn run_tasks(&self, repo_url: &str, dir: &Path, version: Option<&str>) -> PackageSignals {
        let mut signals = PackageSignals::empty(repo_url);

        log::info!(target: LOG_TARGET, "Collecting checkout signals for '{repo_url}'");
        if let Err(e) = self.materialize(repo_url, dir, version).await {
            log::info!(target: LOG_TARGET, "Could not check out '{repo_url}': {e:#}");
        }

        let (last_commit, documentation) = tokio::join!(
            measure(LOG_TARGET, "last commit date", self.read_last_commit_date(dir)),
            measure(LOG_TARGET, "documentation", async { Ok(self.read_documentation(dir, repo_url).await) }),
        );

        signals.last_commit = last_commit;
        signals.documentation = documentation;
        signals.dependencies = measure(LOG_TARGET, "dependencies", async { Ok(self.analyze_dependencies(dir).await) }).await;

        self.cleanup(dir).await;
        signals
    }

    async fn fetch_text(&self, url: &str) -> Result<String> {
        let text = self.http.get(url).send().await?.error_for_status()?.text().await?;
        Ok(text)
    }
}

async fn read_readme_from_checkout(dir: &Path) -> Result<Option<String>> {
    let entries = git::root_entries(dir).await?;

    let readme = README_NAMES
        .iter()
        .find_map(|candidate| entries.iter().find(|entry| entry.to_lowercase() == *candidate));

    match readme {
        Some(name) => Ok(Some(git::read_head_file(dir, name).await?)),
        None => Ok(None),
    }
}

async fn load_manifest(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let text = tokio::task::spawn_blocking(move || fs::read_to_string(&path).into_app_err_with(|| format!("reading '{}'", path.display())))
        .await
        .into_app_err("manifest reading task panicked")??;

    Manifest::parse(&text)
}

/// True when `dir` already exists; otherwise creates its parent so a clone can target it.
fn prepare_checkout_dir(dir: &Path) -> Result<bool> {
    if dir.exists() {
        return Ok(true);
    }

    if let Some(parent) = dir.parent() {
        fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
    }

    Ok(false)
}

async fn remove_dir(dir: &Path) -> Result<()> {
    let owned = dir.to_path_buf();
    tokio::task::spawn_blocking(move || remove_dir_if_present(&owned))
        .await
        .into_app_err("directory removal task panicked")?
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).into_app_err_with(|| format!("removing '{}'", dir.display())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::registry::git::test_support::{git_available, init_repo};

    fn collector() -> RegistryCollector {
        RegistryCollector::new(Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_analyze_dependencies() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(
            temp.path().join(MANIFEST_FILE),
            r#"{"dependencies": {"a": "1.0.0", "b": "^1.2.3"}, "devDependencies": {"c": "2.3.x"}}"#,
        )
        .unwrap();

        let summary = collector().analyze_dependencies(temp.path()).await;
        assert_eq!(summary.total, 3);
        assert_eq!(summary.pinned, 1);
        assert!((summary.fraction_pinned - 0.333).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_analyze_dependencies_missing_manifest() {
        let temp = tempfile::tempdir().unwrap();
        let summary = collector().analyze_dependencies(temp.path()).await;
        assert_eq!(summary, DependencySummary::empty());
    }

    #[tokio::test]
    async fn test_analyze_dependencies_unparsable_manifest() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join(MANIFEST_FILE), "{ nope").unwrap();

        let summary = collector().analyze_dependencies(temp.path()).await;
        assert_eq!(summary.total, 0);
        assert!((summary.fraction_pinned - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_materialize_skips_existing_directory() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("marker"), "x").unwrap();

        collector().materialize("https://invalid.invalid/o/r", temp.path(), None).await.unwrap();
        assert!(temp.path().join("marker").exists());
    }

    #[tokio::test]
    async fn test_materialize_creates_missing_parent() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("work").join("0");

        let result = collector().materialize("file:///definitely/not/a/repo", &dir, Some("1.0.0")).await;
        assert!(result.is_err());
        assert!(temp.path().join("work").is_dir());
        assert!(!dir.exists());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let temp = tempfile::tempdir().unwrap();
        let dir = temp.path().join("checkout");
        fs::create_dir_all(dir.join("nested")).unwrap();

        let collector = collector();
        collector.cleanup(&dir).await;
        assert!(!dir.exists());
        collector.cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_run_tasks_on_local_repository() {
        if !git_available() {
            eprintln!("Skipping test: git is not installed");
            return;
        }

        let temp = tempfile::tempdir().unwrap();
        let origin = temp.path().join("origin");
        init_repo(
            &origin,
            &[
                ("Readme.md", "# Demo\nSee docs/ for documentation.\n"),
                (MANIFEST_FILE, r#"{"dependencies": {"left-pad": "1.3.0"}}"#),
            ],
        );

        let url = format!("file://{}", origin.display());
        let checkout = temp.path().join("work").join("0");
        let signals = collector().run_tasks(&url, &checkout, Some("1.0.0")).await;

        let documentation = signals.documentation.value().unwrap();
        assert!(documentation.has_readme);
        assert_eq!(documentation.readme_lines, Some(2));
        assert!(documentation.has_documentation);
        assert!(!documentation.has_examples);

        assert_eq!(signals.last_commit.value().unwrap().to_rfc3339(), "2024-03-01T12:00:00+00:00");

        let dependencies = signals.dependencies.value().unwrap();
        assert_eq!(dependencies.total, 1);
        assert_eq!(dependencies.pinned, 1);

        assert!(!checkout.exists());
    }

    #[tokio::test]
    async fn test_run_tasks_when_clone_fails() {
        let temp = tempfile::tempdir().unwrap();
        let checkout = temp.path().join("missing");
        let signals = collector().run_tasks("file:///definitely/not/a/repo", &checkout, None).await;

        assert!(signals.last_commit.value().is_none());
        assert!(signals.last_commit.latency.is_some());
        assert_eq!(signals.documentation.value(), Some(&Documentation::absent()));
        assert_eq!(signals.dependencies.value(), Some(&DependencySummary::empty()));
    }
}
