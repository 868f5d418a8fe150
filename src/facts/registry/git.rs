use super::LOG_TARGET;
use crate::Result;
use chrono::{DateTime, Utc};
use core::time::Duration;
use ohno::{IntoAppError, bail};
use std::path::Path;
use std::process::{Output, Stdio};
use tokio::process::Command;

const GIT_TIMEOUT: Duration = Duration::from_secs(300);

/// Shallow, single-branch clone of `url` into `dest`.
///
/// When `reference` is given only that branch or tag is fetched.
pub async fn shallow_clone(dest: &Path, url: &str, reference: Option<&str>) -> Result<()> {
    let dest_str = dest.to_str().into_app_err("invalid UTF-8 in checkout path")?;
    let start_time = std::time::Instant::now();

    let mut args = vec!["clone", "--depth", "1", "--single-branch"];
    if let Some(reference) = reference {
        args.extend(["--branch", reference]);
    }
    args.extend(["--", url, dest_str]);

    let output = run_git_with_timeout(&args).await?;
    check_git_output(&output, "git clone")?;

    log::debug!(target: LOG_TARGET, "Cloned '{url}' in {:.3}s", start_time.elapsed().as_secs_f64());
    Ok(())
}

/// Date of the most recent commit reachable from `HEAD`.
pub async fn last_commit_date(dir: &Path) -> Result<DateTime<Utc>> {
    let dir_str = dir.to_str().into_app_err("invalid UTF-8 in checkout path")?;

    // %aI = author date, strict ISO 8601
    let output = run_git_with_timeout(&["-C", dir_str, "log", "-1", "--format=%aI"]).await?;
    check_git_output(&output, "git log")?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let date = stdout.trim();
    if date.is_empty() {
        bail!("repository at '{}' has no commits", dir.display());
    }

    let parsed = DateTime::parse_from_rfc3339(date).into_app_err_with(|| format!("invalid commit date '{date}'"))?;
    Ok(parsed.with_timezone(&Utc))
}

/// Names of the entries at the root of the `HEAD` tree.
pub async fn root_entries(dir: &Path) -> Result<Vec<String>> {
    let dir_str = dir.to_str().into_app_err("invalid UTF-8 in checkout path")?;

    let output = run_git_with_timeout(&["-C", dir_str, "ls-tree", "--name-only", "HEAD"]).await?;
    check_git_output(&output, "git ls-tree")?;

    Ok(String::from_utf8_lossy(&output.stdout).lines().map(str::to_string).collect())
}

/// Contents of a file from the `HEAD` tree.
pub async fn read_head_file(dir: &Path, name: &str) -> Result<String> {
    let dir_str = dir.to_str().into_app_err("invalid UTF-8 in checkout path")?;
    let object = format!("HEAD:{name}");

    let output = run_git_with_timeout(&["-C", dir_str, "show", &object]).await?;
    check_git_output(&output, "git show")?;

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn check_git_output(output: &Output, operation: &str) -> Result<()> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("{operation} failed: {}", stderr.trim());
    }
    Ok(())
}

async fn run_git_with_timeout(args: &[&str]) -> Result<Output> {
    let child = Command::new("git")
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .into_app_err("could not spawn git command")?;

    match tokio::time::timeout(GIT_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(e)) => Err(e).into_app_err_with(|| format!("'git {}' failed to run", args.join(" "))),
        Err(_) => {
            bail!("'git {}' timed out after {} seconds", args.join(" "), GIT_TIMEOUT.as_secs());
        }
    }
}
