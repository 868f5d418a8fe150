//! Score npm packages and GitHub repositories for trustworthiness.
//!
//! # Usage
//!
//! ```bash
//! export GITHUB_TOKEN=ghp_xxxxxxxxxxxxxxxxxxxx
//! netscore urls.txt
//! ```
//!
//! The input file holds one URL per line; blank lines are ignored. Each URL is either a
//! repository (`https://github.com/owner/repo`) or a package page
//! (`https://www.npmjs.com/package/name`). One JSON object is printed per URL, in input order:
//!
//! ```json
//! {"URL":"https://github.com/lodash/lodash","NetScore":0.82,"NetScoreLatency":3.104,...}
//! ```
//!
//! URLs that cannot be evaluated still produce a line, with every score at 0.
//!
//! # Exit codes
//!
//! - `0`: every URL was scored
//! - `1`: the GitHub token is missing or was rejected, or the input could not be read
//!
//! # Configuration
//!
//! Pass `--config netscore.toml` to override defaults such as retry behavior or sampling caps:
//!
//! ```toml
//! request_timeout_secs = 10
//! max_retries = 5
//! url_concurrency = 2
//! ```

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, ValueEnum};
use netscore::config::AnalysisConfig;
use netscore::{Analyzer, Result};
use ohno::IntoAppError;
use std::fs::File;
use std::io::{Write, stdout};
use std::path::{Path, PathBuf};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    /// No logging output
    None,

    /// Only error messages
    Error,

    /// Warning and error messages
    Warn,

    /// Info, warning, and error messages
    Info,

    /// Debug, info, warning, and error messages
    Debug,

    /// Trace, debug, info, warning, and error messages
    Trace,
}

#[derive(Parser, Debug)]
#[command(name = "netscore", version, author, long_about = None)]
#[command(about = "Score open-source packages for trustworthiness")]
#[command(styles = CLAP_STYLES)]
struct Args {
    /// File with one package or repository URL per line
    #[arg(value_name = "URL_FILE")]
    url_file: PathBuf,

    /// GitHub token used for API access
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    github_token: String,

    /// Path to a TOML configuration file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of URLs evaluated at the same time
    #[arg(long, value_name = "COUNT")]
    concurrency: Option<usize>,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    log_level: LogLevel,

    /// Write diagnostic output to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.log_level, args.log_file.as_deref())?;

    let mut config = AnalysisConfig::load(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        config.url_concurrency = concurrency;
    }

    let urls = read_urls(&args.url_file)?;
    let analyzer = Analyzer::new(config, args.github_token)?;

    let cancel = analyzer.cancel_handle();
    drop(tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, remaining URLs will score 0");
            cancel.cancel();
        }
    }));

    let scores = analyzer.run_analysis(&urls).await?;

    let mut out = stdout().lock();
    for score in &scores {
        let line = serde_json::to_string(score).into_app_err("serializing a score")?;
        writeln!(out, "{line}").into_app_err("writing to stdout")?;
    }

    out.flush().into_app_err("writing to stdout")
}

fn read_urls(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path).into_app_err_with(|| format!("reading URL file '{}'", path.display()))?;

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

fn init_logging(log_level: LogLevel, log_file: Option<&Path>) -> Result<()> {
    let level = match log_level {
        LogLevel::None => return Ok(()),
        LogLevel::Error => "error",
        LogLevel::Warn => "warn",
        LogLevel::Info => "info",
        LogLevel::Debug => "debug",
        LogLevel::Trace => "trace",
    };

    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    let mut builder = env_logger::Builder::from_env(env);

    _ = builder
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(matches!(log_level, LogLevel::Debug | LogLevel::Trace));

    if let Some(path) = log_file {
        let file = File::create(path).into_app_err_with(|| format!("creating log file '{}'", path.display()))?;
        _ = builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}
