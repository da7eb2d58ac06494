//! Log sinks: human-readable on stderr, plain text appended to a file.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Where failures are written when logging is not up yet.
pub const STARTUP_ERROR_LOG: &str = "article-harvest-startup-error.log";

/// Install the global subscriber. `RUST_LOG` wins over `level`.
pub fn init(level: &str, log_file: &Path) -> Result<()> {
    if let Some(dir) = log_file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create log directory {}", dir.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("failed to install log subscriber")?;
    Ok(())
}

/// Record a failure that happened before [`init`] succeeded.
pub fn write_startup_failure(dir: &Path, error: &anyhow::Error) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(STARTUP_ERROR_LOG))?;
    writeln!(
        file,
        "[{}][ERROR]: {error:#}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    )
}
