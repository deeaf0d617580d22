//! Shared logging utilities for Deeplinker binaries.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub const DEFAULT_LOG_FILTER: &str = "deeplinker=info,deeplinker_resolver=info,deeplinker_store=info,deeplinker_handoff=info,tower_http=info";

/// Logging configuration shared by Deeplinker binaries.
pub struct LogConfig<'a> {
    pub app_name: &'a str,
    /// Mirror the file filter on stderr instead of warnings only.
    pub verbose: bool,
    /// Command prints machine-readable output; keep stderr to errors.
    pub quiet: bool,
    /// Overrides `<home>/logs`.
    pub log_dir: Option<PathBuf>,
}

/// Initialize tracing with a daily rolling file writer and stderr output.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the process.
pub fn init_logging(config: LogConfig<'_>) -> Result<WorkerGuard> {
    let log_dir = match config.log_dir {
        Some(dir) => dir,
        None => deeplinker_protocol::paths::default_logs_dir(),
    };
    ensure_dir(&log_dir)?;

    let file_appender =
        tracing_appender::rolling::daily(&log_dir, format!("{}.log", sanitize_name(config.app_name)));
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let file_filter = env_filter();
    let console_filter = console_filter(config.verbose, config.quiet);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

fn console_filter(verbose: bool, quiet: bool) -> EnvFilter {
    if quiet {
        EnvFilter::new("error")
    } else if verbose {
        env_filter()
    } else {
        EnvFilter::new("warn,deeplinker=info")
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create logs directory: {}", dir.display()))
}

fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|ch| if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' { ch } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("deeplinker"), "deeplinker");
        assert_eq!(sanitize_name("dl server/1"), "dl_server_1");
    }

    #[test]
    fn test_ensure_dir_creates_nested() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("logs");
        ensure_dir(&nested).unwrap();
        assert!(nested.is_dir());
    }
}
