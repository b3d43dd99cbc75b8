//! Logging
//!
//! One `tracing` subscriber per process with two sinks: a daily-rolling file
//! in the log directory for post-mortem reading of long batch runs, and a
//! colored stderr stream. `RUST_LOG` replaces the default filter.
//!
//! ```no_run
//! use shared_utils::logging::{init_logging, LogConfig};
//!
//! init_logging("asset_boost", LogConfig::default().with_log_dir("logs")).ok();
//! tracing::info!(subtree = "MEDIA", "Sub-tree started");
//! ```

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn, Level};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_KEEP_FILES: usize = 5;

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// System temp dir unless overridden
    pub log_dir: PathBuf,
    /// Rolled log files kept per program
    pub keep_files: usize,
    pub level: Level,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: std::env::temp_dir(),
            keep_files: DEFAULT_KEEP_FILES,
            level: Level::INFO,
        }
    }
}

impl LogConfig {
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = dir.into();
        self
    }

    pub fn with_keep_files(mut self, keep: usize) -> Self {
        self.keep_files = keep;
        self
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }
}

/// Directives used when `RUST_LOG` is unset: the program and this crate at `level`.
fn default_directives(program: &str, level: Level) -> String {
    format!("{program}={level},shared_utils={level}")
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(program: &str, config: LogConfig) -> Result<()> {
    fs::create_dir_all(&config.log_dir)
        .with_context(|| format!("Failed to create log directory {}", config.log_dir.display()))?;

    let appender = RollingFileAppender::new(Rotation::DAILY, &config.log_dir, format!("{program}.log"));
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(program, config.level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(appender)
                .with_ansi(false)
                .with_thread_ids(true)
                .with_line_number(true),
        )
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    let pruned = prune_old_logs(&config.log_dir, program, config.keep_files)?;
    debug!(
        program,
        log_dir = %config.log_dir.display(),
        level = %config.level,
        pruned,
        "Logging initialized"
    );
    Ok(())
}

/// Delete all but the `keep` newest `<program>.log*` files. Returns how many went.
fn prune_old_logs(log_dir: &Path, program: &str, keep: usize) -> Result<usize> {
    let prefix = format!("{program}.log");
    let mut logs: Vec<(SystemTime, PathBuf)> = fs::read_dir(log_dir)
        .with_context(|| format!("Failed to read log directory {}", log_dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|m| m.is_file())?;
            Some((meta.modified().ok()?, entry.path()))
        })
        .collect();

    if logs.len() <= keep {
        return Ok(0);
    }
    logs.sort_by(|a, b| b.0.cmp(&a.0));

    let mut pruned = 0;
    for (_, path) in logs.into_iter().skip(keep) {
        match fs::remove_file(&path) {
            Ok(()) => pruned += 1,
            Err(e) => warn!(path = %path.display(), error = %e, "Could not prune old log file"),
        }
    }
    Ok(pruned)
}

/// One line per finished tool run. Clean exits go to debug since a texture
/// sub-tree spawns thousands of them.
pub fn log_tool_exit(tool: &str, command: &str, exit_code: Option<i32>, stderr: &str, duration: Duration) {
    let secs = duration.as_secs_f64();
    match exit_code {
        Some(0) => debug!(tool, command, secs, "Tool finished"),
        code => warn!(tool, command, secs, exit_code = ?code, stderr = stderr.trim(), "Tool failed"),
    }
}
