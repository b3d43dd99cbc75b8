use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BoostError {
    #[error("Discovery failed under {path}: {message}")]
    Discovery { path: PathBuf, message: String },

    #[error("Staging step '{operation}' failed for {path}: {source}")]
    Staging {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid staging layout: {0}")]
    Layout(String),

    #[error("Sub-tree is locked by pid {pid} on {hostname} (lock file: {lock_file})")]
    Locked {
        pid: u32,
        hostname: String,
        lock_file: PathBuf,
    },

    #[error("External tool not found: {0}")]
    ToolNotFound(String),

    #[error("{tool} exited with code {code:?}: {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{tool} timed out after {timeout:?}")]
    ToolTimeout { tool: String, timeout: Duration },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BoostError {
    pub fn staging(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Staging {
            operation,
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, BoostError>;
