use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Signature read of {path} returned {read} bytes, need {needed}")]
    Truncated {
        path: PathBuf,
        read: usize,
        needed: usize,
    },

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to repair DDS header of {path}: {message}")]
    Repair { path: PathBuf, message: String },

    #[error("Failed to probe {path}: {message}")]
    Probe { path: PathBuf, message: String },

    #[error("Invalid settings: {0}")]
    Settings(String),
}

pub type Result<T> = std::result::Result<T, AssetError>;
