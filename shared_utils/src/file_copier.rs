//! File copying
//!
//! Nothing may go missing from the committed tree: files the pipeline does not
//! transform are copied through unchanged, and assets whose processing failed
//! are salvaged by copying their original bytes to the final location.

use crate::common_utils::ensure_parent_dir_exists;
use crate::task_runner::{ErrorPolicy, TaskRunner};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{error, warn};

#[derive(Debug, Clone, Default)]
pub struct CopyResult {
    pub copied: usize,
    pub bytes: u64,
    pub failed: usize,
    pub errors: Vec<(PathBuf, String)>,
}

/// Copy `source` to `dest`, replacing whatever is at `dest` and creating its parents.
pub fn copy_file(source: &Path, dest: &Path) -> Result<u64> {
    if dest.exists() {
        std::fs::remove_file(dest)
            .with_context(|| format!("Failed to remove existing {}", dest.display()))?;
    }
    ensure_parent_dir_exists(dest)?;
    std::fs::copy(source, dest).with_context(|| {
        format!(
            "Failed to copy file from {} to {}",
            source.display(),
            dest.display()
        )
    })
}

/// Copy every relative path in `files` from `from_root` to `to_root`.
/// Individual failures are counted and logged, never fatal.
pub fn copy_through(
    runner: &TaskRunner,
    label: &str,
    from_root: &Path,
    to_root: &Path,
    files: &[PathBuf],
) -> CopyResult {
    let errors = Mutex::new(Vec::new());
    let on_error = |rel: &PathBuf, e: &anyhow::Error| {
        error!(path = %rel.display(), error = %format!("{:#}", e), "Copy failed");
        errors
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push((rel.clone(), format!("{:#}", e)));
    };

    let copied = runner
        .run(label, files, ErrorPolicy::Recover(&on_error), |rel| {
            copy_file(&from_root.join(rel), &to_root.join(rel)).map(Some)
        })
        .unwrap_or_default();

    let errors = errors.into_inner().unwrap_or_else(|p| p.into_inner());
    CopyResult {
        copied: copied.len(),
        bytes: copied.iter().sum(),
        failed: errors.len(),
        errors,
    }
}

/// Last resort for a failed asset: put the untouched original at its final path.
pub fn copy_on_fail(original: &Path, final_path: &Path) -> bool {
    match copy_file(original, final_path) {
        Ok(_) => {
            warn!(
                source = %original.display(),
                dest = %final_path.display(),
                "Processing failed, original copied unchanged"
            );
            true
        }
        Err(e) => {
            error!(
                source = %original.display(),
                error = %format!("{:#}", e),
                "Salvage copy failed, file will be missing from output"
            );
            false
        }
    }
}
