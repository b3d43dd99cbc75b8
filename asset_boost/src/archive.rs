//! `.azp` resource archives
//!
//! Archives are treated as virtual directories: unpacked into scratch, run
//! through the same pipeline as the sub-tree that contains them, and packed
//! back into the work tree under their original name.

use anyhow::{bail, Context, Result};
use shared_utils::tool_process::run_tool;
use shared_utils::BoostError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

pub const ARCHIVE_EXTENSION: &str = "azp";

pub trait Archiver: Send + Sync {
    /// Extract every entry of `archive` into the existing directory `dest`.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()>;

    /// Create `archive` from the contents of `dir`.
    fn pack(&self, dir: &Path, archive: &Path) -> Result<()>;
}

/// The `azp` command line archiver. It works relative to its current
/// directory: `x <archive>` extracts there, `ar <archive> <entries>` adds
/// entries from there.
#[derive(Debug, Clone)]
pub struct AzpArchiver {
    pub exe: PathBuf,
    pub timeout: Duration,
}

impl Archiver for AzpArchiver {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mut cmd = Command::new(&self.exe);
        cmd.current_dir(dest).arg("x").arg(absolute(archive)?);
        run_tool("azp", &mut cmd, self.timeout)?;
        Ok(())
    }

    fn pack(&self, dir: &Path, archive: &Path) -> Result<()> {
        let entries = top_level_entries(dir)?;
        if entries.is_empty() {
            bail!("nothing to pack in {}", dir.display());
        }
        let mut cmd = Command::new(&self.exe);
        cmd.current_dir(dir)
            .arg("ar")
            .arg(absolute(archive)?)
            .args(entries);
        run_tool("azp", &mut cmd, self.timeout)?;
        Ok(())
    }
}

/// Used when no archiver is installed; every archive is copied unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoArchiver;

impl Archiver for NoArchiver {
    fn unpack(&self, _archive: &Path, _dest: &Path) -> Result<()> {
        Err(BoostError::ToolNotFound("azp".into()).into())
    }

    fn pack(&self, _dir: &Path, _archive: &Path) -> Result<()> {
        Err(BoostError::ToolNotFound("azp".into()).into())
    }
}

/// The archiver runs in another directory, so relative paths would resolve there.
fn absolute(path: &Path) -> Result<PathBuf> {
    std::path::absolute(path).with_context(|| format!("Failed to resolve {}", path.display()))
}

/// Names directly under `dir`, sorted; what a shell `*` would expand to.
fn top_level_entries(dir: &Path) -> Result<Vec<std::ffi::OsString>> {
    let mut names = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .map(|entry| entry.map(|e| e.file_name()))
        .collect::<std::io::Result<Vec<_>>>()?;
    names.retain(|n| !n.to_string_lossy().starts_with('.'));
    names.sort();
    Ok(names)
}
