//! Directory staging: `source` / `backup` / `work`
//!
//! Every named sub-tree of a base directory gets three slots:
//!
//! ```text
//! <base>/<rel>                 source  (live tree the game reads)
//! <base>/_backup/<rel>         backup  (pristine input, created once)
//! <base>/_temp/<rel>           work    (output of the current run)
//! <base>/_temp/.scratch/<rel>  scratch (per-run temporaries, never committed)
//! ```
//!
//! A run is `ensure_backup -> reset_work -> pipeline(backup -> work) -> commit`.
//! Anything failing before `commit` leaves `backup` untouched, so the run can
//! simply be repeated.

use crate::errors::{BoostError, Result};
use crate::run_lock::held_locks;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

pub const BACKUP_ROOT: &str = "_backup";
pub const WORK_ROOT: &str = "_temp";
pub const SCRATCH_DIR: &str = ".scratch";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagingTriple {
    /// Sub-tree path relative to the base, `/`-separated
    pub name: String,
    pub source: PathBuf,
    pub backup: PathBuf,
    pub work: PathBuf,
    pub scratch: PathBuf,
}

impl StagingTriple {
    /// Compose the slots for `rel` (e.g. `"ACTORS/ITEMS"`) under `base`.
    pub fn for_subtree(base: &Path, rel: &str) -> Result<Self> {
        let rel_path = validate_subtree_name(rel)?;
        let work_root = base.join(WORK_ROOT);
        Ok(Self {
            name: rel.trim_matches('/').to_string(),
            source: base.join(&rel_path),
            backup: base.join(BACKUP_ROOT).join(&rel_path),
            work: work_root.join(&rel_path),
            scratch: work_root.join(SCRATCH_DIR).join(&rel_path),
        })
    }

    /// A sub-tree can run when either its live tree or its backup exists.
    pub fn has_input(&self) -> bool {
        self.backup.is_dir() || self.source.is_dir()
    }

    /// Move `source` to `backup` unless a backup already exists.
    ///
    /// Returns `true` when the move happened. An existing backup is the
    /// authoritative input and is never touched.
    pub fn ensure_backup(&self) -> Result<bool> {
        if self.backup.exists() {
            debug!(subtree = %self.name, backup = %self.backup.display(), "Backup present, reusing");
            return Ok(false);
        }
        if !self.source.is_dir() {
            return Err(BoostError::staging(
                "ensure_backup",
                &self.source,
                std::io::Error::new(std::io::ErrorKind::NotFound, "source directory missing"),
            ));
        }
        create_parent(&self.backup, "ensure_backup")?;
        fs::rename(&self.source, &self.backup)
            .map_err(|e| BoostError::staging("ensure_backup", &self.source, e))?;
        info!(subtree = %self.name, backup = %self.backup.display(), "Backup created");
        Ok(true)
    }

    /// Drop whatever a previous run left in `work`/`scratch` and recreate them empty.
    pub fn reset_work(&self) -> Result<()> {
        for dir in [&self.work, &self.scratch] {
            if dir.exists() {
                debug!(subtree = %self.name, dir = %dir.display(), "Removing stale directory");
                fs::remove_dir_all(dir).map_err(|e| BoostError::staging("reset_work", dir, e))?;
            }
            fs::create_dir_all(dir).map_err(|e| BoostError::staging("reset_work", dir, e))?;
        }
        Ok(())
    }

    /// Replace `source` with the contents of `work`, then drop the leftovers.
    pub fn commit(&self) -> Result<()> {
        if !self.work.is_dir() {
            return Err(BoostError::staging(
                "commit",
                &self.work,
                std::io::Error::new(std::io::ErrorKind::NotFound, "work directory missing"),
            ));
        }
        if self.source.exists() {
            fs::remove_dir_all(&self.source)
                .map_err(|e| BoostError::staging("commit", &self.source, e))?;
        }
        create_parent(&self.source, "commit")?;
        fs::rename(&self.work, &self.source)
            .map_err(|e| BoostError::staging("commit", &self.work, e))?;
        if self.scratch.exists() {
            fs::remove_dir_all(&self.scratch)
                .map_err(|e| BoostError::staging("commit", &self.scratch, e))?;
        }
        info!(subtree = %self.name, source = %self.source.display(), "Committed");
        Ok(())
    }
}

/// Bracket `pipeline` with the staging protocol.
pub fn run_staged<R, F>(triple: &StagingTriple, pipeline: F) -> anyhow::Result<R>
where
    F: FnOnce(&StagingTriple) -> anyhow::Result<R>,
{
    triple.ensure_backup()?;
    triple.reset_work()?;
    let out = pipeline(triple)?;
    triple.commit()?;
    Ok(out)
}

/// Remove `<base>/_temp` once every sub-tree is done. Kept while any run
/// lock is still held in it. Returns whether the directory was removed.
pub fn remove_work_root(base: &Path) -> Result<bool> {
    let root = base.join(WORK_ROOT);
    if !root.exists() {
        return Ok(false);
    }
    let held = held_locks(base);
    if held > 0 {
        warn!(root = %root.display(), held, "Run locks still held, keeping work root");
        return Ok(false);
    }
    fs::remove_dir_all(&root).map_err(|e| BoostError::staging("cleanup", &root, e))?;
    debug!(root = %root.display(), "Work root removed");
    Ok(true)
}

fn create_parent(path: &Path, operation: &'static str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| BoostError::staging(operation, parent, e))?;
    }
    Ok(())
}

fn validate_subtree_name(rel: &str) -> Result<PathBuf> {
    let trimmed = rel.trim_matches('/');
    if trimmed.is_empty() {
        return Err(BoostError::Layout("sub-tree name is empty".to_string()));
    }
    let path = PathBuf::from(trimmed);
    let mut components = path.components().peekable();
    if let Some(Component::Normal(first)) = components.peek() {
        let first = first.to_string_lossy();
        if first == BACKUP_ROOT || first == WORK_ROOT {
            return Err(BoostError::Layout(format!(
                "sub-tree '{}' is inside a reserved directory",
                rel
            )));
        }
    }
    for component in components {
        match component {
            Component::Normal(part) if !part.to_string_lossy().starts_with('.') => {}
            _ => {
                return Err(BoostError::Layout(format!(
                    "sub-tree '{}' must be a plain relative path",
                    rel
                )))
            }
        }
    }
    Ok(path)
}
