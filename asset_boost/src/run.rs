//! Whole-run orchestration
//!
//! For every selected sub-tree that has input: take its run lock, then
//! `ensure_backup -> reset_work -> process(backup -> work) -> commit`. A
//! sub-tree that fails before commit is reported as aborted; its backup is
//! intact and the next run picks it up again. Afterwards the shared `_temp`
//! root is removed and, when anything was committed, the game's rendered-item
//! cache is invalidated.

use crate::config::BoostConfig;
use crate::subtree::{Toolchain, TreeProcessor};
use anyhow::{bail, Context, Result};
use shared_utils::{
    check_dangerous_directory, remove_work_root, run_staged, RunLock, RunReport, StagingTriple,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Relative to the base directory (`<game>/Mods/<mod>/Data`).
const RENDERED_CACHE: &str = "../../../RenderedItems";

pub fn run(config: &BoostConfig, tools: &Toolchain) -> Result<RunReport> {
    let started = Instant::now();
    let base = config.base_dir.as_path();

    check_dangerous_directory(base).map_err(anyhow::Error::msg)?;
    if !base.is_dir() {
        bail!("Base directory does not exist: {}", base.display());
    }
    config.validate()?;

    let mut runnable = Vec::new();
    for entry in config.selected_subtrees() {
        let triple = StagingTriple::for_subtree(base, &entry.rel)?;
        if triple.has_input() {
            runnable.push((entry, triple));
        } else {
            warn!(subtree = %entry.rel, path = %triple.source.display(), "Sub-tree missing, skipped");
        }
    }
    if runnable.is_empty() {
        warn!(base = %base.display(), "No sub-tree to process");
        return Ok(RunReport::new(Vec::new(), started.elapsed()));
    }

    let mut trees = Vec::new();
    let mut aborted = Vec::new();
    for (entry, triple) in &runnable {
        info!(subtree = %triple.name, kind = ?entry.kind, "Processing sub-tree");
        let processor = TreeProcessor {
            kind: entry.kind,
            resize: &config.resize,
            float_decimal: config.mesh.float_decimal,
            limits: config.limits,
            show_progress: config.show_progress,
            tools,
        };

        let outcome = RunLock::acquire(base, &triple.name)
            .map_err(anyhow::Error::from)
            .and_then(|_lock| {
                run_staged(triple, |t| {
                    processor.process(&t.name, &t.backup, &t.work, &t.scratch)
                })
            });

        match outcome {
            Ok(report) => trees.push(report),
            Err(e) => {
                error!(subtree = %triple.name, error = %format!("{:#}", e), "Sub-tree aborted");
                aborted.push((triple.name.clone(), format!("{:#}", e)));
            }
        }
    }

    remove_work_root(base)?;

    if trees.is_empty() {
        info!("Nothing committed, rendered item cache left as is");
    } else if !config.keep_rendered_cache {
        invalidate_rendered_cache(base)?;
    }

    Ok(RunReport::new(trees, started.elapsed()).with_aborted(aborted))
}

/// Rename the game's cache of pre-rendered item icons so it is rebuilt
/// from the new textures. Returns the new name when a cache existed.
pub fn invalidate_rendered_cache(base: &Path) -> Result<Option<PathBuf>> {
    let cache = base.join(RENDERED_CACHE);
    if !cache.is_dir() {
        return Ok(None);
    }
    let millis = chrono::Utc::now().timestamp_millis();
    let renamed = cache.with_file_name(format!("RenderedItems_backup_{}", millis));
    std::fs::rename(&cache, &renamed)
        .with_context(|| format!("Failed to rename {}", cache.display()))?;
    info!(from = %cache.display(), to = %renamed.display(), "Rendered item cache invalidated");
    Ok(Some(renamed))
}
