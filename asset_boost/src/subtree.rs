//! Sub-tree processing
//!
//! Runs the pipeline for one sub-tree (textures or meshes) from a read-only
//! source to a work directory, then handles the `.azp` archives found in it
//! one at a time: each is unpacked into scratch, processed with the same
//! pipeline (recursively, archives may nest) and packed into the work tree.
//! A failing archive is copied unchanged.

use crate::archive::{Archiver, ARCHIVE_EXTENSION};
use crate::asset::TreeRoots;
use crate::converters::TextureConverter;
use crate::mesh::MeshPipeline;
use crate::probe::ImageProbe;
use crate::resize::ResizeSettings;
use crate::texture_pipeline::TexturePipeline;
use anyhow::{Context, Result};
use serde::Serialize;
use shared_utils::common_utils::{ensure_parent_dir_exists, has_extension, to_slash_path};
use shared_utils::{copy_on_fail, discover_files, ConcurrencyLimits, SizeSummary, TaskRunner, TreeReport};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Unpacked archives live here, inside the sub-tree's scratch directory.
const ARCHIVE_AREA: &str = ".azp";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Textures,
    Meshes,
}

/// External tool adapters shared by every sub-tree of a run.
pub struct Toolchain<'a> {
    /// Texture strategies in fallback order
    pub converters: Vec<&'a dyn TextureConverter>,
    pub probe: &'a dyn ImageProbe,
    pub archiver: &'a dyn Archiver,
}

pub struct TreeProcessor<'a> {
    pub kind: TreeKind,
    pub resize: &'a ResizeSettings,
    pub float_decimal: u32,
    pub limits: ConcurrencyLimits,
    pub show_progress: bool,
    pub tools: &'a Toolchain<'a>,
}

impl TreeProcessor<'_> {
    /// Process everything under `source` into `work`. `scratch` is an
    /// exclusive temporary area for this call.
    pub fn process(&self, name: &str, source: &Path, work: &Path, scratch: &Path) -> Result<TreeReport> {
        let files = discover_files(source)?;
        let (archives, files): (Vec<PathBuf>, Vec<PathBuf>) = files
            .into_iter()
            .partition(|p| has_extension(p, &[ARCHIVE_EXTENSION]));

        let roots = TreeRoots {
            source: source.to_path_buf(),
            scratch: scratch.to_path_buf(),
            work: work.to_path_buf(),
        };
        let mut report = self.run_pipeline(name, &roots, &files)?;

        for (index, rel) in archives.iter().enumerate() {
            let area = scratch.join(ARCHIVE_AREA).join(index.to_string());
            let original = source.join(rel);
            let packed = work.join(rel);
            let org_size = fs::metadata(&original).map(|m| m.len()).unwrap_or(0);

            match self.process_archive(rel, &original, &packed, &area) {
                Ok(inner) => {
                    let new_size = fs::metadata(&packed).map(|m| m.len()).unwrap_or(org_size);
                    info!(
                        archive = %rel.display(),
                        files = inner.discovered,
                        org_size,
                        new_size,
                        "Archive repacked"
                    );
                    report.absorb(inner);
                    report.sizes.add(SizeSummary::new(org_size, new_size));
                }
                Err(e) => {
                    warn!(
                        archive = %rel.display(),
                        error = %format!("{:#}", e),
                        "Archive processing failed, copying it unchanged"
                    );
                    if packed.exists() {
                        let _ = fs::remove_file(&packed);
                    }
                    copy_on_fail(&original, &packed);
                    report.record_failure(rel.clone(), format!("{:#}", e));
                    report.sizes.add(SizeSummary::new(org_size, org_size));
                }
            }
            if area.exists() {
                let _ = fs::remove_dir_all(&area);
            }
        }

        Ok(report)
    }

    fn run_pipeline(&self, name: &str, roots: &TreeRoots, files: &[PathBuf]) -> Result<TreeReport> {
        let cpu = TaskRunner::new(self.limits.cpu).with_progress(self.show_progress);
        let io = TaskRunner::new(self.limits.io).with_progress(self.show_progress);

        match self.kind {
            TreeKind::Textures => TexturePipeline {
                roots: roots.clone(),
                resize: self.resize,
                cpu,
                io,
                converters: self.tools.converters.clone(),
                probe: self.tools.probe,
            }
            .run(name, files),
            TreeKind::Meshes => MeshPipeline {
                roots: roots.clone(),
                float_decimal: self.float_decimal,
                cpu,
                io,
            }
            .run(name, files),
        }
    }

    fn process_archive(&self, rel: &Path, original: &Path, packed: &Path, area: &Path) -> Result<TreeReport> {
        let unpacked = area.join("source");
        let repacked = area.join("work");
        let scratch = area.join("scratch");
        if area.exists() {
            fs::remove_dir_all(area).with_context(|| format!("Failed to clear {}", area.display()))?;
        }
        for dir in [&unpacked, &repacked, &scratch] {
            fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
        }

        info!(archive = %rel.display(), "Unpacking archive");
        self.tools
            .archiver
            .unpack(original, &unpacked)
            .with_context(|| format!("Failed to unpack {}", rel.display()))?;

        let inner = self.process(&to_slash_path(rel), &unpacked, &repacked, &scratch)?;

        ensure_parent_dir_exists(packed)?;
        if packed.exists() {
            fs::remove_file(packed)?;
        }
        self.tools
            .archiver
            .pack(&repacked, packed)
            .with_context(|| format!("Failed to pack {}", rel.display()))?;
        Ok(inner)
    }
}
