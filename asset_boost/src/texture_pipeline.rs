//! Texture pipeline
//!
//! Turns one staged texture tree (`source` = backup, `work` = output) into DDS
//! while every file keeps its original name:
//!
//! 1. copy non-texture files through unchanged
//! 2. build records and group duplicates
//! 3. inspect signatures and DDS headers
//! 4. stage renamed / repaired copies in scratch
//! 5. probe size, dimensions, depth and alpha
//! 6. convert to DDS through the fallback chain
//! 7. delete the scratch copies
//! 8. verify the outputs
//! 9. rename each output back to its original filename
//! 10. give duplicates a copy of their canonical's output
//! 11. salvage failed assets by copying their originals
//!
//! Each stage finishes for the whole batch before the next begins. A stage
//! maps the record list to a new list; an asset that fails a stage leaves the
//! remaining stages as a `Failed` record and is salvaged at the end.

use crate::asset::{AssetRecord, ImageStats, Outcome, Role, Root, Status, TreeRoots};
use crate::converters::{convert_with_fallback, ConvertOptions, TextureConverter, DEFAULT_MIP_LEVELS};
use crate::dedup::deduplicate;
use crate::formats::{detect_format, is_dds_corrupt, repair_dds_header, FormatTag, TEXTURE_EXTENSIONS};
use crate::probe::{decide_compression, Compression, ImageProbe};
use crate::resize::{plan_resize, ResizePlan, ResizeSettings};
use anyhow::{Context, Result};
use shared_utils::common_utils::{ensure_parent_dir_exists, has_extension};
use shared_utils::{
    copy_file, copy_on_fail, copy_through, BatchResult, ErrorPolicy, SizeSummary, TaskRunner,
    TreeReport,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Output extension of every converted texture.
const TARGET_EXT: &str = "dds";

pub struct TexturePipeline<'a> {
    pub roots: TreeRoots,
    pub resize: &'a ResizeSettings,
    pub cpu: TaskRunner,
    pub io: TaskRunner,
    /// Ordered strategies; the last one should be a passthrough copy
    pub converters: Vec<&'a dyn TextureConverter>,
    pub probe: &'a dyn ImageProbe,
}

impl TexturePipeline<'_> {
    /// `files` are relative to `roots.source`.
    pub fn run(&self, name: &str, files: &[PathBuf]) -> Result<TreeReport> {
        let started = Instant::now();
        let mut batch = BatchResult::new();
        let all = self.process(name, files, &mut batch)?;

        let mut sizes = SizeSummary::default();
        for record in &all {
            sizes.add(SizeSummary::new(record.original_size, record.output_size()));
            if record.is_failed() {
                batch.fail(
                    record.original_rel_path(),
                    record.failure.clone().unwrap_or_default(),
                );
            } else if record.was_optimized() {
                batch.success();
            } else {
                batch.skip();
            }
        }

        Ok(TreeReport::from_batch(name, &batch, sizes, started.elapsed()))
    }

    /// All stages; returns the final texture records sorted by path. Copy-through
    /// files are counted straight into `batch`.
    fn process(&self, name: &str, files: &[PathBuf], batch: &mut BatchResult) -> Result<Vec<AssetRecord>> {
        let (textures, others): (Vec<PathBuf>, Vec<PathBuf>) = files
            .iter()
            .cloned()
            .partition(|p| has_extension(p, TEXTURE_EXTENSIONS) && AssetRecord::discover(p, 0).is_some());
        info!(
            subtree = name,
            textures = textures.len(),
            others = others.len(),
            "Texture pipeline started"
        );

        let copied = copy_through(&self.io, "Copy unsupported", &self.roots.source, &self.roots.work, &others);
        for _ in 0..copied.copied {
            batch.skip();
        }
        for (path, error) in copied.errors {
            batch.fail(path, error);
        }

        let (records, unreadable): (Vec<_>, Vec<_>) =
            self.discover(&textures)?.into_iter().partition(|r| !r.is_failed());
        let records = deduplicate(records);
        let (convertible, dependents): (Vec<_>, Vec<_>) =
            records.into_iter().partition(|r| !r.is_dependent());

        let records = self.stage(&self.io, "Inspect formats", convertible, |r| self.inspect(r))?;
        let records = self.stage(&self.io, "Stage renamed/repaired", records, |r| self.stage_copy(r))?;
        let records = self.stage(&self.io, "Probe images", records, |r| Ok(self.probe_before(r)))?;
        let records = self.stage(&self.cpu, "Convert to DDS", records, |r| self.convert(r))?;
        self.remove_scratch_copies(&records)?;
        let records = self.stage(&self.io, "Verify outputs", records, |r| self.verify(r))?;
        let records = self.stage(&self.io, "Restore filenames", records, |r| self.restore_name(r))?;

        let dependents = self.propagate(&records, dependents)?;

        let mut all: Vec<AssetRecord> = records.into_iter().chain(dependents).chain(unreadable).collect();
        self.salvage_failed(&all)?;
        all.sort_by(|a, b| a.original_rel_path().cmp(&b.original_rel_path()));
        Ok(all)
    }

    /// Run one per-asset stage. Records that already failed pass through
    /// untouched; a record whose operation errors comes out `Failed`.
    fn stage<F>(
        &self,
        runner: &TaskRunner,
        label: &str,
        records: Vec<AssetRecord>,
        operation: F,
    ) -> Result<Vec<AssetRecord>>
    where
        F: Fn(&AssetRecord) -> Result<AssetRecord> + Sync,
    {
        let (active, mut out): (Vec<_>, Vec<_>) = records.into_iter().partition(|r| !r.is_failed());

        let failed = Mutex::new(Vec::new());
        let on_error = |record: &AssetRecord, e: &anyhow::Error| {
            warn!(
                stage = label,
                path = %record.original_rel_path().display(),
                error = %format!("{:#}", e),
                "Asset failed"
            );
            failed
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push(record.clone().failed(format!("{}: {:#}", label, e)));
        };

        let done = runner.run(label, &active, ErrorPolicy::Recover(&on_error), |r| {
            operation(r).map(Some)
        })?;

        out.extend(done);
        out.extend(failed.into_inner().unwrap_or_else(|p| p.into_inner()));
        Ok(out)
    }

    /// A texture that cannot be stat'ed comes back as a `Failed` record of
    /// size 0, kept out of duplicate grouping.
    fn discover(&self, textures: &[PathBuf]) -> Result<Vec<AssetRecord>> {
        let source = &self.roots.source;
        let unreadable = Mutex::new(Vec::new());
        let on_error = |rel: &PathBuf, e: &anyhow::Error| {
            warn!(path = %rel.display(), error = %format!("{:#}", e), "Asset failed");
            if let Some(record) = AssetRecord::discover(rel, 0) {
                unreadable
                    .lock()
                    .unwrap_or_else(|p| p.into_inner())
                    .push(record.failed(format!("Discover textures: {:#}", e)));
            }
        };
        let mut records = self.io.run("Discover textures", textures, ErrorPolicy::Recover(&on_error), |rel| {
            let size = std::fs::metadata(source.join(rel))
                .with_context(|| format!("Failed to stat {}", rel.display()))?
                .len();
            Ok(AssetRecord::discover(rel, size))
        })?;
        records.extend(unreadable.into_inner().unwrap_or_else(|p| p.into_inner()));
        // discovery order decides duplicate ties
        records.sort_by(|a, b| a.original_rel_path().cmp(&b.original_rel_path()));
        Ok(records)
    }

    fn inspect(&self, record: &AssetRecord) -> Result<AssetRecord> {
        let path = record.original_path(&self.roots);
        let detection = detect_format(&path)?;
        let corrupt = detection.format == FormatTag::Dds && is_dds_corrupt(&path)?;
        if corrupt {
            warn!(path = %record.original_rel_path().display(), "Corrupt DDS header");
        }
        let inspected = record.clone().with_inspection(detection, corrupt);
        if inspected.is_format_mismatch() {
            info!(
                path = %record.original_rel_path().display(),
                detected = detection.format.extension(),
                "Extension does not match content"
            );
        }
        Ok(inspected)
    }

    /// Copy mismatched or corrupt assets into scratch under their real extension.
    fn stage_copy(&self, record: &AssetRecord) -> Result<AssetRecord> {
        if !record.needs_staged_copy() {
            return Ok(record.clone());
        }
        let Some(format) = record.detected_format() else {
            return Ok(record.clone());
        };

        let staged = record.path_in(&self.roots, Root::Scratch, format.extension());
        copy_file(&record.original_path(&self.roots), &staged)?;
        if record.dds_corrupt {
            repair_dds_header(&staged)?;
            debug!(path = %staged.display(), "DDS header repaired");
        }

        Ok(record
            .clone()
            .with_location(Root::Scratch, format.extension())
            .with_status(Status::Repaired))
    }

    /// Probe failures are not asset failures: conversion goes ahead without
    /// resizing and with alpha-safe compression.
    fn probe_before(&self, record: &AssetRecord) -> AssetRecord {
        match self.probe.stats(&record.current_path(&self.roots)) {
            Ok(stats) => record.clone().with_before(stats),
            Err(e) => {
                warn!(
                    path = %record.original_rel_path().display(),
                    error = %format!("{:#}", e),
                    "Failed to get image status"
                );
                record.clone()
            }
        }
    }

    fn convert_options(&self, record: &AssetRecord) -> ConvertOptions {
        let input = record.current_path(&self.roots);
        let (compression, resize, depth) = match record.before {
            Some(stats) => {
                let verbose = if stats.has_alpha {
                    self.probe.alpha_report(&input).ok()
                } else {
                    None
                };
                let excluded = self.resize.is_excluded(&record.identity);
                let plan = plan_resize(stats.width, stats.height, self.resize, excluded);
                (
                    decide_compression(&stats, verbose.as_deref()),
                    plan,
                    stats.depth,
                )
            }
            None => (Compression::Dxt5, ResizePlan::Keep, 8),
        };
        ConvertOptions {
            compression,
            mip_levels: DEFAULT_MIP_LEVELS,
            resize: resize.target(),
            source_depth: depth,
        }
    }

    fn convert(&self, record: &AssetRecord) -> Result<AssetRecord> {
        let input = record.current_path(&self.roots);
        let output = record.path_in(&self.roots, Root::Work, TARGET_EXT);
        ensure_parent_dir_exists(&output)?;

        let options = self.convert_options(record);
        let done = convert_with_fallback(&self.converters, &input, &output, &options)?;
        let outcome = if done.passthrough {
            Outcome::CopiedUnchanged
        } else {
            Outcome::Converted {
                strategy: done.strategy,
            }
        };

        Ok(record
            .clone()
            .with_location(Root::Work, TARGET_EXT)
            .with_outcome(outcome)
            .with_status(Status::Converted))
    }

    fn remove_scratch_copies(&self, records: &[AssetRecord]) -> Result<()> {
        let staged: Vec<PathBuf> = records
            .iter()
            .filter(|r| r.needs_staged_copy())
            .filter_map(|r| {
                r.detected_format()
                    .map(|f| r.path_in(&self.roots, Root::Scratch, f.extension()))
            })
            .collect();

        let on_error = |path: &PathBuf, e: &anyhow::Error| {
            warn!(path = %path.display(), error = %e, "Failed to remove temporary copy");
        };
        self.io
            .run("Remove temp copies", &staged, ErrorPolicy::Recover(&on_error), |path| {
                if path.exists() {
                    std::fs::remove_file(path)?;
                }
                Ok(None::<()>)
            })?;
        Ok(())
    }

    fn verify(&self, record: &AssetRecord) -> Result<AssetRecord> {
        let output = record.current_path(&self.roots);
        let size = std::fs::metadata(&output)
            .with_context(|| format!("Converted output missing: {}", output.display()))?
            .len();

        let stats = match self.probe.stats(&output) {
            Ok(stats) => ImageStats { size, ..stats },
            Err(_) => ImageStats {
                size,
                ..record.before.unwrap_or_default()
            },
        };
        Ok(record.clone().with_after(stats))
    }

    fn restore_name(&self, record: &AssetRecord) -> Result<AssetRecord> {
        let current = record.current_path(&self.roots);
        let final_path = record.final_path(&self.roots);
        if current != final_path {
            if let Err(e) = std::fs::rename(&current, &final_path) {
                // the .dds output must not linger next to the salvaged original
                if let Err(cleanup) = std::fs::remove_file(&current) {
                    warn!(path = %current.display(), error = %cleanup, "Failed to remove converted output");
                }
                return Err(anyhow::Error::new(e).context(format!(
                    "Failed to restore filename {} -> {}",
                    current.display(),
                    final_path.display()
                )));
            }
        }
        Ok(record
            .clone()
            .with_location(Root::Work, record.original_ext.clone())
            .with_status(Status::Restored))
    }

    /// Dependents copy their canonical's final file and take over its metadata,
    /// keeping their own name and original size.
    fn propagate(
        &self,
        canonicals: &[AssetRecord],
        dependents: Vec<AssetRecord>,
    ) -> Result<Vec<AssetRecord>> {
        let by_identity: HashMap<&str, &AssetRecord> = canonicals
            .iter()
            .filter(|r| r.role == Role::Canonical)
            .map(|r| (r.identity.as_str(), r))
            .collect();

        let resolved: Vec<(AssetRecord, Option<&AssetRecord>)> = dependents
            .into_iter()
            .map(|d| {
                let canonical = by_identity.get(d.identity.as_str()).copied();
                (d, canonical)
            })
            .collect();

        let out = self.io.run(
            "Copy duplicates",
            &resolved,
            ErrorPolicy::Abort,
            |(dependent, canonical)| {
                let record = match canonical {
                    Some(canonical) if !canonical.is_failed() => {
                        match copy_file(&canonical.final_path(&self.roots), &dependent.final_path(&self.roots)) {
                            Ok(_) => {
                                let mut copy = dependent.clone();
                                copy.detected = canonical.detected;
                                copy.dds_corrupt = canonical.dds_corrupt;
                                copy.before = canonical.before;
                                copy.after = canonical.after;
                                copy.outcome = canonical.outcome.clone();
                                copy.with_status(Status::Restored)
                            }
                            Err(e) => dependent.clone().failed(format!("Copy duplicates: {:#}", e)),
                        }
                    }
                    Some(canonical) => dependent
                        .clone()
                        .failed(format!("canonical {} failed", canonical.original_filename)),
                    None => dependent.clone().failed("canonical missing"),
                };
                Ok(Some(record))
            },
        )?;
        Ok(out)
    }

    /// Every failed asset still ends up in `work`, as its unchanged original.
    /// Only the asset's own final path is written; `<stem>.dds` may belong to
    /// another member of its duplicate group.
    fn salvage_failed(&self, records: &[AssetRecord]) -> Result<()> {
        let failed: Vec<&AssetRecord> = records.iter().filter(|r| r.is_failed()).collect();
        self.io.run("Salvage failed", &failed, ErrorPolicy::Abort, |record| {
            copy_on_fail(&record.original_path(&self.roots), &record.final_path(&self.roots));
            Ok(None::<()>)
        })?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::path::Path;

    /// Reports a fixed 64x64 RGBA image, except for files it is told to reject.
    #[derive(Default)]
    pub struct FakeProbe {
        pub reject_suffix: Option<&'static str>,
    }

    impl ImageProbe for FakeProbe {
        fn stats(&self, path: &Path) -> Result<ImageStats> {
            if let Some(suffix) = self.reject_suffix {
                if path.to_string_lossy().ends_with(suffix) {
                    anyhow::bail!("identify failed");
                }
            }
            Ok(ImageStats {
                size: std::fs::metadata(path)?.len(),
                width: 64,
                height: 64,
                depth: 8,
                has_alpha: false,
            })
        }

        fn alpha_report(&self, _path: &Path) -> Result<String> {
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeProbe;
    use super::*;
    use crate::converters::fakes::FakeConverter;
    use crate::converters::PlainCopy;
    use std::fs;
    use std::path::Path;
    use std::sync::LazyLock;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        roots: TreeRoots,
    }

    fn fixture(files: &[(&str, &[u8])]) -> Fixture {
        let dir = TempDir::new().unwrap();
        let roots = TreeRoots {
            source: dir.path().join("_backup/MEDIA"),
            scratch: dir.path().join("_temp/.scratch/MEDIA"),
            work: dir.path().join("_temp/MEDIA"),
        };
        for (rel, bytes) in files {
            let path = roots.source.join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, bytes).unwrap();
        }
        fs::create_dir_all(&roots.work).unwrap();
        fs::create_dir_all(&roots.scratch).unwrap();
        Fixture { _dir: dir, roots }
    }

    static RESIZE: LazyLock<ResizeSettings> = LazyLock::new(ResizeSettings::default);

    fn pipeline<'a>(
        fx: &Fixture,
        converters: Vec<&'a dyn TextureConverter>,
        probe: &'a dyn ImageProbe,
        limit: usize,
    ) -> TexturePipeline<'a> {
        TexturePipeline {
            roots: fx.roots.clone(),
            resize: &RESIZE,
            cpu: TaskRunner::new(limit),
            io: TaskRunner::new(limit * 2),
            converters,
            probe,
        }
    }

    fn run(fx: &Fixture, converters: Vec<&dyn TextureConverter>, probe: &dyn ImageProbe) -> TreeReport {
        let files = shared_utils::discover_files(&fx.roots.source).unwrap();
        pipeline(fx, converters, probe, 2).run("MEDIA", &files).unwrap()
    }

    const PNG: &[u8] = b"\x89PNG\r\n\x1a\npixels";
    const TGA: &[u8] = b"\x00\x00\x02\x00\x00tga-pixels";

    #[test]
    fn test_misformatted_texture_keeps_its_name() {
        let fx = fixture(&[("ui/sword.tga", PNG)]);
        let texconv = FakeConverter::ok("texconv");
        let report = run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        let out = fs::read(fx.roots.work.join("ui/sword.tga")).unwrap();
        assert_eq!(out, [b"DDS |".as_slice(), PNG].concat());
        assert!(!fx.roots.work.join("ui/sword.dds").exists());
        assert!(!fx.roots.scratch.join("ui/sword.png").exists());
        assert_eq!(report.optimized, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_duplicate_copies_canonical_output() {
        let mut dds = b"DDS |".to_vec();
        dds.extend_from_slice(&[0u8; 16]);
        let fx = fixture(&[("shield.tga", TGA), ("shield.dds", &dds)]);
        let texconv = FakeConverter::ok("texconv");
        let report = run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        // only the canonical .dds went through the converter
        assert_eq!(texconv.calls(), 1);
        let canonical = fs::read(fx.roots.work.join("shield.dds")).unwrap();
        let dependent = fs::read(fx.roots.work.join("shield.tga")).unwrap();
        assert_eq!(canonical, dependent);
        assert_eq!(report.discovered, 2);
        assert_eq!(report.optimized, 2);
        // dependent keeps its own original size in the summary
        assert_eq!(report.sizes.org_size, (TGA.len() + dds.len()) as u64);
    }

    #[test]
    fn test_dependent_takes_canonical_metadata() {
        let mut dds = b"DDS |".to_vec();
        dds.extend_from_slice(&[0u8; 16]);
        let fx = fixture(&[("shield.tga", TGA), ("shield.dds", &dds)]);
        let texconv = FakeConverter::ok("texconv");
        let probe = FakeProbe::default();
        let files = shared_utils::discover_files(&fx.roots.source).unwrap();
        let records = pipeline(&fx, vec![&texconv, &PlainCopy], &probe, 2)
            .process("MEDIA", &files, &mut BatchResult::new())
            .unwrap();

        let canonical = records.iter().find(|r| r.original_filename == "shield.dds").unwrap();
        let dependent = records.iter().find(|r| r.original_filename == "shield.tga").unwrap();
        assert_eq!(canonical.role, Role::Canonical);
        assert!(dependent.is_dependent());
        assert!(canonical.after.is_some());
        assert_eq!(dependent.after, canonical.after);
        assert_eq!(dependent.before, canonical.before);
        assert_eq!(dependent.outcome, canonical.outcome);
        assert_eq!(dependent.status, canonical.status);
        assert_eq!(dependent.original_size, TGA.len() as u64);
    }

    #[test]
    fn test_failed_canonical_keeps_its_file() {
        // too short to inspect, so the whole group fails
        let fx = fixture(&[("shield.dds", b"DD"), ("shield.tga", TGA)]);
        let texconv = FakeConverter::ok("texconv");
        let probe = FakeProbe::default();
        let files = shared_utils::discover_files(&fx.roots.source).unwrap();
        let report = pipeline(&fx, vec![&texconv, &PlainCopy], &probe, 1)
            .run("MEDIA", &files)
            .unwrap();

        assert_eq!(report.failed, 2);
        assert_eq!(fs::read(fx.roots.work.join("shield.dds")).unwrap(), b"DD");
        assert_eq!(fs::read(fx.roots.work.join("shield.tga")).unwrap(), TGA);
    }

    #[test]
    fn test_unstatable_texture_fails_alone() {
        let fx = fixture(&[("ok.tga", TGA)]);
        let texconv = FakeConverter::ok("texconv");
        let probe = FakeProbe::default();
        let mut files = shared_utils::discover_files(&fx.roots.source).unwrap();
        files.push(PathBuf::from("vanished.tga"));
        let report = pipeline(&fx, vec![&texconv, &PlainCopy], &probe, 2)
            .run("MEDIA", &files)
            .unwrap();

        assert_eq!(report.optimized, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors[0].0, PathBuf::from("vanished.tga"));
        assert!(report.errors[0].1.contains("Discover textures"));
        assert!(fx.roots.work.join("ok.tga").exists());
    }

    #[test]
    fn test_corrupt_dds_is_repaired_before_conversion() {
        let mut broken = b"DDS ".to_vec();
        broken.extend_from_slice(&[0u8; 20]);
        let fx = fixture(&[("fx/glow.dds", &broken)]);
        let texconv = FakeConverter::ok("texconv");
        run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        let out = fs::read(fx.roots.work.join("fx/glow.dds")).unwrap();
        // fake converter prefixes its own 5 bytes to the repaired input
        assert_eq!(&out[5..10], b"DDS |");
        // backup untouched
        assert_eq!(fs::read(fx.roots.source.join("fx/glow.dds")).unwrap(), broken);
    }

    #[test]
    fn test_converter_failures_fall_back_to_copy() {
        let fx = fixture(&[("rock.tga", TGA)]);
        let texconv = FakeConverter::failing("texconv");
        let magick = FakeConverter::failing("magick");
        let report = run(&fx, vec![&texconv, &magick, &PlainCopy], &FakeProbe::default());

        assert_eq!(fs::read(fx.roots.work.join("rock.tga")).unwrap(), TGA);
        assert_eq!(report.optimized, 0);
        assert_eq!(report.copied, 1);
        assert_eq!(report.failed, 0);
    }

    #[test]
    fn test_unreadable_texture_is_salvaged() {
        let fx = fixture(&[("tiny.tga", b"ab"), ("ok.tga", TGA)]);
        let texconv = FakeConverter::ok("texconv");
        let report = run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        assert_eq!(report.failed, 1);
        assert_eq!(report.optimized, 1);
        assert_eq!(report.errors[0].0, PathBuf::from("tiny.tga"));
        assert_eq!(fs::read(fx.roots.work.join("tiny.tga")).unwrap(), b"ab");
    }

    #[test]
    fn test_probe_failure_is_not_fatal() {
        let fx = fixture(&[("a.tga", TGA)]);
        let texconv = FakeConverter::ok("texconv");
        let probe = FakeProbe {
            reject_suffix: Some("a.tga"),
        };
        let report = run(&fx, vec![&texconv, &PlainCopy], &probe);
        assert_eq!(report.optimized, 1);
        assert!(fx.roots.work.join("a.tga").exists());
    }

    #[test]
    fn test_unsupported_files_copied_through() {
        let fx = fixture(&[("fonts/main.fnt", b"font"), ("a.tga", TGA)]);
        let texconv = FakeConverter::ok("texconv");
        let report = run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        assert_eq!(fs::read(fx.roots.work.join("fonts/main.fnt")).unwrap(), b"font");
        assert_eq!(report.discovered, 2);
        assert_eq!(report.copied, 1);
        // copy-through files are not part of the size summary
        assert_eq!(report.sizes.org_size, TGA.len() as u64);
    }

    #[test]
    fn test_every_file_reaches_work() {
        let fx = fixture(&[
            ("a/x.tga", TGA),
            ("a/x.png", PNG),
            ("b/y.jpg", b"\xFF\xD8\xFF\xE0jpeg"),
            ("b/z.bin", b"other"),
            ("c/short.png", b"x"),
        ]);
        let texconv = FakeConverter::ok("texconv");
        run(&fx, vec![&texconv, &PlainCopy], &FakeProbe::default());

        for rel in shared_utils::discover_files(&fx.roots.source).unwrap() {
            assert!(fx.roots.work.join(&rel).is_file(), "{} missing", rel.display());
        }
        let produced = shared_utils::discover_files(&fx.roots.work).unwrap();
        assert_eq!(produced.len(), 5);
        assert!(!Path::new(&fx.roots.work.join("a/x.dds")).exists());
    }
}
