//! Asset records
//!
//! One record per discovered texture. Stages never mutate a record in place:
//! each stage takes the previous list and returns new record versions, so a
//! record always describes the last stage that completed for it.
//!
//! Paths are never rewritten by string substitution. A record stores its
//! relative directory and stem, and every concrete path is composed as
//! `root / rel_dir / stem.ext` from one of the [`TreeRoots`].

use crate::formats::{Detection, FormatTag};
use serde::Serialize;
use shared_utils::common_utils::to_slash_path;
use std::path::{Path, PathBuf};

/// Where a record's current file lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Root {
    /// Pristine input (the staging backup)
    Source,
    /// Per-run temporaries: renamed and repaired copies
    Scratch,
    /// Output that will be committed
    Work,
}

/// The three directories a texture batch works across.
#[derive(Debug, Clone)]
pub struct TreeRoots {
    pub source: PathBuf,
    pub scratch: PathBuf,
    pub work: PathBuf,
}

impl TreeRoots {
    pub fn root(&self, root: Root) -> &Path {
        match root {
            Root::Source => &self.source,
            Root::Scratch => &self.scratch,
            Root::Work => &self.work,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ImageStats {
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub has_alpha: bool,
}

impl ImageStats {
    pub fn longest_side(&self) -> u32 {
        self.width.max(self.height)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Role {
    Unique,
    Canonical,
    /// Never converted; receives a copy of the canonical member's output.
    /// `canonical` is that member's original filename.
    Dependent { canonical: String },
}

/// Processing progress; only ever moves forward. `Failed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Status {
    Discovered,
    Inspected,
    Repaired,
    Converted,
    Restored,
    Failed,
}

/// How the converted output was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Converted { strategy: String },
    /// Every converter failed and the input bytes were copied
    CopiedUnchanged,
}

#[derive(Debug, Clone, Serialize)]
pub struct AssetRecord {
    /// Lowercased `rel_dir/stem`; equal identities are the same logical asset
    pub identity: String,
    pub rel_dir: PathBuf,
    pub stem: String,
    pub original_ext: String,
    pub original_filename: String,
    pub original_size: u64,

    pub declared: Option<FormatTag>,
    pub detected: Option<Detection>,
    pub dds_corrupt: bool,

    pub root: Root,
    pub ext: String,

    pub before: Option<ImageStats>,
    pub after: Option<ImageStats>,
    pub outcome: Option<Outcome>,

    pub role: Role,
    pub status: Status,
    pub failure: Option<String>,
}

impl AssetRecord {
    /// Build a record from a path relative to the source root.
    /// Files without a stem or extension are not assets.
    pub fn discover(rel_path: &Path, original_size: u64) -> Option<Self> {
        let stem = rel_path.file_stem()?.to_str()?.to_string();
        let original_ext = rel_path.extension()?.to_str()?.to_string();
        let original_filename = rel_path.file_name()?.to_str()?.to_string();
        let rel_dir = rel_path.parent().map(Path::to_path_buf).unwrap_or_default();
        let identity = to_slash_path(&rel_dir.join(&stem)).to_lowercase();

        Some(Self {
            identity,
            declared: FormatTag::from_extension(&original_ext),
            detected: None,
            dds_corrupt: false,
            root: Root::Source,
            ext: original_ext.clone(),
            rel_dir,
            stem,
            original_ext,
            original_filename,
            original_size,
            before: None,
            after: None,
            outcome: None,
            role: Role::Unique,
            status: Status::Discovered,
            failure: None,
        })
    }

    pub fn original_rel_path(&self) -> PathBuf {
        self.rel_dir.join(&self.original_filename)
    }

    /// `root / rel_dir / stem.ext`
    pub fn path_in(&self, roots: &TreeRoots, root: Root, ext: &str) -> PathBuf {
        roots
            .root(root)
            .join(&self.rel_dir)
            .join(format!("{}.{}", self.stem, ext))
    }

    pub fn current_path(&self, roots: &TreeRoots) -> PathBuf {
        self.path_in(roots, self.root, &self.ext)
    }

    pub fn original_path(&self, roots: &TreeRoots) -> PathBuf {
        roots.source.join(self.original_rel_path())
    }

    /// Where the asset must end up: its own filename, in the work tree.
    pub fn final_path(&self, roots: &TreeRoots) -> PathBuf {
        roots.work.join(self.original_rel_path())
    }

    pub fn detected_format(&self) -> Option<FormatTag> {
        self.detected.map(|d| d.format)
    }

    pub fn is_format_mismatch(&self) -> bool {
        match (self.detected_format(), self.declared) {
            (Some(detected), declared) => Some(detected) != declared,
            (None, _) => false,
        }
    }

    /// Needs a temporary copy before conversion: wrong extension or broken header.
    pub fn needs_staged_copy(&self) -> bool {
        self.is_format_mismatch() || self.dds_corrupt
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    pub fn is_dependent(&self) -> bool {
        matches!(self.role, Role::Dependent { .. })
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = self.status.max(status);
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_inspection(mut self, detected: Detection, dds_corrupt: bool) -> Self {
        self.detected = Some(detected);
        self.dds_corrupt = dds_corrupt;
        self.with_status(Status::Inspected)
    }

    pub fn with_location(mut self, root: Root, ext: impl Into<String>) -> Self {
        self.root = root;
        self.ext = ext.into();
        self
    }

    pub fn with_before(mut self, stats: ImageStats) -> Self {
        self.before = Some(stats);
        self
    }

    pub fn with_after(mut self, stats: ImageStats) -> Self {
        self.after = Some(stats);
        self
    }

    pub fn with_outcome(mut self, outcome: Outcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    pub fn failed(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self.status = Status::Failed;
        self
    }

    /// Output size for the summary: converted size if known, else the original.
    pub fn output_size(&self) -> u64 {
        self.after.map(|s| s.size).unwrap_or(self.original_size)
    }

    pub fn was_optimized(&self) -> bool {
        !self.is_failed() && matches!(self.outcome, Some(Outcome::Converted { .. }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> TreeRoots {
        TreeRoots {
            source: PathBuf::from("/b/_backup/MEDIA"),
            scratch: PathBuf::from("/b/_temp/.scratch/MEDIA"),
            work: PathBuf::from("/b/_temp/MEDIA"),
        }
    }

    #[test]
    fn test_discover_identity_is_case_insensitive() {
        let a = AssetRecord::discover(Path::new("Items/Shield.TGA"), 10).unwrap();
        let b = AssetRecord::discover(Path::new("items/shield.dds"), 10).unwrap();
        assert_eq!(a.identity, "items/shield");
        assert_eq!(a.identity, b.identity);
        assert_eq!(a.original_filename, "Shield.TGA");
        assert_eq!(a.declared, Some(FormatTag::Tga));
    }

    #[test]
    fn test_top_level_identity() {
        let a = AssetRecord::discover(Path::new("logo.png"), 1).unwrap();
        assert_eq!(a.identity, "logo");
        assert_eq!(a.rel_dir, PathBuf::new());
    }

    #[test]
    fn test_no_extension_is_not_an_asset() {
        assert!(AssetRecord::discover(Path::new("README"), 1).is_none());
    }

    #[test]
    fn test_path_composition() {
        let roots = roots();
        let a = AssetRecord::discover(Path::new("ui/sword.tga"), 1).unwrap();
        assert_eq!(a.current_path(&roots), PathBuf::from("/b/_backup/MEDIA/ui/sword.tga"));
        assert_eq!(
            a.path_in(&roots, Root::Scratch, "png"),
            PathBuf::from("/b/_temp/.scratch/MEDIA/ui/sword.png")
        );
        assert_eq!(a.final_path(&roots), PathBuf::from("/b/_temp/MEDIA/ui/sword.tga"));

        let moved = a.with_location(Root::Work, "dds");
        assert_eq!(moved.current_path(&roots), PathBuf::from("/b/_temp/MEDIA/ui/sword.dds"));
        assert_eq!(moved.original_path(&roots), PathBuf::from("/b/_backup/MEDIA/ui/sword.tga"));
    }

    #[test]
    fn test_status_is_monotonic() {
        let a = AssetRecord::discover(Path::new("a.tga"), 1)
            .unwrap()
            .with_status(Status::Converted)
            .with_status(Status::Inspected);
        assert_eq!(a.status, Status::Converted);

        let failed = a.failed("boom").with_status(Status::Restored);
        assert_eq!(failed.status, Status::Failed);
    }

    #[test]
    fn test_mismatch() {
        let png = Detection {
            format: FormatTag::Png,
            confident: true,
        };
        let a = AssetRecord::discover(Path::new("sword.tga"), 1)
            .unwrap()
            .with_inspection(png, false);
        assert!(a.is_format_mismatch());
        assert!(a.needs_staged_copy());

        let b = AssetRecord::discover(Path::new("sword.png"), 1)
            .unwrap()
            .with_inspection(png, false);
        assert!(!b.is_format_mismatch());
    }
}
