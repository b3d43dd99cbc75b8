//! Batch discovery and per-batch counters

use crate::errors::{BoostError, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every file under `root`, as paths relative to `root`, sorted.
///
/// Symlinks are followed, so a linked texture is processed like any other
/// file and lands in the committed tree as a regular copy. Any unreadable
/// entry, broken link or special file fails the whole discovery: silently
/// skipping it would drop it from the committed tree.
pub fn discover_files(root: &Path) -> Result<Vec<PathBuf>> {
    let discovery_err = |path: &Path, message: String| BoostError::Discovery {
        path: path.to_path_buf(),
        message,
    };

    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            discovery_err(&path, e.to_string())
        })?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        if !file_type.is_file() {
            return Err(discovery_err(entry.path(), "not a regular file or directory".to_string()));
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| discovery_err(entry.path(), e.to_string()))?;
        files.push(rel.to_path_buf());
    }
    Ok(files)
}

#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<(PathBuf, String)>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    pub fn fail(&mut self, path: PathBuf, error: String) {
        self.total += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    pub fn skip(&mut self) {
        self.total += 1;
        self.skipped += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_files_relative_and_sorted() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("b/c/z.tga"), b"1").unwrap();
        fs::write(dir.path().join("a.dds"), b"22").unwrap();
        fs::create_dir_all(dir.path().join("empty")).unwrap();

        let files = discover_files(dir.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("a.dds"), PathBuf::from("b/c/z.tga")]);
    }

    #[test]
    fn test_discover_missing_root_is_fatal() {
        let dir = TempDir::new().unwrap();
        let err = discover_files(&dir.path().join("missing")).unwrap_err();
        assert!(matches!(err, BoostError::Discovery { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_file_is_discovered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("real.tga"), b"tga").unwrap();
        std::os::unix::fs::symlink(dir.path().join("real.tga"), dir.path().join("link.tga")).unwrap();

        let files = discover_files(dir.path()).unwrap();
        assert_eq!(files, vec![PathBuf::from("link.tga"), PathBuf::from("real.tga")]);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_fatal() {
        let dir = TempDir::new().unwrap();
        std::os::unix::fs::symlink(dir.path().join("gone.tga"), dir.path().join("link.tga")).unwrap();
        assert!(matches!(discover_files(dir.path()), Err(BoostError::Discovery { .. })));
    }

    #[test]
    fn test_batch_result_counters() {
        let mut result = BatchResult::new();
        result.success();
        result.success();
        result.skip();
        result.fail(PathBuf::from("bad.tga"), "boom".to_string());
        assert_eq!(result.total, 4);
        assert_eq!((result.succeeded, result.skipped, result.failed), (2, 1, 1));
        assert_eq!(result.errors, vec![(PathBuf::from("bad.tga"), "boom".to_string())]);
    }
}
