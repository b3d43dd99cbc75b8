//! Safety checks
//!
//! A run moves whole sub-trees into `_backup` and deletes `_temp`. Refuse to
//! do that on system directories, a home directory root, or a base that is
//! itself inside a staging root.

use crate::staging::{BACKUP_ROOT, WORK_ROOT};
use std::path::{Component, Path};

const PROTECTED_DIRS: &[&str] = &[
    "/",
    "/System",
    "/Library",
    "/Applications",
    "/Users",
    "/private",
    "/usr",
    "/bin",
    "/sbin",
    "/etc",
    "/var",
    "/opt",
    "/home",
    "/root",
    "/boot",
    "/dev",
    "/proc",
    "/sys",
    "/tmp",
    "C:",
    "C:\\Windows",
    "C:\\Program Files",
    "C:\\Program Files (x86)",
];

fn normalized(path: &Path) -> String {
    let text = path.to_string_lossy();
    let trimmed = text.trim_end_matches(['/', '\\']);
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_near_home_root(path: &Path) -> bool {
    let text = path.to_string_lossy();
    (text.starts_with("/home/") || text.starts_with("/Users/")) && path.components().count() <= 3
}

fn inside_staging_root(path: &Path) -> bool {
    path.components().any(|c| match c {
        Component::Normal(name) => name == BACKUP_ROOT || name == WORK_ROOT,
        _ => false,
    })
}

pub fn check_dangerous_directory(path: &Path) -> Result<(), String> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

    for candidate in [path, canonical.as_path()] {
        let text = normalized(candidate);
        if PROTECTED_DIRS.iter().any(|d| d.eq_ignore_ascii_case(&text)) {
            return Err(format!(
                "🚨 Refusing to run on protected system directory '{}'",
                text
            ));
        }
    }
    if is_near_home_root(&canonical) {
        return Err(format!(
            "🚨 Refusing to run on '{}': too close to a home directory root",
            path.display()
        ));
    }
    if inside_staging_root(path) {
        return Err(format!(
            "🚨 Refusing to run on '{}': it lies inside a {} or {} staging directory",
            path.display(),
            BACKUP_ROOT,
            WORK_ROOT
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_dirs_blocked() {
        for dir in ["/", "/usr", "/etc/", "/home", "/tmp"] {
            assert!(check_dangerous_directory(Path::new(dir)).is_err(), "{dir}");
        }
    }

    #[test]
    fn test_home_root_blocked() {
        assert!(check_dangerous_directory(Path::new("/home/someone")).is_err());
    }

    #[test]
    fn test_staging_root_blocked() {
        let err = check_dangerous_directory(Path::new("/games/Mod/Data/_backup/MEDIA")).unwrap_err();
        assert!(err.contains("staging"));
    }

    #[test]
    fn test_game_dir_allowed() {
        let dir = tempfile::TempDir::new().unwrap();
        let game = dir.path().join("Game/Mods/Redux/Data");
        std::fs::create_dir_all(&game).unwrap();
        assert!(check_dangerous_directory(&game).is_ok());
    }
}
