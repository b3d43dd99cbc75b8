//! Per-sub-tree run lock
//!
//! Staging directories belong to one run at a time. Each sub-tree gets a JSON
//! lock file under `<base>/_temp/.locks/`, created with `create_new` so two
//! processes cannot both win. Locks older than 24 hours, locks held by a pid
//! that no longer exists, and unreadable lock files are considered stale and
//! replaced.

use crate::errors::{BoostError, Result};
use crate::staging::WORK_ROOT;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

const LOCK_DIR_NAME: &str = ".locks";
const LOCK_STALE_TIMEOUT_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockInfo {
    pid: u32,
    /// Unix epoch seconds
    created_at: u64,
    hostname: String,
    subtree: String,
}

impl LockInfo {
    fn new(subtree: &str) -> Self {
        Self {
            pid: std::process::id(),
            created_at: now_secs(),
            hostname: get_hostname(),
            subtree: subtree.to_string(),
        }
    }

    fn is_stale(&self) -> bool {
        if now_secs().saturating_sub(self.created_at) > LOCK_STALE_TIMEOUT_SECS {
            return true;
        }
        self.hostname == get_hostname() && !process_alive(self.pid)
    }
}

#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(base: &Path, subtree: &str) -> Result<Self> {
        let dir = base.join(WORK_ROOT).join(LOCK_DIR_NAME);
        fs::create_dir_all(&dir).map_err(|e| BoostError::staging("lock", &dir, e))?;
        let path = dir.join(format!("{}.lock", subtree.replace(['/', '\\'], "__")));

        // second attempt only after a stale lock was removed
        for _ in 0..2 {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    let json = serde_json::to_string_pretty(&LockInfo::new(subtree))
                        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
                    file.write_all(json.as_bytes())?;
                    debug!(subtree, lock = %path.display(), "Run lock acquired");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let holder = fs::read_to_string(&path)
                        .ok()
                        .and_then(|s| serde_json::from_str::<LockInfo>(&s).ok());
                    match holder {
                        Some(info) if info.pid != std::process::id() && !info.is_stale() => {
                            return Err(BoostError::Locked {
                                pid: info.pid,
                                hostname: info.hostname,
                                lock_file: path,
                            });
                        }
                        _ => {
                            warn!(lock = %path.display(), "Removing stale run lock");
                            fs::remove_file(&path)
                                .map_err(|e| BoostError::staging("lock", &path, e))?;
                        }
                    }
                }
                Err(e) => return Err(BoostError::staging("lock", &path, e)),
            }
        }

        Err(BoostError::staging(
            "lock",
            &path,
            io::Error::new(io::ErrorKind::AlreadyExists, "lock contended"),
        ))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(lock = %self.path.display(), error = %e, "Failed to release run lock");
            }
        }
    }
}

/// Number of lock files currently present under `<base>/_temp/.locks`.
pub fn held_locks(base: &Path) -> usize {
    fs::read_dir(base.join(WORK_ROOT).join(LOCK_DIR_NAME))
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "lock"))
                .count()
        })
        .unwrap_or(0)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn get_hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    let proc_dir = Path::new("/proc");
    if proc_dir.is_dir() {
        return proc_dir.join(pid.to_string()).exists();
    }
    std::process::Command::new("kill")
        .args(["-0", &pid.to_string()])
        .status()
        .map(|s| s.success())
        .unwrap_or(true)
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    true
}
