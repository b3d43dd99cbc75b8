//! External tool processes
//!
//! Converters, the image prober and the archiver are all child processes.
//! [`ToolProcess`] drains stdout and stderr on their own threads so a chatty
//! tool can never fill a pipe and stall, and [`ToolProcess::wait_with_timeout`]
//! kills a tool that hangs. A timeout is reported like any other failure.

use crate::errors::{BoostError, Result};
use crate::logging::log_tool_exit;
use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

pub struct ToolProcess {
    tool: String,
    command_line: String,
    child: Child,
    started: Instant,
    stdout_thread: Option<JoinHandle<String>>,
    stderr_thread: Option<JoinHandle<String>>,
}

impl ToolProcess {
    /// Spawn `cmd` with both output pipes drained in the background.
    pub fn spawn(tool: &str, cmd: &mut Command) -> Result<Self> {
        let command_line = format!("{:?}", cmd);
        debug!(tool, command = %command_line, "Executing external tool");

        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                BoostError::ToolNotFound(tool.to_string())
            } else {
                BoostError::Io(e)
            }
        })?;

        let stdout_thread = child.stdout.take().map(drain);
        let stderr_thread = child.stderr.take().map(drain);

        Ok(Self {
            tool: tool.to_string(),
            command_line,
            child,
            started: Instant::now(),
            stdout_thread,
            stderr_thread,
        })
    }

    /// Wait for exit, killing the process once `timeout` has elapsed.
    pub fn wait_with_timeout(mut self, timeout: Duration) -> Result<ToolOutput> {
        let status = loop {
            if let Some(status) = self.child.try_wait()? {
                break status;
            }
            if self.started.elapsed() >= timeout {
                warn!(tool = %self.tool, timeout = ?timeout, "External tool timed out, killing");
                if let Err(e) = self.child.kill() {
                    warn!(tool = %self.tool, error = %e, "Failed to kill external tool");
                }
                let _ = self.child.wait();
                join(self.stdout_thread.take());
                join(self.stderr_thread.take());
                return Err(BoostError::ToolTimeout {
                    tool: self.tool,
                    timeout,
                });
            }
            thread::sleep(POLL_INTERVAL);
        };

        let output = ToolOutput {
            exit_code: status.code(),
            stdout: join(self.stdout_thread.take()),
            stderr: join(self.stderr_thread.take()),
            duration: self.started.elapsed(),
        };
        log_tool_exit(
            &self.tool,
            &self.command_line,
            output.exit_code,
            &output.stderr,
            output.duration,
        );
        Ok(output)
    }
}

fn drain<R: Read + Send + 'static>(mut reader: R) -> JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf);
        String::from_utf8_lossy(&buf).into_owned()
    })
}

fn join(handle: Option<JoinHandle<String>>) -> String {
    handle.and_then(|h| h.join().ok()).unwrap_or_default()
}

/// Run a tool to completion; a non-zero exit is a [`BoostError::ToolFailed`].
pub fn run_tool(tool: &str, cmd: &mut Command, timeout: Duration) -> Result<ToolOutput> {
    let output = ToolProcess::spawn(tool, cmd)?.wait_with_timeout(timeout)?;
    if !output.success() {
        return Err(BoostError::ToolFailed {
            tool: tool.to_string(),
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }
    Ok(output)
}

/// Locate an executable: explicit override, then bundled tool directories, then `PATH`.
pub fn resolve_tool(
    name: &str,
    override_path: Option<&Path>,
    search_dirs: &[PathBuf],
) -> Result<PathBuf> {
    if let Some(path) = override_path {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        warn!(tool = name, path = %path.display(), "Configured tool path does not exist");
    }

    for dir in search_dirs {
        if let Ok(found) = which::which_in(name, Some(dir.as_os_str()), dir) {
            return Ok(found);
        }
    }

    which::which(OsStr::new(name)).map_err(|_| BoostError::ToolNotFound(name.to_string()))
}
