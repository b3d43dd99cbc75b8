//! Shared utilities for asset_boost
//!
//! Domain-neutral batch machinery:
//! - Bounded-concurrency task runner and concurrency limits
//! - Directory staging (source / backup / work) and per-sub-tree run locks
//! - Discovery, copy-through and salvage copies
//! - External tool processes with timeouts
//! - Logging, progress bars and summary reports
//! - Safety checks (dangerous directory detection)

pub mod batch;
pub mod common_utils;
pub mod errors;
pub mod file_copier;
pub mod logging;
pub mod progress;
pub mod report;
pub mod run_lock;
pub mod safety;
pub mod staging;
pub mod task_runner;
pub mod thread_manager;
pub mod tool_process;

pub use batch::{discover_files, BatchResult};
pub use errors::BoostError;
pub use file_copier::{copy_file, copy_on_fail, copy_through, CopyResult};
pub use progress::{create_progress_bar, format_bytes, format_duration};
pub use report::{print_summary_report, print_tree_summary, RunReport, SizeSummary, TreeReport};
pub use run_lock::RunLock;
pub use safety::check_dangerous_directory;
pub use staging::{remove_work_root, run_staged, StagingTriple};
pub use task_runner::{ErrorPolicy, TaskRunner};
pub use thread_manager::ConcurrencyLimits;
pub use tool_process::{resolve_tool, run_tool, ToolOutput, ToolProcess};
