//! Batch summary reporting
//!
//! `saved = org - new`, `saved% = round(saved / org * 100)`; both may be
//! negative when an output grew. An empty input reports 0%.

use crate::batch::BatchResult;
use crate::progress::{format_bytes, format_duration};
use console::style;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SizeSummary {
    pub org_size: u64,
    pub new_size: u64,
}

impl SizeSummary {
    pub fn new(org_size: u64, new_size: u64) -> Self {
        Self { org_size, new_size }
    }

    pub fn add(&mut self, other: SizeSummary) {
        self.org_size += other.org_size;
        self.new_size += other.new_size;
    }

    pub fn saved(&self) -> i64 {
        self.org_size as i64 - self.new_size as i64
    }

    /// Rounded half up, matching what the summary line has always shown.
    pub fn saved_percent(&self) -> i64 {
        if self.org_size == 0 {
            return 0;
        }
        (self.saved() as f64 * 100.0 / self.org_size as f64 + 0.5).floor() as i64
    }
}

/// Outcome of one sub-tree (or one archive inside it).
#[derive(Debug, Clone, Default, Serialize)]
pub struct TreeReport {
    pub name: String,
    pub discovered: usize,
    /// Assets that went through a converter or minifier
    pub optimized: usize,
    /// Files passed through unchanged (unsupported, or fallback copy)
    pub copied: usize,
    pub failed: usize,
    pub sizes: SizeSummary,
    pub errors: Vec<(PathBuf, String)>,
    pub duration_secs: f64,
}

impl TreeReport {
    pub fn from_batch(
        name: impl Into<String>,
        result: &BatchResult,
        sizes: SizeSummary,
        duration: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            discovered: result.total,
            optimized: result.succeeded,
            copied: result.skipped,
            failed: result.failed,
            sizes,
            errors: result.errors.clone(),
            duration_secs: duration.as_secs_f64(),
        }
    }

    /// Count one more unit that could not be processed.
    pub fn record_failure(&mut self, path: PathBuf, error: String) {
        self.discovered += 1;
        self.failed += 1;
        self.errors.push((path, error));
    }

    /// Fold an archive's inner report into this one.
    pub fn absorb(&mut self, inner: TreeReport) {
        self.discovered += inner.discovered;
        self.optimized += inner.optimized;
        self.copied += inner.copied;
        self.failed += inner.failed;
        self.errors.extend(
            inner
                .errors
                .into_iter()
                .map(|(p, e)| (PathBuf::from(&inner.name).join(p), e)),
        );
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub trees: Vec<TreeReport>,
    pub total: SizeSummary,
    pub saved: i64,
    pub saved_percent: i64,
    pub duration_secs: f64,
    /// Sub-trees whose run stopped before commit, with the reason
    pub aborted: Vec<(String, String)>,
}

impl RunReport {
    pub fn new(trees: Vec<TreeReport>, duration: Duration) -> Self {
        let mut total = SizeSummary::default();
        for tree in &trees {
            total.add(tree.sizes);
        }
        Self {
            saved: total.saved(),
            saved_percent: total.saved_percent(),
            trees,
            total,
            duration_secs: duration.as_secs_f64(),
            aborted: Vec::new(),
        }
    }

    pub fn with_aborted(mut self, aborted: Vec<(String, String)>) -> Self {
        self.aborted = aborted;
        self
    }

    pub fn failed(&self) -> usize {
        self.trees.iter().map(|t| t.failed).sum()
    }
}

fn format_signed_bytes(value: i64) -> String {
    if value < 0 {
        format!("-{}", format_bytes(value.unsigned_abs()))
    } else {
        format_bytes(value as u64)
    }
}

pub fn print_tree_summary(report: &TreeReport) {
    let sizes = report.sizes;
    println!();
    println!("{}", style(format!("📊 {}", report.name)).cyan().bold());
    println!(
        "   Optimized {}/{} (copied {}, failed {})",
        report.optimized, report.discovered, report.copied, report.failed
    );
    println!(
        "   Size: {} → {}  saved {} ({}%)",
        format_bytes(sizes.org_size),
        format_bytes(sizes.new_size),
        format_signed_bytes(sizes.saved()),
        sizes.saved_percent()
    );
    println!(
        "   Time: {}",
        format_duration(Duration::from_secs_f64(report.duration_secs))
    );

    if !report.errors.is_empty() {
        println!("   {}", style("❌ Failures:").red());
        for (path, error) in &report.errors {
            println!("      {} → {}", path.display(), error);
        }
    }
}

pub fn print_summary_report(report: &RunReport) {
    for tree in &report.trees {
        print_tree_summary(tree);
    }

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                    📊 Asset Boost Summary                    ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!(
        "║  💾 Input Size:         {:>14}                       ║",
        format_bytes(report.total.org_size)
    );
    println!(
        "║  💾 Output Size:        {:>14}                       ║",
        format_bytes(report.total.new_size)
    );
    println!(
        "║  📉 Saved:              {:>14} ({:>4}%)               ║",
        format_signed_bytes(report.saved),
        report.saved_percent
    );
    println!(
        "║  ❌ Failed assets:      {:>14}                       ║",
        report.failed()
    );
    println!(
        "║  ⏱️  Total Time:         {:>14}                       ║",
        format_duration(Duration::from_secs_f64(report.duration_secs))
    );
    println!("╚══════════════════════════════════════════════════════════════╝");

    for (name, reason) in &report.aborted {
        println!("{} {} → {}", style("⚠️  Sub-tree aborted:").yellow().bold(), name, reason);
    }
}
