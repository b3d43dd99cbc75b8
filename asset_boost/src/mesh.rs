//! Mesh and config text minification
//!
//! The meshes sub-tree holds DirectX text meshes (`.act`, `.act.N`, `.lodN`)
//! and small config formats (`.att`, `.inf`, `.hi`, `.descr`). None of them
//! need comments, indentation or six-decimal floats at runtime, so they are
//! rewritten in their tightest form. Binary meshes and anything that is not
//! valid UTF-8 are copied byte for byte.

use crate::asset::TreeRoots;
use anyhow::{Context, Result};
use regex::{Captures, Regex};
use shared_utils::common_utils::ensure_parent_dir_exists;
use shared_utils::{copy_file, copy_on_fail, copy_through, BatchResult, ErrorPolicy, SizeSummary, TaskRunner, TreeReport};
use std::path::{Path, PathBuf};
use std::sync::{LazyLock, Mutex};
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_FLOAT_DECIMAL: u32 = 2;

/// X-file header: `xof 0303txt 0032`
const ACT_HEADER_LEN: usize = 16;

static BLOCK_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("valid block comment regex"));
static LINE_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)//.*$").expect("valid line comment regex"));
static NEWLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\r?\n").expect("valid newline regex"));
static INNER_SPACES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid inner spaces regex"));
static FLOAT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+\.(\d+)").expect("valid float regex"));
static PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{},;])\s*").expect("valid punctuation regex"));
static ACT_LOD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.(act\.\d+|lod\d+)$").expect("valid act lod regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshKind {
    /// DirectX X-file mesh, minified only when its header says text
    Act,
    /// `.att` / `.inf`: floats rounded, lines trimmed
    AttInf,
    /// `.hi` / `.descr`: inner whitespace collapsed
    HiDescr,
    Other,
}

pub fn classify(path: &Path) -> MeshKind {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let ext = shared_utils::common_utils::get_extension_lowercase(path);

    match ext.as_str() {
        "inf" | "att" => MeshKind::AttInf,
        "hi" | "descr" => MeshKind::HiDescr,
        "act" => MeshKind::Act,
        _ if ACT_LOD.is_match(&name) => MeshKind::Act,
        _ => MeshKind::Other,
    }
}

fn replace_all(re: &Regex, text: &str, replacement: &str) -> String {
    re.replace_all(text, replacement).into_owned()
}

fn strip_comments(content: &str) -> String {
    let without_blocks = replace_all(&BLOCK_COMMENT, content, "");
    replace_all(&LINE_COMMENT, &without_blocks, "")
}

fn split_lines(text: &str) -> Vec<&str> {
    NEWLINE.split(text).collect()
}

/// Round half up to `decimals` places and print the shortest form,
/// always with a fractional part (`3` -> `3.0`, `-0.001` -> `0.0`).
pub fn round_float(text: &str, decimals: u32) -> String {
    let Ok(value) = text.parse::<f64>() else {
        return text.to_string();
    };
    let scale = 10f64.powi(decimals as i32);
    let mut rounded = (value * scale + 0.5).floor() / scale;
    if rounded == 0.0 {
        rounded = 0.0;
    }
    let mut out = rounded.to_string();
    if !out.contains('.') {
        out.push_str(".0");
    }
    out
}

/// Round floats; `only_decimals` limits rounding to floats with exactly that
/// many fractional digits.
fn round_floats(text: &str, decimals: u32, only_decimals: Option<usize>) -> String {
    FLOAT.replace_all(text, |caps: &Captures| {
        let whole = &caps[0];
        match only_decimals {
            Some(n) if caps[1].len() != n => whole.to_string(),
            _ => round_float(whole, decimals),
        }
    })
    .into_owned()
}

/// X-file text header check on the first 16 characters.
pub fn is_text_act(content: &str) -> bool {
    let header: String = content.chars().take(ACT_HEADER_LEN).collect::<String>().to_lowercase();
    header.contains("txt") && !header.contains("bin")
}

/// Minify a text X-file. `None` for binary meshes, which must be copied.
pub fn minify_act(content: &str, decimals: u32) -> Option<String> {
    if !is_text_act(content) {
        return None;
    }
    let split = content
        .char_indices()
        .nth(ACT_HEADER_LEN)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let (header, body) = content.split_at(split);

    let stripped = strip_comments(body);
    let joined: String = split_lines(&stripped)
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let tight = replace_all(&PUNCTUATION, &joined, "$1")
        .replace(";,", ",")
        .replace(";;", ";");
    // exporters write six decimals; hand-tuned values are left alone
    let body = round_floats(&tight, decimals, Some(6));

    Some(format!("{}\n{}", header, body))
}

pub fn minify_att_inf(content: &str, decimals: u32) -> String {
    let rounded = round_floats(&strip_comments(content), decimals, None);
    split_lines(&rounded)
        .into_iter()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn minify_hi_descr(content: &str) -> String {
    let stripped = strip_comments(content);
    split_lines(&stripped)
        .into_iter()
        .map(|l| replace_all(&INNER_SPACES, l.trim(), " "))
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Minified text, or `None` when the file must be copied unchanged.
pub fn minify(kind: MeshKind, bytes: &[u8], decimals: u32) -> Option<String> {
    let content = std::str::from_utf8(bytes).ok()?;
    match kind {
        MeshKind::Act => minify_act(content, decimals),
        MeshKind::AttInf => Some(minify_att_inf(content, decimals)),
        MeshKind::HiDescr => Some(minify_hi_descr(content)),
        MeshKind::Other => None,
    }
}

struct MeshResult {
    org_size: u64,
    new_size: u64,
    minified: bool,
}

pub struct MeshPipeline {
    pub roots: TreeRoots,
    pub float_decimal: u32,
    pub cpu: TaskRunner,
    pub io: TaskRunner,
}

impl MeshPipeline {
    /// `files` are relative to `roots.source`.
    pub fn run(&self, name: &str, files: &[PathBuf]) -> Result<TreeReport> {
        let started = Instant::now();
        let (meshes, others): (Vec<PathBuf>, Vec<PathBuf>) = files
            .iter()
            .cloned()
            .partition(|p| classify(p) != MeshKind::Other);
        info!(subtree = name, meshes = meshes.len(), others = others.len(), "Mesh pipeline started");

        let mut batch = BatchResult::new();
        let copied = copy_through(&self.io, "Copy other files", &self.roots.source, &self.roots.work, &others);
        for _ in 0..copied.copied {
            batch.skip();
        }
        for (path, error) in copied.errors {
            batch.fail(path, error);
        }

        let failed = Mutex::new(Vec::new());
        let on_error = |rel: &PathBuf, e: &anyhow::Error| {
            warn!(path = %rel.display(), error = %format!("{:#}", e), "Mesh minification failed");
            copy_on_fail(&self.roots.source.join(rel), &self.roots.work.join(rel));
            failed
                .lock()
                .unwrap_or_else(|p| p.into_inner())
                .push((rel.clone(), format!("{:#}", e)));
        };
        let results = self.cpu.run("Minify meshes", &meshes, ErrorPolicy::Recover(&on_error), |rel| {
            self.process(rel).map(Some)
        })?;

        let mut sizes = SizeSummary::default();
        for result in &results {
            sizes.add(SizeSummary::new(result.org_size, result.new_size));
            if result.minified {
                batch.success();
            } else {
                batch.skip();
            }
        }
        for (path, error) in failed.into_inner().unwrap_or_else(|p| p.into_inner()) {
            batch.fail(path, error);
        }

        Ok(TreeReport::from_batch(name, &batch, sizes, started.elapsed()))
    }

    fn process(&self, rel: &Path) -> Result<MeshResult> {
        let source = self.roots.source.join(rel);
        let dest = self.roots.work.join(rel);
        let bytes = std::fs::read(&source).with_context(|| format!("Failed to read {}", source.display()))?;
        let org_size = bytes.len() as u64;

        match minify(classify(rel), &bytes, self.float_decimal) {
            Some(text) => {
                ensure_parent_dir_exists(&dest)?;
                std::fs::write(&dest, &text).with_context(|| format!("Failed to write {}", dest.display()))?;
                Ok(MeshResult {
                    org_size,
                    new_size: text.len() as u64,
                    minified: true,
                })
            }
            None => {
                debug!(path = %rel.display(), "Binary or non-UTF-8 mesh, copied unchanged");
                let new_size = copy_file(&source, &dest)?;
                Ok(MeshResult {
                    org_size,
                    new_size,
                    minified: false,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_patterns_compile() {
        for re in [
            &BLOCK_COMMENT,
            &LINE_COMMENT,
            &NEWLINE,
            &INNER_SPACES,
            &FLOAT,
            &PUNCTUATION,
            &ACT_LOD,
        ] {
            LazyLock::force(re);
        }
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify(Path::new("a/tank.ACT")), MeshKind::Act);
        assert_eq!(classify(Path::new("tank.act.2")), MeshKind::Act);
        assert_eq!(classify(Path::new("tank.lod1")), MeshKind::Act);
        assert_eq!(classify(Path::new("tank.att")), MeshKind::AttInf);
        assert_eq!(classify(Path::new("tank.inf")), MeshKind::AttInf);
        assert_eq!(classify(Path::new("tank.hi")), MeshKind::HiDescr);
        assert_eq!(classify(Path::new("tank.descr")), MeshKind::HiDescr);
        assert_eq!(classify(Path::new("tank.act.bak")), MeshKind::Other);
        assert_eq!(classify(Path::new("tank.lod")), MeshKind::Other);
    }

    #[test]
    fn test_round_float() {
        assert_eq!(round_float("1.234567", 2), "1.23");
        assert_eq!(round_float("1.235", 2), "1.24");
        assert_eq!(round_float("3.000000", 2), "3.0");
        assert_eq!(round_float("-0.001", 2), "0.0");
        assert_eq!(round_float("-1.005000", 1), "-1.0");
        assert_eq!(round_float("2.5", 0), "3.0");
    }

    #[test]
    fn test_minify_act() {
        let content = "xof 0303txt 0032\n// exported\nMesh {\n  3;\n  1.000000; 2.123456;,\n  0.5;;\n}\n";
        let out = minify_act(content, 2).unwrap();
        assert_eq!(out, "xof 0303txt 0032\nMesh{3;1.0;2.12,0.5;}");
    }

    #[test]
    fn test_act_leaves_short_floats() {
        let out = minify_act("xof 0303txt 0032\nA { 0.123; 0.1234567; }", 2).unwrap();
        assert!(out.ends_with("A{0.123;0.1234567;}"));
    }

    #[test]
    fn test_binary_act_not_minified() {
        assert!(minify_act("xof 0303bin 0032\x00\x01", 2).is_none());
        assert!(minify(MeshKind::Act, &[0xFF, 0xFE, 0x00], 2).is_none());
    }

    #[test]
    fn test_minify_att_inf() {
        let content = "/* header\n block */\nspeed = 12.3456 // km/h\n\n   armor = 0.5\n";
        assert_eq!(minify_att_inf(content, 2), "speed = 12.35\narmor = 0.5");
    }

    #[test]
    fn test_minify_hi_descr() {
        let content = "  name    \"Tiger\"   // tank\r\n\r\n\tclass\t\theavy\n";
        assert_eq!(minify_hi_descr(content), "name \"Tiger\"\nclass heavy");
    }

    #[test]
    fn test_pipeline_minifies_and_copies() {
        let dir = TempDir::new().unwrap();
        let roots = TreeRoots {
            source: dir.path().join("src"),
            scratch: dir.path().join("scratch"),
            work: dir.path().join("work"),
        };
        fs::create_dir_all(roots.source.join("tank")).unwrap();
        fs::write(roots.source.join("tank/tank.inf"), "a = 1.23456   \n\n").unwrap();
        fs::write(roots.source.join("tank/tank.act"), b"xof 0303bin 0032\x00\x01\x02").unwrap();
        fs::write(roots.source.join("tank/readme.txt"), "keep   me").unwrap();

        let pipeline = MeshPipeline {
            roots: roots.clone(),
            float_decimal: 2,
            cpu: TaskRunner::new(2),
            io: TaskRunner::new(2),
        };
        let files = shared_utils::discover_files(&roots.source).unwrap();
        let report = pipeline.run("ACTORS/ITEMS", &files).unwrap();

        assert_eq!(fs::read_to_string(roots.work.join("tank/tank.inf")).unwrap(), "a = 1.23");
        assert_eq!(
            fs::read(roots.work.join("tank/tank.act")).unwrap(),
            b"xof 0303bin 0032\x00\x01\x02"
        );
        assert_eq!(fs::read_to_string(roots.work.join("tank/readme.txt")).unwrap(), "keep   me");
        assert_eq!(report.discovered, 3);
        assert_eq!(report.optimized, 1);
        assert_eq!(report.copied, 2);
        assert!(report.sizes.saved() > 0);
    }

    proptest! {
        #[test]
        fn prop_att_output_has_no_blank_or_padded_lines(content in "[a-z0-9 .=\n\t/*]{0,200}") {
            let out = minify_att_inf(&content, 2);
            for line in out.split('\n').filter(|_| !out.is_empty()) {
                prop_assert!(!line.is_empty());
                prop_assert_eq!(line, line.trim());
            }
        }

        #[test]
        fn prop_round_float_has_fraction(value in -1.0e6f64..1.0e6, decimals in 0u32..6) {
            let out = round_float(&format!("{:.6}", value), decimals);
            prop_assert!(out.contains('.'));
            prop_assert!(out.parse::<f64>().is_ok());
        }
    }
}
