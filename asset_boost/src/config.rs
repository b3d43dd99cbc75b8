//! Run configuration
//!
//! Plain structs built by the CLI (or by tests) and handed to [`crate::run`].
//! Nothing here reads global state except tool discovery, which consults the
//! `ASSET_BOOST_*` environment overrides, the bundled tools directory and
//! `PATH`, in that order.

use crate::errors::{AssetError, Result};
use crate::mesh::DEFAULT_FLOAT_DECIMAL;
use crate::resize::ResizeSettings;
use crate::subtree::TreeKind;
use clap::ValueEnum;
use serde::Serialize;
use shared_utils::{resolve_tool, ConcurrencyLimits};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;
pub const TEXTURE_SUBTREE: &str = "MEDIA";
pub const MESH_SUBTREE: &str = "ACTORS/ITEMS";
/// Largest accepted `float_decimal`; beyond this f64 rounding is noise.
const MAX_FLOAT_DECIMAL: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    All,
    Textures,
    Meshes,
}

impl Mode {
    pub fn includes(self, kind: TreeKind) -> bool {
        match self {
            Mode::All => true,
            Mode::Textures => kind == TreeKind::Textures,
            Mode::Meshes => kind == TreeKind::Meshes,
        }
    }
}

/// A named sub-tree of the base directory and the pipeline it runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtreeEntry {
    /// `/`-separated path relative to the base directory
    pub rel: String,
    pub kind: TreeKind,
}

impl SubtreeEntry {
    pub fn new(rel: impl Into<String>, kind: TreeKind) -> Self {
        Self {
            rel: rel.into(),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeshSettings {
    pub float_decimal: u32,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            float_decimal: DEFAULT_FLOAT_DECIMAL,
        }
    }
}

/// Resolved locations of the external tools; `None` when not installed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ToolPaths {
    pub texconv: Option<PathBuf>,
    pub magick: Option<PathBuf>,
    pub azp: Option<PathBuf>,
}

impl ToolPaths {
    pub const TEXCONV_ENV: &'static str = "ASSET_BOOST_TEXCONV";
    pub const MAGICK_ENV: &'static str = "ASSET_BOOST_MAGICK";
    pub const AZP_ENV: &'static str = "ASSET_BOOST_AZP";

    /// Look every tool up. `tools_dir` may hold the executables directly or
    /// one level down, one vendor folder per tool.
    pub fn discover(tools_dir: Option<&Path>) -> Self {
        let search_dirs = tools_dir.map(bundle_dirs).unwrap_or_default();
        Self {
            texconv: find_tool("texconv", Self::TEXCONV_ENV, &search_dirs),
            magick: find_tool("magick", Self::MAGICK_ENV, &search_dirs),
            azp: find_tool("azp", Self::AZP_ENV, &search_dirs),
        }
    }
}

fn bundle_dirs(tools_dir: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![tools_dir.to_path_buf()];
    if let Ok(entries) = std::fs::read_dir(tools_dir) {
        let mut nested: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        nested.sort();
        dirs.extend(nested);
    }
    dirs
}

fn find_tool(name: &str, env_var: &str, search_dirs: &[PathBuf]) -> Option<PathBuf> {
    let override_path = std::env::var_os(env_var).map(PathBuf::from);
    match resolve_tool(name, override_path.as_deref(), search_dirs) {
        Ok(path) => {
            debug!(tool = name, path = %path.display(), "Tool found");
            Some(path)
        }
        Err(e) => {
            warn!(tool = name, error = %e, "Tool not available");
            None
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BoostConfig {
    pub base_dir: PathBuf,
    pub mode: Mode,
    pub subtrees: Vec<SubtreeEntry>,
    pub resize: ResizeSettings,
    pub mesh: MeshSettings,
    #[serde(skip)]
    pub limits: ConcurrencyLimits,
    pub tool_timeout: Duration,
    pub show_progress: bool,
    pub keep_rendered_cache: bool,
}

impl BoostConfig {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            mode: Mode::All,
            subtrees: vec![
                SubtreeEntry::new(MESH_SUBTREE, TreeKind::Meshes),
                SubtreeEntry::new(TEXTURE_SUBTREE, TreeKind::Textures),
            ],
            resize: ResizeSettings::default(),
            mesh: MeshSettings::default(),
            limits: ConcurrencyLimits::default(),
            tool_timeout: Duration::from_secs(DEFAULT_TOOL_TIMEOUT_SECS),
            show_progress: true,
            keep_rendered_cache: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.resize.validate()?;
        if self.mesh.float_decimal > MAX_FLOAT_DECIMAL {
            return Err(AssetError::Settings(format!(
                "float decimal must be <= {} (got {})",
                MAX_FLOAT_DECIMAL, self.mesh.float_decimal
            )));
        }
        if self.tool_timeout.is_zero() {
            return Err(AssetError::Settings("tool timeout must be > 0".into()));
        }
        Ok(())
    }

    /// Sub-trees the selected mode runs, in configured order.
    pub fn selected_subtrees(&self) -> Vec<&SubtreeEntry> {
        self.subtrees
            .iter()
            .filter(|s| self.mode.includes(s.kind))
            .collect()
    }
}
