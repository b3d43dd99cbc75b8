//! Resize target planning
//!
//! Pure arithmetic: given source dimensions and the batch settings, decide
//! whether the converter should scale the texture and to what size. The
//! longest side is scaled by `percent`, clamped to `[min, max]`, and the other
//! side follows the aspect ratio. Both sides are rounded independently.

use crate::errors::{AssetError, Result};
use serde::Serialize;
use std::path::Path;

pub const DEFAULT_RESIZE_PERCENT: u32 = 60;
pub const DEFAULT_MIN_RESIZE: u32 = 32;
pub const DEFAULT_MAX_RESIZE: u32 = 512;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResizeSettings {
    pub percent: u32,
    pub min: u32,
    pub max: u32,
    /// Textures that must keep their size. An entry containing `/` names a
    /// path relative to the sub-tree, otherwise it names a file stem.
    /// Matching ignores case and extension.
    pub exclusions: Vec<String>,
}

impl Default for ResizeSettings {
    fn default() -> Self {
        Self {
            percent: DEFAULT_RESIZE_PERCENT,
            min: DEFAULT_MIN_RESIZE,
            max: DEFAULT_MAX_RESIZE,
            exclusions: vec!["startgame".to_string()],
        }
    }
}

impl ResizeSettings {
    pub fn validate(&self) -> Result<()> {
        if self.percent == 0 {
            return Err(AssetError::Settings("resize percent must be > 0".into()));
        }
        if self.min == 0 || self.min > self.max {
            return Err(AssetError::Settings(format!(
                "resize bounds must satisfy 0 < min <= max (min {}, max {})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    /// `identity` is the asset's lowercased `rel_dir/stem`.
    pub fn is_excluded(&self, identity: &str) -> bool {
        let stem = identity.rsplit('/').next().unwrap_or(identity);
        self.exclusions.iter().any(|entry| {
            let normalized = entry.replace('\\', "/").trim_matches('/').to_lowercase();
            let without_ext = match Path::new(&normalized).extension() {
                Some(ext) => normalized[..normalized.len() - ext.len() - 1].to_string(),
                None => normalized.clone(),
            };
            if without_ext.contains('/') {
                without_ext == identity
            } else {
                without_ext == stem
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResizePlan {
    Keep,
    Resize { width: u32, height: u32 },
}

impl ResizePlan {
    pub fn target(self) -> Option<(u32, u32)> {
        match self {
            ResizePlan::Keep => None,
            ResizePlan::Resize { width, height } => Some((width, height)),
        }
    }
}

pub fn plan_resize(width: u32, height: u32, settings: &ResizeSettings, excluded: bool) -> ResizePlan {
    let longest = width.max(height);

    if excluded || longest == 0 || longest <= settings.min {
        return ResizePlan::Keep;
    }
    if settings.percent == 100 && longest <= settings.max {
        return ResizePlan::Keep;
    }

    let scaled = longest as f64 * settings.percent as f64 / 100.0;
    let target = scaled.clamp(settings.min as f64, settings.max as f64);
    let ratio = target / longest as f64;

    let new_width = ((width as f64 * ratio).round() as u32).max(1);
    let new_height = ((height as f64 * ratio).round() as u32).max(1);

    if (new_width, new_height) == (width, height) {
        return ResizePlan::Keep;
    }
    ResizePlan::Resize {
        width: new_width,
        height: new_height,
    }
}
