//! Image probing and DXT compression choice
//!
//! Dimensions, bit depth and alpha presence come from `magick identify`.
//! Whether the alpha channel is worth DXT5 is decided from
//! `magick <img> -verbose info:` channel statistics.

use crate::asset::ImageStats;
use crate::errors::AssetError;
use regex::Regex;
use serde::Serialize;
use shared_utils::tool_process::run_tool;
use shared_utils::BoostError;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::LazyLock;
use std::time::Duration;

/// `%B|%w|%h|%[depth]|%[channels]` -> `size|width|height|depth|channels`
const IDENTIFY_FORMAT: &str = "%B|%w|%h|%[depth]|%[channels]";

static ALPHA_DEPTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Alpha:\s+(\d+)-bit").expect("valid alpha depth regex"));
static ALPHA_MIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Alpha:\s+min:\s+\d+\s+\(([\d.]+)\)").expect("valid alpha min regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Opaque or 1-bit alpha
    Dxt1,
    /// Real alpha gradient
    Dxt5,
}

impl Compression {
    pub fn as_str(self) -> &'static str {
        match self {
            Compression::Dxt1 => "dxt1",
            Compression::Dxt5 => "dxt5",
        }
    }
}

pub trait ImageProbe: Send + Sync {
    fn stats(&self, path: &Path) -> anyhow::Result<ImageStats>;

    /// Verbose channel statistics used by [`decide_compression`].
    fn alpha_report(&self, path: &Path) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct MagickProbe {
    pub magick: PathBuf,
    pub timeout: Duration,
}

impl ImageProbe for MagickProbe {
    fn stats(&self, path: &Path) -> anyhow::Result<ImageStats> {
        let mut cmd = Command::new(&self.magick);
        cmd.arg("identify").arg("-format").arg(IDENTIFY_FORMAT).arg(path);
        let output = run_tool("magick", &mut cmd, self.timeout)?;
        Ok(parse_identify(path, &output.stdout)?)
    }

    fn alpha_report(&self, path: &Path) -> anyhow::Result<String> {
        let mut cmd = Command::new(&self.magick);
        cmd.arg(path).arg("-verbose").arg("info:");
        Ok(run_tool("magick", &mut cmd, self.timeout)?.stdout)
    }
}

/// Used when `magick` could not be found: every probe fails, so textures are
/// converted without resizing and keep their alpha.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl ImageProbe for NoProbe {
    fn stats(&self, _path: &Path) -> anyhow::Result<ImageStats> {
        Err(BoostError::ToolNotFound("magick".into()).into())
    }

    fn alpha_report(&self, _path: &Path) -> anyhow::Result<String> {
        Err(BoostError::ToolNotFound("magick".into()).into())
    }
}

/// Parse one `identify` line. Multi-frame files print one line per frame;
/// the first frame describes the texture.
pub fn parse_identify(path: &Path, stdout: &str) -> Result<ImageStats, AssetError> {
    let probe_err = |message: String| AssetError::Probe {
        path: path.to_path_buf(),
        message,
    };

    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| probe_err("identify printed nothing".into()))?;

    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() < 5 {
        return Err(probe_err(format!("unexpected identify output: {:?}", line)));
    }
    let number = |idx: usize, name: &str| -> Result<u64, AssetError> {
        // %B may carry a unit suffix on some builds ("1234B")
        let digits: String = fields[idx].chars().take_while(|c| c.is_ascii_digit()).collect();
        digits
            .parse::<u64>()
            .map_err(|_| probe_err(format!("bad {} field: {:?}", name, fields[idx])))
    };
    let small = |idx: usize, name: &str| -> Result<u32, AssetError> {
        let value = number(idx, name)?;
        u32::try_from(value).map_err(|_| probe_err(format!("{} out of range: {}", name, value)))
    };

    Ok(ImageStats {
        size: number(0, "size")?,
        width: small(1, "width")?,
        height: small(2, "height")?,
        depth: small(3, "depth")?,
        has_alpha: fields[4].to_ascii_lowercase().contains('a'),
    })
}

/// Pick DXT1 unless the alpha channel carries real information.
///
/// `verbose` is the `-verbose info:` dump, `None` when it could not be
/// produced. Without usable statistics DXT5 is chosen so alpha is never lost.
pub fn decide_compression(stats: &ImageStats, verbose: Option<&str>) -> Compression {
    if !stats.has_alpha {
        return Compression::Dxt1;
    }

    let output = match verbose {
        Some(text) if !text.trim().is_empty() => text,
        _ => return Compression::Dxt5,
    };

    let depth = ALPHA_DEPTH
        .captures(output)
        .and_then(|c| c[1].parse::<u32>().ok());
    match depth {
        None => return Compression::Dxt1,
        Some(1) => return Compression::Dxt1,
        Some(_) => {}
    }

    // alpha whose minimum is fully opaque is unused
    let min = ALPHA_MIN
        .captures(output)
        .and_then(|c| c[1].parse::<f64>().ok());
    if min == Some(1.0) {
        return Compression::Dxt1;
    }

    Compression::Dxt5
}
