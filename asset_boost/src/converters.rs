//! DDS converters and the fallback chain
//!
//! A texture is offered to each strategy in order (texconv, then ImageMagick,
//! then a plain byte copy). The first strategy that exits cleanly and leaves
//! an output file wins. A failed attempt never leaves its partial output
//! behind for the next strategy to trip over.

use crate::probe::Compression;
use anyhow::{bail, Context, Result};
use shared_utils::tool_process::run_tool;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_MIP_LEVELS: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub compression: Compression,
    pub mip_levels: u32,
    /// Target `(width, height)`, `None` keeps the source size
    pub resize: Option<(u32, u32)>,
    /// Source bit depth; > 8 is reduced to 8 for DXT
    pub source_depth: u32,
}

pub trait TextureConverter: Send + Sync {
    fn name(&self) -> &str;

    /// Write `output` from `input`. `output` lives in an existing directory
    /// and carries the input's stem.
    fn convert(&self, input: &Path, output: &Path, options: &ConvertOptions) -> Result<()>;

    /// True for the last-resort strategy that does not transform anything.
    fn is_passthrough(&self) -> bool {
        false
    }
}

/// DirectXTex `texconv`. Writes `<out_dir>/<input stem>.dds`.
#[derive(Debug, Clone)]
pub struct Texconv {
    pub exe: PathBuf,
    pub timeout: Duration,
}

impl Texconv {
    fn build_args(input: &Path, out_dir: &Path, options: &ConvertOptions) -> Vec<String> {
        let mut args = vec![
            input.display().to_string(),
            "-o".to_string(),
            out_dir.display().to_string(),
            "--overwrite".to_string(),
            "--single-proc".to_string(),
            "--file-type".to_string(),
            "dds".to_string(),
            "--mip-levels".to_string(),
            options.mip_levels.to_string(),
            "--format".to_string(),
            options.compression.as_str().to_string(),
        ];
        if let Some((width, height)) = options.resize {
            args.extend([
                "--width".to_string(),
                width.to_string(),
                "--height".to_string(),
                height.to_string(),
            ]);
        }
        args
    }
}

impl TextureConverter for Texconv {
    fn name(&self) -> &str {
        "texconv"
    }

    fn convert(&self, input: &Path, output: &Path, options: &ConvertOptions) -> Result<()> {
        let out_dir = output
            .parent()
            .with_context(|| format!("Output has no parent: {}", output.display()))?;
        let mut cmd = Command::new(&self.exe);
        cmd.args(Self::build_args(input, out_dir, options));
        run_tool("texconv", &mut cmd, self.timeout)?;
        Ok(())
    }
}

/// ImageMagick `magick` with the DDS coder.
#[derive(Debug, Clone)]
pub struct Magick {
    pub exe: PathBuf,
    pub timeout: Duration,
}

impl Magick {
    fn build_args(input: &Path, output: &Path, options: &ConvertOptions) -> Vec<String> {
        let mut args = vec![
            input.display().to_string(),
            "-define".to_string(),
            format!("dds:mipmaps={}", options.mip_levels),
            "-define".to_string(),
            "dds:fast-mipmaps=true".to_string(),
            "-define".to_string(),
            "dds:weighted=false".to_string(),
            "-define".to_string(),
            format!("dds:compression={}", options.compression.as_str()),
        ];
        if options.source_depth > 8 {
            args.extend(["-depth".to_string(), "8".to_string()]);
        }
        if let Some((width, height)) = options.resize {
            // '>' only ever shrinks
            args.extend(["-resize".to_string(), format!("{}x{}>", width, height)]);
        }
        args.push(format!("dds:{}", output.display()));
        args
    }
}

impl TextureConverter for Magick {
    fn name(&self) -> &str {
        "magick"
    }

    fn convert(&self, input: &Path, output: &Path, options: &ConvertOptions) -> Result<()> {
        let mut cmd = Command::new(&self.exe);
        cmd.args(Self::build_args(input, output, options));
        run_tool("magick", &mut cmd, self.timeout)?;
        Ok(())
    }
}

/// Byte copy of the input. Keeps the asset present when no converter can read it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCopy;

impl TextureConverter for PlainCopy {
    fn name(&self) -> &str {
        "copy"
    }

    fn convert(&self, input: &Path, output: &Path, _options: &ConvertOptions) -> Result<()> {
        shared_utils::copy_file(input, output)?;
        Ok(())
    }

    fn is_passthrough(&self) -> bool {
        true
    }
}

/// Which strategy produced the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertSuccess {
    pub strategy: String,
    pub passthrough: bool,
}

/// Try each converter in order until one produces `output`.
pub fn convert_with_fallback(
    chain: &[&dyn TextureConverter],
    input: &Path,
    output: &Path,
    options: &ConvertOptions,
) -> Result<ConvertSuccess> {
    let mut last_error = None;

    for converter in chain {
        discard_partial(output);
        match converter.convert(input, output, options) {
            Ok(()) if output.is_file() => {
                debug!(
                    strategy = converter.name(),
                    output = %output.display(),
                    "Texture converted"
                );
                return Ok(ConvertSuccess {
                    strategy: converter.name().to_string(),
                    passthrough: converter.is_passthrough(),
                });
            }
            Ok(()) => {
                warn!(
                    strategy = converter.name(),
                    input = %input.display(),
                    "Converter reported success but wrote no output"
                );
                last_error = Some(anyhow::anyhow!("{} wrote no output", converter.name()));
            }
            Err(e) => {
                warn!(
                    strategy = converter.name(),
                    input = %input.display(),
                    error = %format!("{:#}", e),
                    "Converter failed, trying next strategy"
                );
                last_error = Some(e);
            }
        }
    }

    discard_partial(output);
    match last_error {
        Some(e) => Err(e.context(format!("all converters failed for {}", input.display()))),
        None => bail!("no converters configured"),
    }
}

fn discard_partial(output: &Path) {
    if output.exists() {
        if let Err(e) = std::fs::remove_file(output) {
            warn!(output = %output.display(), error = %e, "Failed to remove partial output");
        }
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes `"DDS |" + input bytes`, or fails when told to.
    #[derive(Default)]
    pub struct FakeConverter {
        pub name: &'static str,
        pub fail: bool,
        pub calls: AtomicUsize,
    }

    impl FakeConverter {
        pub fn ok(name: &'static str) -> Self {
            Self {
                name,
                ..Default::default()
            }
        }

        pub fn failing(name: &'static str) -> Self {
            Self {
                name,
                fail: true,
                ..Default::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TextureConverter for FakeConverter {
        fn name(&self) -> &str {
            self.name
        }

        fn convert(&self, input: &Path, output: &Path, _options: &ConvertOptions) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            // a crashing converter may still leave half a file behind
            std::fs::write(output, b"partial")?;
            if self.fail {
                bail!("{} crashed", self.name);
            }
            let mut bytes = b"DDS |".to_vec();
            bytes.extend(std::fs::read(input)?);
            std::fs::write(output, bytes)?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fakes::FakeConverter;
    use super::*;
    use tempfile::TempDir;

    fn options(resize: Option<(u32, u32)>) -> ConvertOptions {
        ConvertOptions {
            compression: Compression::Dxt5,
            mip_levels: DEFAULT_MIP_LEVELS,
            resize,
            source_depth: 16,
        }
    }

    #[test]
    fn test_texconv_args() {
        let args = Texconv::build_args(Path::new("in/a.png"), Path::new("out"), &options(Some((64, 32))));
        assert_eq!(
            args,
            [
                "in/a.png", "-o", "out", "--overwrite", "--single-proc", "--file-type", "dds",
                "--mip-levels", "4", "--format", "dxt5", "--width", "64", "--height", "32"
            ]
        );
    }

    #[test]
    fn test_magick_args() {
        let args = Magick::build_args(Path::new("a.tga"), Path::new("out/a.dds"), &options(Some((64, 32))));
        assert!(args.contains(&"dds:compression=dxt5".to_string()));
        assert!(args.windows(2).any(|w| w == ["-depth", "8"]));
        assert!(args.windows(2).any(|w| w == ["-resize", "64x32>"]));
        assert_eq!(args.last().unwrap(), "dds:out/a.dds");

        let plain = Magick::build_args(
            Path::new("a.tga"),
            Path::new("a.dds"),
            &ConvertOptions {
                source_depth: 8,
                ..options(None)
            },
        );
        assert!(!plain.iter().any(|a| a == "-depth" || a == "-resize"));
    }

    #[test]
    fn test_fallback_order() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.png");
        let output = dir.path().join("a.dds");
        std::fs::write(&input, b"png!").unwrap();

        let primary = FakeConverter::failing("primary");
        let secondary = FakeConverter::ok("secondary");
        let copy = PlainCopy;
        let chain: [&dyn TextureConverter; 3] = [&primary, &secondary, &copy];

        let done = convert_with_fallback(&chain, &input, &output, &options(None)).unwrap();
        assert_eq!(done.strategy, "secondary");
        assert!(!done.passthrough);
        assert_eq!(std::fs::read(&output).unwrap(), b"DDS |png!");
        assert_eq!(primary.calls(), 1);
        assert_eq!(secondary.calls(), 1);
    }

    #[test]
    fn test_plain_copy_is_last_resort() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("a.png");
        let output = dir.path().join("a.dds");
        std::fs::write(&input, b"png!").unwrap();

        let primary = FakeConverter::failing("primary");
        let secondary = FakeConverter::failing("secondary");
        let chain: [&dyn TextureConverter; 3] = [&primary, &secondary, &PlainCopy];

        let done = convert_with_fallback(&chain, &input, &output, &options(None)).unwrap();
        assert!(done.passthrough);
        assert_eq!(std::fs::read(&output).unwrap(), b"png!");
    }

    #[test]
    fn test_all_failing_leaves_no_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("missing.png");
        let output = dir.path().join("a.dds");

        let primary = FakeConverter::failing("primary");
        let chain: [&dyn TextureConverter; 2] = [&primary, &PlainCopy];

        assert!(convert_with_fallback(&chain, &input, &output, &options(None)).is_err());
        assert!(!output.exists());
    }
}
