#![allow(dead_code)]

use asset_boost::config::BoostConfig;
use asset_boost::{ConvertOptions, ImageProbe, ImageStats, NoArchiver, PlainCopy, TextureConverter, Toolchain};
use shared_utils::{ConcurrencyLimits, RunReport};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const PNG: &[u8] = b"\x89PNG\r\n\x1a\npixels";
pub const TGA: &[u8] = b"\x00\x00\x02\x00\x00tga-pixels";

/// Writes `"DDS |" + input` to the output.
pub struct StubTexconv;

impl TextureConverter for StubTexconv {
    fn name(&self) -> &str {
        "texconv"
    }

    fn convert(&self, input: &Path, output: &Path, _options: &ConvertOptions) -> anyhow::Result<()> {
        let mut bytes = b"DDS |".to_vec();
        bytes.extend(fs::read(input)?);
        fs::write(output, bytes)?;
        Ok(())
    }
}

pub struct StubProbe;

impl ImageProbe for StubProbe {
    fn stats(&self, path: &Path) -> anyhow::Result<ImageStats> {
        Ok(ImageStats {
            size: fs::metadata(path)?.len(),
            width: 128,
            height: 64,
            depth: 8,
            has_alpha: false,
        })
    }

    fn alpha_report(&self, _path: &Path) -> anyhow::Result<String> {
        Ok(String::new())
    }
}

/// A base directory laid out like `<game>/Mods/<mod>/Data`.
pub struct GameDir {
    _dir: TempDir,
    pub game: PathBuf,
    pub base: PathBuf,
}

impl GameDir {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let game = dir.path().join("Game");
        let base = game.join("Mods/Redux/Data");
        fs::create_dir_all(&base).unwrap();
        Self {
            _dir: dir,
            game,
            base,
        }
    }

    pub fn write(&self, rel: &str, bytes: &[u8]) {
        let path = self.base.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, bytes).unwrap();
    }

    pub fn read(&self, rel: &str) -> Vec<u8> {
        fs::read(self.base.join(rel)).unwrap()
    }

    pub fn config(&self) -> BoostConfig {
        let mut config = BoostConfig::new(&self.base);
        config.limits = ConcurrencyLimits::with_overrides(Some(2), Some(4));
        config.show_progress = false;
        config.keep_rendered_cache = true;
        config
    }
}

pub fn run(config: &BoostConfig) -> RunReport {
    let texconv = StubTexconv;
    let probe = StubProbe;
    let tools = Toolchain {
        converters: vec![&texconv, &PlainCopy],
        probe: &probe,
        archiver: &NoArchiver,
    };
    asset_boost::run(config, &tools).unwrap()
}
