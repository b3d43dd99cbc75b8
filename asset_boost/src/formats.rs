//! Texture format identification
//!
//! Game data is full of textures whose extension lies about their content
//! (`sword.tga` holding PNG bytes) and of DDS files with a damaged header that
//! converters refuse to open. This module reads the 5-byte signature prefix,
//! reports what the bytes really are, and patches broken DDS headers.

use crate::errors::{AssetError, Result};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Bytes read from the start of a file for identification.
pub const SIGNATURE_LEN: usize = 5;

/// A valid DDS starts with `"DDS "` followed by the header size, 124 (`'|'`).
const DDS_VALID_PREFIX: &[u8; SIGNATURE_LEN] = b"DDS |";
const DDS_HEADER_SIZE: u32 = 124;
/// CAPS | HEIGHT | WIDTH | PIXELFORMAT | MIPMAPCOUNT | LINEARSIZE
const DDS_REPAIR_FLAGS: u32 = 0x000A_1007;

/// Image type ids a TGA header may carry in its third byte.
const TGA_IMAGE_TYPES: [u8; 7] = [0, 1, 2, 3, 9, 10, 11];

/// Texture extensions handled by the texture pipeline.
pub const TEXTURE_EXTENSIONS: &[&str] = &["tga", "dds", "bmp", "png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatTag {
    Dds,
    Png,
    Bmp,
    Gif,
    Jpeg,
    Tga,
}

impl FormatTag {
    /// Canonical extension used when a file has to carry its real format.
    pub fn extension(self) -> &'static str {
        match self {
            FormatTag::Dds => "dds",
            FormatTag::Png => "png",
            FormatTag::Bmp => "bmp",
            FormatTag::Gif => "gif",
            FormatTag::Jpeg => "jpg",
            FormatTag::Tga => "tga",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "dds" => Some(FormatTag::Dds),
            "png" => Some(FormatTag::Png),
            "bmp" => Some(FormatTag::Bmp),
            "gif" => Some(FormatTag::Gif),
            "jpg" | "jpeg" => Some(FormatTag::Jpeg),
            "tga" => Some(FormatTag::Tga),
            _ => None,
        }
    }
}

/// Result of signature matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Detection {
    pub format: FormatTag,
    /// False when nothing matched and TGA was assumed
    pub confident: bool,
}

/// Match a signature prefix. Container magics win over the TGA first-bytes
/// heuristic; anything unrecognised is assumed to be TGA, which has no magic.
pub fn detect_format_from_bytes(prefix: &[u8; SIGNATURE_LEN]) -> Detection {
    let format = if &prefix[0..4] == b"DDS " {
        Some(FormatTag::Dds)
    } else if &prefix[1..4] == b"PNG" {
        Some(FormatTag::Png)
    } else if &prefix[0..2] == b"BM" {
        Some(FormatTag::Bmp)
    } else if &prefix[0..3] == b"GIF" {
        Some(FormatTag::Gif)
    } else if prefix[0..3] == [0xFF, 0xD8, 0xFF] {
        Some(FormatTag::Jpeg)
    } else if TGA_IMAGE_TYPES.contains(&prefix[2]) {
        Some(FormatTag::Tga)
    } else {
        None
    };

    match format {
        Some(format) => Detection {
            format,
            confident: true,
        },
        None => Detection {
            format: FormatTag::Tga,
            confident: false,
        },
    }
}

fn read_signature(path: &Path) -> Result<[u8; SIGNATURE_LEN]> {
    let read_err = |source| AssetError::Read {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::open(path).map_err(read_err)?;
    let mut buf = [0u8; SIGNATURE_LEN];
    let mut filled = 0;
    while filled < SIGNATURE_LEN {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        }
    }
    if filled < SIGNATURE_LEN {
        return Err(AssetError::Truncated {
            path: path.to_path_buf(),
            read: filled,
            needed: SIGNATURE_LEN,
        });
    }
    Ok(buf)
}

/// Identify a file by content. A file shorter than the signature is an error.
pub fn detect_format(path: &Path) -> Result<Detection> {
    let prefix = read_signature(path)?;
    let detection = detect_format_from_bytes(&prefix);
    if !detection.confident {
        tracing::warn!(path = %path.display(), "Unknown signature, assuming TGA");
    }
    Ok(detection)
}

/// True when a DDS file's header size field is wrong.
pub fn is_dds_corrupt(path: &Path) -> Result<bool> {
    Ok(&read_signature(path)? != DDS_VALID_PREFIX)
}

/// Rewrite the DDS header size and flags fields in place.
pub fn repair_dds_header(path: &Path) -> Result<()> {
    let repair_err = |message: String| AssetError::Repair {
        path: path.to_path_buf(),
        message,
    };

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| repair_err(e.to_string()))?;
    let len = file.metadata().map_err(|e| repair_err(e.to_string()))?.len();
    if len < 12 {
        return Err(repair_err(format!("file is only {} bytes", len)));
    }

    let mut patch = [0u8; 8];
    patch[0..4].copy_from_slice(&DDS_HEADER_SIZE.to_le_bytes());
    patch[4..8].copy_from_slice(&DDS_REPAIR_FLAGS.to_le_bytes());

    write_at(&mut file, 4, &patch).map_err(|e| repair_err(e.to_string()))
}

fn write_at(file: &mut File, offset: u64, bytes: &[u8]) -> std::io::Result<()> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes)?;
    file.flush()
}

/// What `detect` reports for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileInspection {
    pub path: PathBuf,
    pub declared: Option<FormatTag>,
    pub detected: FormatTag,
    pub confident: bool,
    pub mismatch: bool,
    pub dds_corrupt: bool,
}

pub fn inspect_file(path: &Path) -> Result<FileInspection> {
    let detection = detect_format(path)?;
    let declared = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(FormatTag::from_extension);
    let dds_corrupt = detection.format == FormatTag::Dds && is_dds_corrupt(path)?;
    Ok(FileInspection {
        path: path.to_path_buf(),
        declared,
        detected: detection.format,
        confident: detection.confident,
        mismatch: declared != Some(detection.format),
        dds_corrupt,
    })
}

/// Rank used to pick the canonical member of a duplicate group; lower wins.
/// The target format ranks best, lossless sources next, lossy last.
pub fn format_priority(ext: &str) -> u8 {
    match ext.to_ascii_lowercase().as_str() {
        "dds" => 1,
        "tga" => 2,
        "png" => 3,
        "bmp" => 4,
        "jpg" => 5,
        "jpeg" => 6,
        _ => 99,
    }
}
