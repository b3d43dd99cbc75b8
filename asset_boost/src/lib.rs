//! asset_boost - batch optimizer for game asset trees
//!
//! Textures become DXT-compressed DDS files (resized within bounds), text
//! meshes and configs are minified, and every file keeps its original name so
//! the game still finds it. Work happens in a staged copy of each sub-tree;
//! the live tree is replaced only when the whole sub-tree succeeded.

pub mod archive;
pub mod asset;
pub mod config;
pub mod converters;
pub mod dedup;
pub mod errors;
pub mod formats;
pub mod mesh;
pub mod probe;
pub mod resize;
pub mod run;
pub mod subtree;
pub mod texture_pipeline;

pub use archive::{Archiver, AzpArchiver, NoArchiver};
pub use asset::{AssetRecord, ImageStats, Outcome, Role, Status, TreeRoots};
pub use config::{BoostConfig, MeshSettings, Mode, SubtreeEntry, ToolPaths};
pub use converters::{convert_with_fallback, ConvertOptions, Magick, PlainCopy, Texconv, TextureConverter};
pub use dedup::deduplicate;
pub use errors::{AssetError, Result};
pub use formats::{detect_format, inspect_file, is_dds_corrupt, repair_dds_header, FileInspection, FormatTag};
pub use mesh::MeshPipeline;
pub use probe::{decide_compression, Compression, ImageProbe, MagickProbe, NoProbe};
pub use resize::{plan_resize, ResizePlan, ResizeSettings};
pub use run::run;
pub use subtree::{Toolchain, TreeKind, TreeProcessor};
pub use texture_pipeline::TexturePipeline;
