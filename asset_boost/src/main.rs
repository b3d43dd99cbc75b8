use asset_boost::config::{BoostConfig, Mode, ToolPaths};
use asset_boost::converters::{Magick, PlainCopy, Texconv, TextureConverter};
use asset_boost::{
    inspect_file, AzpArchiver, Archiver, FileInspection, ImageProbe, MagickProbe, NoArchiver,
    NoProbe, Toolchain,
};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use shared_utils::logging::{init_logging, LogConfig};
use shared_utils::{print_summary_report, ConcurrencyLimits};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "asset-boost")]
#[command(version, about = "Batch optimizer for game asset trees", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Optimize the asset sub-trees of a mod's Data directory in place
    Run {
        #[arg(value_name = "BASE_DIR")]
        base_dir: PathBuf,

        #[arg(short, long, value_enum, default_value = "all")]
        mode: Mode,

        /// Scale of the longest texture side, in percent
        #[arg(long, default_value_t = asset_boost::resize::DEFAULT_RESIZE_PERCENT)]
        resize_percent: u32,

        #[arg(long, default_value_t = asset_boost::resize::DEFAULT_MIN_RESIZE)]
        min_resize: u32,

        #[arg(long, default_value_t = asset_boost::resize::DEFAULT_MAX_RESIZE)]
        max_resize: u32,

        /// Decimals kept when rounding mesh floats
        #[arg(long, default_value_t = asset_boost::mesh::DEFAULT_FLOAT_DECIMAL)]
        float_decimal: u32,

        /// Concurrent conversions (default: CPU cores)
        #[arg(long)]
        cpu_limit: Option<usize>,

        /// Concurrent file operations
        #[arg(long, default_value_t = shared_utils::thread_manager::DEFAULT_IO_LIMIT)]
        io_limit: usize,

        /// Texture never resized (relative path or bare name, repeatable)
        #[arg(long = "exclude", value_name = "REL_PATH", default_value = "SPLASHES/startgame.tga")]
        exclude: Vec<String>,

        /// Directory holding texconv, magick and azp (directly or one folder deep)
        #[arg(long)]
        tools_dir: Option<PathBuf>,

        /// Seconds before a hung external tool is killed
        #[arg(long, default_value_t = asset_boost::config::DEFAULT_TOOL_TIMEOUT_SECS)]
        tool_timeout: u64,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,

        #[arg(long)]
        no_progress: bool,

        /// Leave the game's RenderedItems cache alone
        #[arg(long)]
        keep_rendered_cache: bool,

        #[arg(short, long)]
        verbose: bool,

        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },

    /// Report the real format of texture files
    Detect {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        #[arg(short, long, value_enum, default_value = "human")]
        output: OutputFormat,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (verbose, log_dir) = match &cli.command {
        Commands::Run {
            verbose, log_dir, ..
        } => (*verbose, log_dir.clone()),
        Commands::Detect { .. } => (false, None),
    };
    let mut log_config = LogConfig::default().with_level(if verbose { Level::DEBUG } else { Level::INFO });
    if let Some(dir) = log_dir {
        log_config = log_config.with_log_dir(dir);
    }
    if let Err(e) = init_logging("asset_boost", log_config) {
        eprintln!("⚠️ [logging] {:#}, continuing without log file", e);
    }

    match cli.command {
        Commands::Run {
            base_dir,
            mode,
            resize_percent,
            min_resize,
            max_resize,
            float_decimal,
            cpu_limit,
            io_limit,
            exclude,
            tools_dir,
            tool_timeout,
            output,
            no_progress,
            keep_rendered_cache,
            ..
        } => {
            let mut config = BoostConfig::new(base_dir);
            config.mode = mode;
            config.resize.percent = resize_percent;
            config.resize.min = min_resize;
            config.resize.max = max_resize;
            config.resize.exclusions = exclude;
            config.mesh.float_decimal = float_decimal;
            config.limits = ConcurrencyLimits::with_overrides(cpu_limit, Some(io_limit));
            config.tool_timeout = Duration::from_secs(tool_timeout);
            config.show_progress = !no_progress && output == OutputFormat::Human;
            config.keep_rendered_cache = keep_rendered_cache;

            run_command(&config, tools_dir, output)
        }
        Commands::Detect { files, output } => detect_command(&files, output),
    }
}

fn run_command(config: &BoostConfig, tools_dir: Option<PathBuf>, output: OutputFormat) -> anyhow::Result<()> {
    let paths = ToolPaths::discover(tools_dir.as_deref());
    info!(
        base = %config.base_dir.display(),
        mode = ?config.mode,
        cpu = config.limits.cpu,
        io = config.limits.io,
        "Asset boost started"
    );

    let texconv = paths.texconv.clone().map(|exe| Texconv {
        exe,
        timeout: config.tool_timeout,
    });
    let magick = paths.magick.clone().map(|exe| Magick {
        exe,
        timeout: config.tool_timeout,
    });
    let magick_probe = paths.magick.clone().map(|magick| MagickProbe {
        magick,
        timeout: config.tool_timeout,
    });
    let azp = paths.azp.clone().map(|exe| AzpArchiver {
        exe,
        timeout: config.tool_timeout,
    });

    let mut converters: Vec<&dyn TextureConverter> = Vec::new();
    if let Some(texconv) = &texconv {
        converters.push(texconv);
    }
    if let Some(magick) = &magick {
        converters.push(magick);
    }
    converters.push(&PlainCopy);

    let probe: &dyn ImageProbe = match &magick_probe {
        Some(probe) => probe,
        None => &NoProbe,
    };
    let archiver: &dyn Archiver = match &azp {
        Some(azp) => azp,
        None => &NoArchiver,
    };
    let tools = Toolchain {
        converters,
        probe,
        archiver,
    };

    let report = asset_boost::run(config, &tools)?;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Human => print_summary_report(&report),
    }

    if !report.aborted.is_empty() {
        anyhow::bail!("{} sub-tree(s) aborted, backups kept", report.aborted.len());
    }
    Ok(())
}

fn detect_command(files: &[PathBuf], output: OutputFormat) -> anyhow::Result<()> {
    let mut results: Vec<FileInspection> = Vec::new();
    let mut errors = 0;

    for path in files {
        match inspect_file(path) {
            Ok(inspection) => {
                if output == OutputFormat::Human {
                    print_inspection_human(&inspection);
                }
                results.push(inspection);
            }
            Err(e) => {
                errors += 1;
                eprintln!("{} {}: {}", style("❌").red(), path.display(), e);
            }
        }
    }

    if output == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }
    if errors > 0 {
        anyhow::bail!("{} file(s) could not be inspected", errors);
    }
    Ok(())
}

fn print_inspection_human(inspection: &FileInspection) {
    let declared = inspection
        .declared
        .map(|f| f.extension().to_string())
        .unwrap_or_else(|| "?".to_string());
    let mut line = format!(
        "{}  declared {}  detected {}",
        inspection.path.display(),
        declared,
        inspection.detected.extension()
    );
    if !inspection.confident {
        line.push_str(" (assumed)");
    }
    if inspection.mismatch {
        line = format!("{}  {}", line, style("misformatted").yellow());
    }
    if inspection.dds_corrupt {
        line = format!("{}  {}", line, style("corrupt DDS header").red());
    }
    println!("{}", line);
}
