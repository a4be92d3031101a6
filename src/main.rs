//! bgfkit CLI
//!
//! Command-line interface for decoding Europa 1400 models and converting
//! them to Wavefront OBJ and glTF.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing::{error, info, warn};

use bgfkit_export::{
    BatchReport, GltfExportOptions, MissingMaterialPolicy, ModelsDecoder, ModelsDecoderConfig, WavefrontOptions,
};
use bgfkit_parsers::logging::{self, TracingConfig};
use bgfkit_parsers::{BafFile, BafIniFile, BgfFile, HumanReadable, ParseOptions};

/// bgfkit - Europa 1400 model decoder and converter
#[derive(Parser)]
#[command(name = "bgfkit")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose output (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract the game resources and convert models to OBJ and glTF
    Convert(ConvertArgs),

    /// Show the decoded structure of a BGF or BAF file
    Info(InfoArgs),
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
enum MissingMaterial {
    /// Export the faces without a texture
    #[default]
    Untextured,
    /// Fail the model
    Error,
}

impl From<MissingMaterial> for MissingMaterialPolicy {
    fn from(value: MissingMaterial) -> Self {
        match value {
            MissingMaterial::Untextured => Self::Untextured,
            MissingMaterial::Error => Self::Error,
        }
    }
}

#[derive(Args)]
struct ConvertArgs {
    /// Game installation directory (contains Resources/)
    #[arg(long)]
    game_path: Option<PathBuf>,

    /// Output directory
    #[arg(long)]
    output_path: PathBuf,

    /// Convert a single model instead of every extracted one
    #[arg(long)]
    bgf_file: Option<PathBuf>,

    /// Animation to merge into the glTF output of --bgf-file
    #[arg(long, requires = "bgf_file")]
    baf_file: Option<PathBuf>,

    /// Write binary .glb files instead of .gltf + .bin
    #[arg(long)]
    glb: bool,

    /// Treat footer count and checksum mismatches as errors
    #[arg(long)]
    strict: bool,

    /// Retry the other footer shape when the expected one does not fit
    #[arg(long)]
    footer_fallback: bool,

    /// Additional file names that use the reduced footer (can be repeated)
    #[arg(long = "reduced-footer")]
    reduced_footer: Vec<String>,

    /// What to do with faces whose material has no texture
    #[arg(long, value_enum, default_value_t = MissingMaterial::Untextured)]
    missing_material: MissingMaterial,

    /// Model names to skip (can be repeated)
    #[arg(long)]
    exclude: Vec<String>,
}

#[derive(Args)]
struct InfoArgs {
    /// Path to a .bgf or .baf file
    path: PathBuf,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_with_config(TracingConfig::default().with_verbosity(cli.verbose));

    match cli.command {
        Commands::Convert(args) => cmd_convert(args),
        Commands::Info(args) => cmd_info(&args),
    }
}

fn cmd_convert(args: ConvertArgs) -> Result<()> {
    let game_path = match args.game_path {
        Some(path) => path,
        None => pick_game_path()?,
    };

    let missing_material = MissingMaterialPolicy::from(args.missing_material);
    let mut config = ModelsDecoderConfig::new(game_path, args.output_path);
    config.bgf_file = args.bgf_file;
    config.baf_file = args.baf_file;
    config.exclude = args.exclude;
    config.parse = ParseOptions {
        strict_validation: args.strict,
        footer_fallback: args.footer_fallback,
        extra_reduced_footer_files: args.reduced_footer,
        ..ParseOptions::default()
    };
    config.wavefront = WavefrontOptions { missing_material };
    config.gltf = GltfExportOptions {
        use_glb: args.glb,
        missing_material,
        ..GltfExportOptions::default()
    };

    let decoder = ModelsDecoder::new(config).context("Invalid configuration")?;
    info!(
        game = %decoder.config().game_path.display(),
        output = %decoder.layout().root.display(),
        "Starting conversion"
    );

    let report = decoder.run()?;
    print_batch_report(&report);

    if report.failure_count() > 0 {
        bail!("{} of {} models failed", report.failure_count(), report.failure_count() + report.success_count());
    }
    Ok(())
}

fn print_batch_report(report: &BatchReport) {
    for converted in &report.converted {
        for warning in &converted.warnings {
            warn!(file = %converted.source.display(), "{warning}");
        }
    }
    for failed in &report.failed {
        error!(file = %failed.source.display(), "{}", failed.error);
    }
    if report.cancelled {
        warn!("Conversion was cancelled before all models were processed");
    }

    println!(
        "Converted {} models ({} failed, {} skipped, {} warnings)",
        report.success_count(),
        report.failure_count(),
        report.skipped.len(),
        report.warning_count()
    );
}

#[cfg(feature = "picker")]
fn pick_game_path() -> Result<PathBuf> {
    match rfd::FileDialog::new().set_title("Select the game directory").pick_folder() {
        Some(path) => Ok(path),
        None => bail!("No game directory selected"),
    }
}

#[cfg(not(feature = "picker"))]
fn pick_game_path() -> Result<PathBuf> {
    Err(bgfkit_core::Error::configuration("--game-path is required (build with the `picker` feature for a folder dialog)").into())
}

fn cmd_info(args: &InfoArgs) -> Result<()> {
    let path = &args.path;

    if !path.exists() {
        bail!("File not found: {}", path.display());
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    match ext.as_str() {
        "bgf" => {
            let bgf = BgfFile::from_file(path, &ParseOptions::default())
                .with_context(|| format!("Failed to decode {}", path.display()))?;
            print_summary(&bgf, args.format)
        }
        "baf" => {
            let baf = BafFile::from_file(path).with_context(|| format!("Failed to decode {}", path.display()))?;
            print_summary(&baf, args.format)?;
            print_clips(path, &baf, args.format)
        }
        _ => bail!("Unsupported file type: {}", path.display()),
    }
}

fn print_summary(item: &dyn HumanReadable, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", item.to_readable_string()),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&item.to_json())?),
    }
    Ok(())
}

/// Clip table of a BAF file, from its sidecar or the whole range
fn print_clips(path: &Path, baf: &BafFile, format: OutputFormat) -> Result<()> {
    if format != OutputFormat::Text {
        return Ok(());
    }
    let ini = BafIniFile::for_animation(path, baf.keyframe_count())?;
    println!("Clips:");
    for clip in &ini.clips {
        println!("  {:<16} frames {}..={}", clip.name, clip.start, clip.end);
    }
    Ok(())
}
