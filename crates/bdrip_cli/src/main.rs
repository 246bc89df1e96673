//! bdrip - automated disc rip workflow.
//!
//! Usage:
//!   bdrip -s filter.vpy -t BDMV/STREAM -p BDMV/PLAYLIST -b build -o out
//!   bdrip chapters -p BDMV/PLAYLIST --out chapters

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use bdrip_core::chapters::ChapterExtractor;
use bdrip_core::config::{ConfigManager, Settings};
use bdrip_core::logging::{init_tracing, init_tracing_with_file, LogLevel, WorkerGuard};
use bdrip_core::orchestrator::BatchRunner;
use bdrip_core::transform::ScriptTransform;

#[derive(Parser, Debug)]
#[command(name = "bdrip", version)]
#[command(about = "Automated BDRip workflow", long_about = None)]
#[command(subcommand_negates_reqs = true, args_conflicts_with_subcommands = true)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to the encoding script
    #[arg(short, long, required = true)]
    script: Option<PathBuf>,

    /// Directory holding the source clips
    #[arg(short = 't', long = "m2ts", required = true)]
    m2ts_dir: Option<PathBuf>,

    /// Directory holding the playlists
    #[arg(short = 'p', long = "mpls", required = true)]
    mpls_dir: Option<PathBuf>,

    /// Build directory (defaults to paths.work_root)
    #[arg(short, long = "build")]
    build_dir: Option<PathBuf>,

    /// Output directory (defaults to paths.output_folder)
    #[arg(short, long = "output")]
    out_dir: Option<PathBuf>,

    /// Settings file; created with defaults if missing
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Encoder thread pool size
    #[arg(long)]
    threads: Option<usize>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Only extract chapter files from the playlists
    Chapters {
        /// Directory holding the playlists
        #[arg(short = 'p', long = "mpls")]
        mpls_dir: PathBuf,

        /// Where to write the chapter files
        #[arg(long = "out", default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let args = Args::parse();

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns `Ok(false)` when the batch ran but some clip failed.
fn run(args: Args) -> Result<bool> {
    let mut settings = load_settings(args.config.as_deref())?;
    if let Some(threads) = args.threads {
        settings.encoder.threads = threads;
    }
    if args.verbose {
        settings.logging.level = LogLevel::Debug;
    }
    settings
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid settings")?;

    let _guard = init_logging(&settings)?;
    info!("bdrip {}", bdrip_core::version());

    if let Some(Command::Chapters { mpls_dir, out_dir }) = args.command {
        return extract_chapters(&settings, &mpls_dir, &out_dir);
    }

    // clap enforces these when no subcommand is given
    let (Some(script), Some(m2ts_dir), Some(mpls_dir)) = (args.script, args.m2ts_dir, args.mpls_dir)
    else {
        bail!("--script, --m2ts and --mpls are required");
    };
    let build_dir = args
        .build_dir
        .unwrap_or_else(|| settings.paths.work_root.clone());
    let out_dir = args
        .out_dir
        .unwrap_or_else(|| settings.paths.output_folder.clone());

    if !script.is_file() {
        bail!("Script not found: {}", script.display());
    }
    for dir in [&m2ts_dir, &mpls_dir] {
        if !dir.is_dir() {
            bail!("Directory not found: {}", dir.display());
        }
    }

    settings.tools = settings.tools.resolved();
    let transform = ScriptTransform::new(settings.tools.frameserver.clone(), &script)
        .with_timeouts(settings.timeouts.transform_info(), settings.timeouts.encode());

    let runner = BatchRunner::new(settings, Arc::new(transform));
    let report = runner
        .run_all(&m2ts_dir, &mpls_dir, &build_dir, &out_dir)
        .context("Batch could not start")?;

    for result in report.results.iter().filter(|r| !r.success) {
        let kind = result
            .error
            .as_ref()
            .map(|e| e.kind().to_string())
            .unwrap_or_default();
        error!(
            "{} failed [{}]: {}",
            result.clip_id,
            kind,
            result.error_message().unwrap_or_default()
        );
        if let Some(log) = &result.log_path {
            error!("  log: {}", log.display());
        }
    }
    println!(
        "Finished in {:.2}s: {} succeeded, {} failed",
        report.elapsed.as_secs_f64(),
        report.succeeded(),
        report.failed()
    );

    Ok(report.all_succeeded())
}

fn load_settings(config: Option<&Path>) -> Result<Settings> {
    let Some(path) = config else {
        return Ok(Settings::default());
    };
    let mut manager = ConfigManager::new(path);
    manager
        .load_or_create()
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    Ok(manager.into_settings())
}

fn init_logging(settings: &Settings) -> Result<Option<WorkerGuard>> {
    let level = settings.logging.level;
    if !settings.logging.log_to_file {
        init_tracing(level);
        return Ok(None);
    }
    let guard = init_tracing_with_file(level, &settings.paths.logs_folder).with_context(|| {
        format!(
            "Failed to open log folder {}",
            settings.paths.logs_folder.display()
        )
    })?;
    Ok(Some(guard))
}

fn extract_chapters(settings: &Settings, mpls_dir: &Path, out_dir: &Path) -> Result<bool> {
    let files = ChapterExtractor::new()
        .playlist_extension(settings.batch.playlist_extension.as_str())
        .min_chapters(settings.batch.min_chapters)
        .extract_to(mpls_dir, out_dir)?;

    if files.is_empty() {
        println!("No chapters found in {}", mpls_dir.display());
    }
    for (clip_id, path) in &files {
        println!("{} -> {}", clip_id, path.display());
    }
    Ok(true)
}
