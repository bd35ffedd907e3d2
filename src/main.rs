mod config;
mod convert;
mod errors;
mod media;
mod stems;
mod utils;
mod watcher;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::collections::HashSet;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc::unbounded_channel;

use config::AppConfig;
use convert::runner::ConversionRunner;
use convert::{ConversionEvent, ConversionJob, ConversionSettings, JobOutcome};
use errors::{AppError, Result};
use media::{OutputFormat, QualityTier};
use stems::SpleeterSeparator;
use watcher::FolderWatcher;

#[derive(Parser)]
#[command(
    name = "ffx-convert",
    version,
    about = "Batch audio/video converter built on FFmpeg, with enhancement presets, folder watching and optional stem separation"
)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one or more input files, strictly in order
    Convert {
        /// Input media files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[command(flatten)]
        opts: ConvertOpts,
    },
    /// Watch a folder and convert each newly created media file
    Watch {
        /// Folder to watch (defaults to the last watched one)
        folder: Option<PathBuf>,

        #[command(flatten)]
        opts: ConvertOpts,
    },
    /// Show or update persisted settings
    Config {
        /// Set the ffmpeg executable path
        #[arg(long)]
        ffmpeg: Option<PathBuf>,
        /// Set the default output folder
        #[arg(long)]
        output: Option<PathBuf>,
        /// Set the default watch folder
        #[arg(long)]
        watch_folder: Option<PathBuf>,
        /// Set the stem-separation command
        #[arg(long)]
        stems_command: Option<String>,
    },
}

#[derive(Args)]
struct ConvertOpts {
    /// Output folder (defaults to the last used one)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target container/codec
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Quality tier
    #[arg(short, long)]
    quality: Option<QualityTier>,

    /// Enhancement preset, e.g. "Normalize", "Rock EQ", "Auto (Genre)"
    #[arg(short, long)]
    enhance: Option<String>,

    /// Custom base name for outputs (suffixed _1, _2, ...)
    #[arg(long)]
    name: Option<String>,

    /// Do not map metadata from the input
    #[arg(long)]
    no_metadata: bool,

    /// Separate stems from each produced file (requires a separator tool)
    #[arg(long)]
    stems: bool,

    /// Path to the ffmpeg executable (overrides the configured one)
    #[arg(long)]
    ffmpeg: Option<PathBuf>,

    /// Append raw ffmpeg output lines to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print raw ffmpeg output lines
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Warn)
        .init();

    let cli = Cli::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Failed to load configuration: {}", e);
            AppConfig::default()
        }
    };

    match cli.cmd {
        Commands::Convert { inputs, opts } => {
            let settings = build_settings(&mut config, &opts)?;
            validate_inputs(&inputs)?;
            utils::ensure_dir_exists(&settings.output_folder).await?;
            config.save()?;

            let outcome = run_one_job(inputs, settings, &config, &opts).await?;
            match outcome {
                JobOutcome::Completed => println!("All conversions finished successfully"),
                JobOutcome::Stopped => println!("Conversion stopped by user"),
                JobOutcome::Failed { file, message } => {
                    anyhow::bail!("Conversion failed for {}: {}", file.display(), message)
                }
            }
        }
        Commands::Watch { folder, opts } => {
            let folder = folder
                .or_else(|| config.watch_folder.clone())
                .ok_or_else(|| AppError::Validation("No watch folder selected".to_string()))?;
            if !folder.is_dir() {
                return Err(
                    AppError::Validation(format!("Not a directory: {}", folder.display())).into(),
                );
            }

            let settings = build_settings(&mut config, &opts)?;
            utils::ensure_dir_exists(&settings.output_folder).await?;
            config.watch_folder = Some(folder.clone());
            config.save()?;

            watch_and_convert(&folder, settings, &config, &opts).await?;
        }
        Commands::Config {
            ffmpeg,
            output,
            watch_folder,
            stems_command,
        } => {
            let mut changed = false;
            if let Some(path) = ffmpeg {
                config.ffmpeg_path = Some(path);
                changed = true;
            }
            if let Some(path) = output {
                config.output_folder = Some(path);
                changed = true;
            }
            if let Some(path) = watch_folder {
                config.watch_folder = Some(path);
                changed = true;
            }
            if let Some(command) = stems_command {
                config.stems.command = command;
                changed = true;
            }

            if changed {
                config.save()?;
                println!("Settings saved");
            } else {
                println!("{}", serde_json::to_string_pretty(&config)?);
            }
        }
    }

    Ok(())
}

/// Merge CLI flags over the persisted settings and remember the selections.
fn build_settings(config: &mut AppConfig, opts: &ConvertOpts) -> Result<ConversionSettings> {
    let ffmpeg_path = opts
        .ffmpeg
        .clone()
        .or_else(|| config.resolve_ffmpeg())
        .ok_or_else(|| {
            AppError::NotFound(
                "ffmpeg not found; set it with `ffx-convert config --ffmpeg <path>` or add it to PATH"
                    .to_string(),
            )
        })?;

    let output_folder = opts
        .output
        .clone()
        .or_else(|| config.output_folder.clone())
        .ok_or_else(|| AppError::Validation("No output folder selected".to_string()))?;

    let format = opts.format.unwrap_or(config.last_format);
    let quality = opts.quality.unwrap_or(config.last_quality);
    let enhancement = opts
        .enhance
        .clone()
        .unwrap_or_else(|| config.last_enhancement.clone());
    let keep_metadata = if opts.no_metadata { false } else { config.keep_metadata };
    let separate_stems = opts.stems || config.separate_stems;

    config.ffmpeg_path = Some(ffmpeg_path.clone());
    config.output_folder = Some(output_folder.clone());
    config.last_format = format;
    config.last_quality = quality;
    config.last_enhancement = enhancement.clone();

    Ok(ConversionSettings {
        ffmpeg_path,
        output_folder,
        format,
        quality,
        enhancement,
        custom_name: opts.name.clone(),
        keep_metadata,
        separate_stems,
    })
}

fn validate_inputs(inputs: &[PathBuf]) -> Result<()> {
    if inputs.is_empty() {
        return Err(AppError::Validation("No input files selected".to_string()));
    }
    for input in inputs {
        if !input.is_file() {
            return Err(AppError::Validation(format!(
                "Input file not found: {}",
                input.display()
            )));
        }
    }
    Ok(())
}

fn make_runner(config: &AppConfig, settings: &ConversionSettings) -> ConversionRunner {
    let runner = ConversionRunner::new();
    if settings.separate_stems {
        runner.with_stem_separator(Arc::new(SpleeterSeparator::from_config(&config.stems)))
    } else {
        runner
    }
}

async fn run_one_job(
    inputs: Vec<PathBuf>,
    settings: ConversionSettings,
    config: &AppConfig,
    opts: &ConvertOpts,
) -> Result<JobOutcome> {
    let runner = make_runner(config, &settings);
    let file_count = inputs.len();
    let job = ConversionJob::new(inputs, settings);

    let (tx, rx) = unbounded_channel();
    let handle = runner.spawn(job, tx);
    info!("Started job {} ({} files)", handle.job_id, file_count);

    let outcome = drive_events(rx, opts, handle.stop_flag()).await?;
    let _ = handle.wait().await;
    Ok(outcome)
}

/// Render events: a per-file progress bar, optional raw-line echo, and an
/// optional append-only log file. Ctrl-C is the stop button: it raises the
/// cooperative flag, observed by the runner per file and per output line.
async fn drive_events(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ConversionEvent>,
    opts: &ConvertOpts,
    stop: Arc<std::sync::atomic::AtomicBool>,
) -> Result<JobOutcome> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg:30!} [{bar:40.cyan/blue}] {pos:>3}%")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );

    let mut log_file = match &opts.log_file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };

    let mut outcome = JobOutcome::Stopped;
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                stop.store(true, std::sync::atomic::Ordering::SeqCst);
                bar.println("Stop requested...");
                continue;
            }
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match event {
            ConversionEvent::Log(line) => {
                if let Some(file) = log_file.as_mut() {
                    writeln!(file, "{}", line)?;
                }
                if opts.verbose {
                    bar.println(line);
                }
            }
            ConversionEvent::FileStarted { input, .. } => {
                bar.set_position(0);
                bar.set_message(
                    input
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| input.display().to_string()),
                );
            }
            ConversionEvent::Progress { percent, .. } => {
                bar.set_position(percent as u64);
            }
            ConversionEvent::FileCompleted { output, .. } => {
                bar.set_position(100);
                bar.println(format!("Done: {}", output.display()));
            }
            ConversionEvent::Finished(result) => {
                outcome = result;
                break;
            }
        }
    }
    bar.finish_and_clear();

    Ok(outcome)
}

/// Watch mode: every newly created media file becomes its own single-file
/// job, converted sequentially in arrival order. Duplicate paths are
/// filtered by a membership check; a failed file does not stop the watch.
async fn watch_and_convert(
    folder: &std::path::Path,
    settings: ConversionSettings,
    config: &AppConfig,
    opts: &ConvertOpts,
) -> Result<()> {
    let mut watcher = FolderWatcher::watch(folder)?;
    let mut seen: HashSet<PathBuf> = HashSet::new();
    println!("Watching {} (Ctrl-C to stop)", folder.display());

    loop {
        let path = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            path = watcher.next_created() => match path {
                Some(path) => path,
                None => break,
            },
        };

        if !path.is_file() || !media::is_media_file(&path) || !seen.insert(path.clone()) {
            continue;
        }

        println!("Auto-added: {}", path.display());
        let runner = make_runner(config, &settings);
        let job = ConversionJob::new(vec![path.clone()], settings.clone());
        let (tx, rx) = unbounded_channel();
        let handle = runner.spawn(job, tx);

        match drive_events(rx, opts, handle.stop_flag()).await? {
            JobOutcome::Completed => {}
            JobOutcome::Stopped => {
                let _ = handle.wait().await;
                break;
            }
            JobOutcome::Failed { file, message } => {
                eprintln!("Conversion failed for {}: {}", file.display(), message);
            }
        }
        let _ = handle.wait().await;
    }

    println!("Watch stopped");
    Ok(())
}
