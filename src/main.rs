//! dubmux - final-stage synthesis for a video dubbing pipeline
//!
//! Walks folders of pipeline artifacts and turns each translated transcript,
//! dubbed audio track and source video into a finished video with ffmpeg.

use anyhow::Result;
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;
use tracing::{info, Level};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use tracing_appender::{non_blocking, rolling};

use dubmux::cli::{Args, Commands, ConfigAction};
use dubmux::config::Config;
use dubmux::error::DubmuxError;
use dubmux::synthesis::SynthesisOptions;
use dubmux::workflow::{BatchSummary, FolderOutcome, Workflow};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new("config.toml").exists() {
                info!("Found config.toml in current directory, loading...");
                Config::from_file("config.toml")?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Config { action } => match action {
            ConfigAction::Init { output, force } => {
                if output.exists() && !force {
                    return Err(DubmuxError::Config(format!(
                        "{} already exists, use --force to overwrite",
                        output.display()
                    ))
                    .into());
                }
                Config::default().save_to_file(&output)?;
                println!("Wrote default configuration to {}", output.display());
            }
            ConfigAction::Show => {
                println!("{}", toml::to_string_pretty(&config)?);
            }
        },
        Commands::Synthesize {
            folder,
            no_subtitles,
            speed_up,
            fps,
            resolution,
            bgm,
            bgm_volume,
            video_volume,
            watermark,
        } => {
            let synthesis = &mut config.synthesis;
            synthesis.subtitles &= !no_subtitles;
            if let Some(speed_up) = speed_up {
                synthesis.speed_up = speed_up;
            }
            if let Some(fps) = fps {
                synthesis.fps = fps;
            }
            if let Some(resolution) = resolution {
                synthesis.resolution = resolution;
            }
            if bgm.is_some() {
                synthesis.bgm_path = bgm;
            }
            if let Some(volume) = bgm_volume {
                synthesis.bgm_volume = volume;
            }
            if let Some(volume) = video_volume {
                synthesis.video_volume = volume;
            }
            if watermark.is_some() {
                synthesis.watermark_path = watermark;
            }

            let options = SynthesisOptions::from_config(&config.synthesis)?;
            let workflow = Workflow::new(config)?;
            let version = workflow.check_tools().await?;
            info!("Using {}", version);

            let spinner = spinner(format!("Synthesizing videos under {}", folder.display()))?;
            let summary = workflow.synthesize_all(&folder, &options).await;
            spinner.finish_and_clear();

            print_summary(&summary?);
        }
        Commands::Separate { folder, model, device, shifts } => {
            let separation = &mut config.separation;
            if let Some(model) = model {
                separation.model_name = model;
            }
            if let Some(device) = device {
                separation.device = device;
            }
            if let Some(shifts) = shifts {
                separation.shifts = shifts;
            }

            let workflow = Workflow::new(config)?;
            workflow.check_tools().await?;

            let spinner = spinner(format!("Separating audio under {}", folder.display()))?;
            let summary = workflow.separate_all(&folder).await;
            workflow.release_separator().await;
            spinner.finish_and_clear();

            print_summary(&summary?);
        }
        Commands::Status { folder } => {
            let workflow = Workflow::new(config)?;
            let statuses = workflow.status(&folder)?;
            if statuses.is_empty() {
                println!("No unit folders found under {}", folder.display());
            }

            for (relative, status) in statuses {
                let stages = status
                    .stages()
                    .iter()
                    .map(|(label, present)| format!("{}{}", if *present { "+" } else { "-" }, label))
                    .collect::<Vec<_>>()
                    .join(" ");
                println!("{:<40} {}", relative.display(), stages);
            }
        }
        Commands::Probe { video, resolution } => {
            let resolution = resolution.unwrap_or_else(|| config.synthesis.resolution.clone());
            let workflow = Workflow::new(config)?;
            let (source, target) = workflow.probe(&video, resolution.parse()?).await?;
            let metrics = target.font_metrics();

            println!("Source:   {}x{}", source.width, source.height);
            println!("Output:   {} ({})", target.size_arg(), resolution);
            println!("Font:     size {}, outline {}", metrics.font_size, metrics.outline);
        }
        Commands::Subtitles { input, output, speed_up } => {
            let speed_up = speed_up.unwrap_or(config.synthesis.speed_up);
            let workflow = Workflow::new(config)?;
            let count = workflow.generate_subtitles(&input, &output, speed_up).await?;
            println!("Wrote {} cues to {}", count, output.display());
        }
    }

    info!("dubmux completed successfully");
    Ok(())
}

fn spinner(message: String) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Ok(pb)
}

fn print_summary(summary: &BatchSummary) {
    for result in &summary.results {
        let line = match &result.outcome {
            FolderOutcome::Synthesized(report) => format!(
                "done     {}x{} cues={} bgm={} subtitles={}",
                report.geometry.width,
                report.geometry.height,
                report.cue_count,
                report.bgm_mixed,
                report.subtitles_burned
            ),
            FolderOutcome::Separated(outcome) => format!("done     {:?}", outcome),
            FolderOutcome::Skipped { missing } => format!("skipped  missing {}", missing.join(", ")),
            FolderOutcome::Failed { error } => format!("failed   {}", error),
        };
        println!("{:<40} {}", result.relative.display(), line);
    }

    println!("{}", summary.message);
    if let Some(output) = &summary.last_output {
        println!("Last output: {}", output.display());
    }
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".dubmux").join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "dubmux.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("dubmux.log").display()
    );

    Ok(())
}
