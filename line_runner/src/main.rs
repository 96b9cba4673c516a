// THEORY:
// `line_runner` is the station binary. It parses the CLI, sets up logging, builds
// the inspection pipeline from one JSON config and wires it to the capture and
// actuator collaborators. One-shot `inspect` and `classify` commands reuse the same
// pipeline without touching hardware.

mod acquisition;
mod actuator;
mod line;
mod settings;

use acquisition::{CommandFrameSource, FileFrameSource};
use actuator::{DryRunActuator, SerialActuator};
use anyhow::{Context, Result};
use burn_inspector::pipeline::StageOutcome;
use burn_inspector::{ActuatorDriver, BurnStateClassifier, FrameSource, InspectionPipeline};
use clap::{Parser, Subcommand};
use line::{InspectionLine, LineSettings};
use settings::RunnerConfig;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "line_runner")]
#[command(about = "Inspect items on the line for burn state and drive the reject actuator")]
#[command(version)]
struct Cli {
    /// JSON config file. Built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the inspection loop against the camera and actuator.
    Run {
        /// Override the configured number of cycles.
        #[arg(long)]
        max_cycles: Option<u32>,

        /// Log reject decisions instead of driving the serial actuator.
        #[arg(long)]
        dry_run: bool,
    },

    /// Run one full inspection cycle on an image file.
    Inspect {
        #[arg(long)]
        image: PathBuf,
    },

    /// Classify the burn state of a whole image, skipping presence and geometry.
    Classify {
        #[arg(long)]
        image: PathBuf,
    },

    /// Print the effective configuration as JSON.
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { max_cycles, dry_run } => run(config, max_cycles, dry_run).await,
        Commands::Inspect { image } => inspect(&config, &image),
        Commands::Classify { image } => classify(&config, &image),
        Commands::PrintConfig => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<RunnerConfig> {
    match path {
        Some(path) => RunnerConfig::load(path),
        None => {
            let config = RunnerConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

async fn run(config: RunnerConfig, max_cycles: Option<u32>, dry_run: bool) -> Result<()> {
    let pipeline = InspectionPipeline::from_config(&config.inspection)
        .context("building the inspection pipeline")?;

    let source: Box<dyn FrameSource + Send> = match &config.capture.command {
        Some(command) => Box::new(
            CommandFrameSource::new(command, config.capture.frame_path.clone(), config.capture.timeout())
                .context("capture.command must name a program")?,
        ),
        None => Box::new(FileFrameSource::new(config.capture.frame_path.clone())),
    };

    let actuator: Box<dyn ActuatorDriver + Send> = if dry_run || config.actuator.port.is_none() {
        tracing::warn!("no actuator connected, reject decisions are only logged");
        Box::new(DryRunActuator::default())
    } else {
        Box::new(SerialActuator::open(&config.actuator)?)
    };

    let settings = LineSettings {
        max_cycles: max_cycles.unwrap_or(config.inspection.max_cycles),
        cycle_delay: config.inspection.cycle_delay(),
        capture_timeout: config.capture.timeout(),
        actuation_timeout: config.actuator.timeout(),
    };
    let line = InspectionLine::new(pipeline, source, actuator, settings);

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after the current cycle");
            let _ = stop_tx.send(true);
        }
    });

    let summary = line.run(stop_rx).await?;
    println!(
        "{} cycles, {} rejected, {} removed, {} unreadable frames, {} actuator failures{}",
        summary.cycles_completed,
        summary.rejected,
        summary.removed,
        summary.unreadable_frames,
        summary.actuation_failures,
        if summary.interrupted { " (interrupted)" } else { "" }
    );
    Ok(())
}

fn inspect(config: &RunnerConfig, image: &Path) -> Result<()> {
    let pipeline = InspectionPipeline::from_config(&config.inspection)?;
    let report = pipeline.inspect_path(image)?;

    for stage in &report.stages {
        match stage {
            StageOutcome::Presence { is_present, foreground_pixels } => {
                println!("presence: {} ({} foreground pixels)", is_present, foreground_pixels);
            }
            StageOutcome::Geometry { descriptor, accepted } => {
                println!(
                    "geometry: area {:.1}, angle {:.1}, accepted {}",
                    descriptor.area, descriptor.angle_degrees, accepted
                );
            }
            StageOutcome::RegionMissing => println!("geometry: no region found"),
            StageOutcome::BurnState(classification) => {
                println!(
                    "burn state: {} (mean colour {})",
                    classification.state, classification.descriptor
                );
            }
        }
    }
    println!("verdict: {}", report.verdict);
    Ok(())
}

fn classify(config: &RunnerConfig, image: &Path) -> Result<()> {
    let classifier = BurnStateClassifier::new(
        config.inspection.burn_state_rules.clone(),
        config.inspection.reference_color_table.clone(),
    )?;
    let classification = classifier.classify_path(image)?;
    println!("{} (mean colour {})", classification.state, classification.descriptor);
    Ok(())
}
