//! flexscan: marker-calibrated centerline measurement from the command line.
//!
//! Three subcommands:
//!
//! - `analyze` measures a single still image and prints its JSON record,
//! - `live` runs the quality-gated auto-capture loop over a frame source,
//! - `card` renders a printable calibration marker.
//!
//! Logs go to stderr (filter with `RUST_LOG`); stdout carries only results.
//!
//! # Usage
//!
//! ```text
//! flexscan analyze --image capture.jpg --out overlay.png --json-out out/metrics.json
//! flexscan live --camera-index 0 --out-dir captures   # needs the `camera` feature
//! flexscan live --frames recorded/ --out-dir captures
//! flexscan card --id 3 --output marker.png
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use flexscan_export::encode_gray_png;
use flexscan_io::persist::{write_atomic, write_png, write_record};
use flexscan_io::{
    AnalyzeOptions, DirectorySink, FrameSourceSpec, LiveSession, SystemClock, analyze_image,
    open_source,
};
use flexscan_pipeline::marker::render_marker;
use flexscan_pipeline::{CaptureConfig, MarkerDictionary, SegmenterKind, UncertaintyConfig};
use tracing_subscriber::EnvFilter;

/// Marker-calibrated centerline and curvature measurement.
#[derive(Parser)]
#[command(name = "flexscan", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Measure a single image and print its JSON record.
    Analyze(AnalyzeArgs),
    /// Watch a frame source and capture automatically once quality holds.
    Live(LiveArgs),
    /// Render a printable calibration marker as PNG.
    Card(CardArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    #[arg(long)]
    image: PathBuf,

    /// Printed marker side length in millimeters.
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_MARKER_SIDE_MM)]
    marker_mm: f64,

    /// Write the annotated overlay PNG here.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Write the JSON record here (parent directories are created).
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Perturbed re-measurements for the uncertainty estimate (0 disables).
    #[arg(long, default_value_t = 0)]
    uncertainty_samples: u32,

    /// Base seed for the uncertainty ensemble.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

#[derive(Args)]
struct LiveArgs {
    /// Printed marker side length in millimeters.
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_MARKER_SIDE_MM)]
    marker_mm: f64,

    /// Frames read per burst (3-12).
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_BURST_FRAMES)]
    burst_frames: u32,

    /// Composite score (0-100) a frame must reach to count as good.
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_QUALITY_THRESHOLD)]
    threshold: u8,

    /// Consecutive good frames required to trigger a capture.
    #[arg(long, default_value_t = CaptureConfig::DEFAULT_CONSECUTIVE_FRAMES)]
    consecutive: u32,

    /// Camera device index (requires a build with the `camera` feature).
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Replay the images in this directory (in name order) instead of a camera.
    #[arg(long)]
    frames: Option<PathBuf>,

    /// Directory receiving capture images and metrics records.
    #[arg(long, default_value = "captures")]
    out_dir: PathBuf,

    /// Perturbed re-measurements per capture (0 disables).
    #[arg(long, default_value_t = 0)]
    uncertainty_samples: u32,

    /// Stop after this many frames.
    #[arg(long)]
    max_frames: Option<u64>,

    /// Full capture config as a JSON string.
    ///
    /// When provided, the individual config flags are ignored. The JSON
    /// must be a valid `CaptureConfig` serialization; missing fields take
    /// their defaults.
    #[arg(long)]
    config_json: Option<String>,
}

#[derive(Args)]
struct CardArgs {
    /// Marker id within the dictionary.
    #[arg(long, default_value_t = 0)]
    id: u16,

    /// Side length of one marker module in pixels.
    #[arg(long, default_value_t = 40, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    module_px: u32,

    /// Width of the white quiet zone, in modules.
    #[arg(long, default_value_t = 1)]
    quiet_modules: u32,

    /// Output PNG path.
    #[arg(long)]
    output: PathBuf,
}

/// Install the stderr log subscriber (`RUST_LOG` overrides `info`).
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn analyze(args: &AnalyzeArgs) -> Result<(), String> {
    let options = AnalyzeOptions {
        marker_side_mm: args.marker_mm,
        uncertainty: UncertaintyConfig {
            samples: args.uncertainty_samples,
            seed: args.seed,
            ..UncertaintyConfig::default()
        },
        ..AnalyzeOptions::default()
    };
    let result = analyze_image(&args.image, &options, &SegmenterKind::default())
        .map_err(|e| format!("Error analyzing {}: {e}", args.image.display()))?;

    if let Some(path) = &args.out {
        write_png(path, &result.overlay).map_err(|e| e.to_string())?;
    }
    if let Some(path) = &args.json_out {
        write_record(path, &result.record).map_err(|e| e.to_string())?;
    }

    let json = result
        .record
        .to_json_pretty()
        .map_err(|e| format!("Error serializing record: {e}"))?;
    println!("{json}");
    Ok(())
}

/// Build the capture config from `--config-json` or the individual flags.
fn capture_config(args: &LiveArgs) -> Result<CaptureConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(CaptureConfig {
        marker_side_mm: args.marker_mm,
        quality_threshold: args.threshold,
        consecutive_frames: args.consecutive,
        burst_frames: args.burst_frames,
        camera_index: args.camera_index,
        uncertainty_samples: args.uncertainty_samples,
        ..CaptureConfig::default()
    })
}

fn live(args: &LiveArgs) -> Result<(), String> {
    let config = capture_config(args)?;
    config.validate().map_err(|e| e.to_string())?;

    let spec = args.frames.clone().map_or(
        FrameSourceSpec::Device(config.camera_index),
        FrameSourceSpec::Directory,
    );
    let source = open_source(&spec).map_err(|e| e.to_string())?;
    let sink = DirectorySink::new(&args.out_dir).map_err(|e| e.to_string())?;

    let mut session = LiveSession::new(
        source,
        SegmenterKind::default(),
        SystemClock::new(),
        sink,
        config,
    )
    .map_err(|e| e.to_string())?;
    let summary = session.run(args.max_frames).map_err(|e| e.to_string())?;

    for artifacts in &summary.captures {
        println!(
            "{}\t{}",
            artifacts.image.display(),
            artifacts.metrics.display()
        );
    }
    Ok(())
}

fn card(args: &CardArgs) -> Result<(), String> {
    let dictionary = MarkerDictionary::default();
    let marker = render_marker(dictionary, args.id, args.module_px, args.quiet_modules)
        .ok_or_else(|| {
            format!(
                "Marker id {} is not in the dictionary (ids 0..{})",
                args.id,
                dictionary.codes().len()
            )
        })?;
    let png = encode_gray_png(&marker).map_err(|e| format!("Error encoding marker: {e}"))?;
    write_atomic(&args.output, &png).map_err(|e| e.to_string())?;
    println!("{}", args.output.display());
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    let result = match &cli.command {
        Command::Analyze(args) => analyze(args),
        Command::Live(args) => live(args),
        Command::Card(args) => card(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("{msg}");
            ExitCode::FAILURE
        }
    }
}
