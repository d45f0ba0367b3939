//! Command-line interface for radar object counting.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::{ColorKey, CountingConfig, PlotAxes, PlotConfig};
use crate::core::frame::Frame;
use crate::core::{loaders, writers};
use crate::processors::counting::{count_objects, ObjectCountReport};
use crate::visualization::{self, PlotBounds};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "radar-object-count")]
#[command(about = "Count moving objects in radar point cloud sequences", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Overrides for the counting parameters shared by `count` and `plot`.
#[derive(clap::Args, Debug, Default)]
struct CountingArgs {
    /// Background-only recording that enriches the noise profile
    #[arg(short, long)]
    background: Option<PathBuf>,

    /// Minimum neighbourhood size (including the point) for a core point
    #[arg(long)]
    min_samples: Option<usize>,

    /// Neighbourhood radius in (x, y, z, v) space
    #[arg(long)]
    eps: Option<f32>,

    /// A position is noise when it occurs more than this many times
    #[arg(long)]
    thresh: Option<usize>,

    /// Abort when the whole count takes longer than this many seconds
    #[arg(long)]
    deadline_secs: Option<f64>,
}

impl CountingArgs {
    fn apply(&self, base: &CountingConfig) -> CountingConfig {
        CountingConfig {
            min_samples: self.min_samples.unwrap_or(base.min_samples),
            eps: self.eps.unwrap_or(base.eps),
            thresh: self.thresh.unwrap_or(base.thresh),
            deadline_secs: self.deadline_secs.or(base.deadline_secs),
            ..base.clone()
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate the number of objects in a frame sequence
    Count {
        /// Long-format CSV (frame,x,y,z,v) or directory of frame_<n>.csv files
        data: PathBuf,

        #[command(flatten)]
        counting: CountingArgs,

        /// Write every filtered point with its cluster label
        #[arg(long)]
        labels_out: Option<PathBuf>,

        /// Write per-frame cluster counts and velocity floors
        #[arg(long)]
        counts_out: Option<PathBuf>,
    },

    /// Render filtered, clustered frames as PNG scatter plots
    Plot {
        /// Long-format CSV (frame,x,y,z,v) or directory of frame_<n>.csv files
        data: PathBuf,

        /// Output directory for PNG files
        output_dir: PathBuf,

        #[command(flatten)]
        counting: CountingArgs,

        /// Axes to plot; xyz is a 3-D projection
        #[arg(long, value_enum)]
        axes: Option<PlotAxes>,

        /// Colour points by velocity or by cluster label
        #[arg(long, value_enum)]
        color: Option<ColorKey>,

        /// Only render the first N frames
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Render raw frames as PNG scatter plots, coloured by velocity
    PlotRaw {
        /// Long-format CSV (frame,x,y,z,v) or directory of frame_<n>.csv files
        data: PathBuf,

        /// Output directory for PNG files
        output_dir: PathBuf,

        /// Axes to plot; xyz is a 3-D projection
        #[arg(long, value_enum)]
        axes: Option<PlotAxes>,

        /// Drop points whose |v| is below this value
        #[arg(long, default_value_t = 0.0)]
        min_abs_velocity: f32,

        /// Only render the first N frames
        #[arg(long)]
        limit: Option<usize>,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn create_progress_bar(len: usize, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    pb.set_message(message.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let outcome = match cli.command {
        Commands::Count { data, counting, labels_out, counts_out } => {
            cmd_count(&data, &counting, labels_out.as_deref(), counts_out.as_deref(), &config)
        }
        Commands::Plot { data, output_dir, counting, axes, color, limit } => {
            let plot = PlotConfig {
                axes: axes.unwrap_or(config.plotting.axes),
                color: color.unwrap_or(config.plotting.color),
                ..config.plotting.clone()
            };
            cmd_plot(&data, &output_dir, &counting, &plot, limit, &config)
        }
        Commands::PlotRaw { data, output_dir, axes, min_abs_velocity, limit } => {
            let plot = PlotConfig {
                axes: axes.unwrap_or(config.plotting.axes),
                ..config.plotting.clone()
            };
            cmd_plot_raw(&data, &output_dir, &plot, min_abs_velocity, limit)
        }
    };

    if let Err(e) = outcome {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// Configuration from `--config`, or defaults when none was given.
///
/// A config file that was asked for but cannot be read or fails validation is
/// an error; it is never replaced by defaults.
fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_yaml(path)
                .with_context(|| format!("invalid config file {}", path.display()))?;
            info!("Loaded config from: {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn load_frames(path: &Path) -> Result<Vec<Frame>> {
    loaders::load_sequence(path).with_context(|| format!("failed to load frames from {}", path.display()))
}

/// Load frames and background, then run the counting pipeline.
fn run_count(data: &Path, counting: &CountingArgs, config: &PipelineConfig) -> Result<(Vec<Frame>, ObjectCountReport)> {
    let counting_config = counting.apply(&config.counting);

    let spinner = create_spinner("Loading frames...");
    let frames = load_frames(data)?;
    let background = match &counting.background {
        Some(path) => load_frames(path)?,
        None => Vec::new(),
    };

    spinner.set_message(format!("Counting objects over {} frames...", frames.len()));
    let report = count_objects(&frames, &background, &counting_config);
    spinner.finish_and_clear();

    let report = report.context("object counting failed")?;
    Ok((frames, report))
}

fn cmd_count(
    data: &Path,
    counting: &CountingArgs,
    labels_out: Option<&Path>,
    counts_out: Option<&Path>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let counting_config = counting.apply(&config.counting);

    println!("Counting objects...");
    println!("Input: {}", data.display());
    println!("Parameters:");
    println!("  min_samples: {}", counting_config.min_samples);
    println!("  eps: {}", counting_config.eps);
    println!("  thresh: {}", counting_config.thresh);

    let (frames, report) = run_count(data, counting, config)?;

    if let Some(path) = labels_out {
        writers::write_labels_csv(path, &report)
            .with_context(|| format!("failed to write labels to {}", path.display()))?;
        info!("Wrote labels to {}", path.display());
    }
    if let Some(path) = counts_out {
        writers::write_counts_csv(path, &report)
            .with_context(|| format!("failed to write counts to {}", path.display()))?;
        info!("Wrote counts to {}", path.display());
    }

    let counts = report.frame_counts();
    let undefined = report
        .frames
        .iter()
        .filter(|frame| frame.velocity_floor.value().is_none())
        .count();

    print_summary(
        "Object Count Complete",
        &[
            ("Input", data.display().to_string()),
            ("Frames", frames.len().to_string()),
            ("Estimated objects", report.estimate.to_string()),
            ("Max frame count", counts.iter().max().copied().unwrap_or(0).to_string()),
            ("Frames w/o floor", undefined.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_plot(
    data: &Path,
    output_dir: &Path,
    counting: &CountingArgs,
    plot: &PlotConfig,
    limit: Option<usize>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();

    println!("Plotting filtered frames...");
    println!("Input: {}", data.display());
    println!("Output directory: {}", output_dir.display());

    let (_, report) = run_count(data, counting, config)?;
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let total = limit.map_or(report.frames.len(), |lim| lim.min(report.frames.len()));
    let bounds = PlotBounds::from_points(
        report.frames[..total]
            .iter()
            .flat_map(|frame| frame.filtered.points.iter().copied()),
    );
    let pb = create_progress_bar(total, "Rendering");
    let mut written = 0usize;

    for (idx, frame) in report.frames.iter().take(total).enumerate() {
        pb.inc(1);
        if frame.filtered.is_empty() {
            warn!("frame {}: no points left after filtering, skipping", idx);
            continue;
        }
        let path = output_dir.join(format!("frame_{:04}_clusters_{}.png", idx, frame.clusters));
        visualization::plot_frame(&path, &frame.filtered.points, &frame.labels, bounds.as_ref(), plot)
            .with_context(|| format!("failed to render {}", path.display()))?;
        written += 1;
    }
    pb.finish_and_clear();

    print_summary(
        "Plot Complete",
        &[
            ("Output directory", output_dir.display().to_string()),
            ("Estimated objects", report.estimate.to_string()),
            ("Frames rendered", written.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}

fn cmd_plot_raw(
    data: &Path,
    output_dir: &Path,
    plot: &PlotConfig,
    min_abs_velocity: f32,
    limit: Option<usize>,
) -> Result<()> {
    let start = Instant::now();

    println!("Plotting raw frames...");
    println!("Input: {}", data.display());
    println!("Output directory: {}", output_dir.display());
    println!("Min |v|: {}", min_abs_velocity);

    let spinner = create_spinner("Loading frames...");
    let frames = load_frames(data);
    spinner.finish_and_clear();
    let frames = frames?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("failed to create {}", output_dir.display()))?;

    let total = limit.map_or(frames.len(), |lim| lim.min(frames.len()));
    let bounds = PlotBounds::from_points(
        frames[..total]
            .iter()
            .flat_map(|frame| visualization::moving_points(frame, min_abs_velocity)),
    );
    let pb = create_progress_bar(total, "Rendering");
    let mut written = 0usize;

    for (idx, frame) in frames.iter().take(total).enumerate() {
        pb.inc(1);
        let path = output_dir.join(format!("frame_{:04}_raw.png", idx));
        match visualization::plot_raw_frame(&path, frame, min_abs_velocity, bounds.as_ref(), plot) {
            Ok(()) => written += 1,
            Err(visualization::VisualizationError::EmptyPointCloud) => {
                warn!("frame {}: no points with |v| >= {}, skipping", idx, min_abs_velocity);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("failed to render {}", path.display()));
            }
        }
    }
    pb.finish_and_clear();

    print_summary(
        "Raw Plot Complete",
        &[
            ("Output directory", output_dir.display().to_string()),
            ("Frames loaded", frames.len().to_string()),
            ("Frames rendered", written.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    Ok(())
}
