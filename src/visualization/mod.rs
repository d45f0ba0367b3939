//! Visualization tools for radar frames.
//!
//! Renders one frame as a PNG scatter plot, either a 3D projection or a chosen
//! axis pair, with points coloured by velocity or by cluster label.

use std::ops::Range;
use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::config::{ColorKey, PlotConfig};
use crate::core::frame::Frame;
use crate::processors::clustering::NOISE_LABEL;

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Empty point cloud")]
    EmptyPointCloud,

    #[error("{points} points but {labels} labels")]
    LabelMismatch { points: usize, labels: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Color palette for cluster visualization.
const CLUSTER_COLORS: &[(u8, u8, u8)] = &[
    (228, 26, 28),   // Red
    (55, 126, 184),  // Blue
    (77, 175, 74),   // Green
    (152, 78, 163),  // Purple
    (255, 127, 0),   // Orange
    (255, 255, 51),  // Yellow
    (166, 86, 40),   // Brown
    (247, 129, 191), // Pink
    (0, 206, 209),   // Turquoise
    (138, 43, 226),  // Blue Violet
];

/// Noise color (gray) for unclustered points (label = -1).
const NOISE_COLOR: (u8, u8, u8) = (128, 128, 128);

/// Colour for a cluster label.
pub fn cluster_color(label: i32) -> RGBColor {
    if label == NOISE_LABEL || label < 0 {
        return RGBColor(NOISE_COLOR.0, NOISE_COLOR.1, NOISE_COLOR.2);
    }
    let c = CLUSTER_COLORS[label as usize % CLUSTER_COLORS.len()];
    RGBColor(c.0, c.1, c.2)
}

/// Blue-to-red ramp for a velocity within `[v_min, v_max]`.
pub fn velocity_color(v: f32, v_min: f32, v_max: f32) -> RGBColor {
    let span = v_max - v_min;
    let t = if span > f32::EPSILON {
        ((v - v_min) / span).clamp(0.0, 1.0)
    } else {
        0.5
    };
    RGBColor((255.0 * t) as u8, 64, (255.0 * (1.0 - t)) as u8)
}

/// Axis limits and velocity colour scale for a whole sequence.
///
/// Plotting every frame against the same bounds keeps frames comparable.
/// Index 0..3 are x, y, z and index 3 is v.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub min: [f32; 4],
    pub max: [f32; 4],
}

impl PlotBounds {
    /// Bounds of `[x, y, z, v]` points, `None` when there are none.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = [f32; 4]>,
    {
        points.into_iter().fold(None, |bounds, p| {
            let mut b = bounds.unwrap_or(PlotBounds { min: p, max: p });
            for axis in 0..4 {
                b.min[axis] = b.min[axis].min(p[axis]);
                b.max[axis] = b.max[axis].max(p[axis]);
            }
            Some(b)
        })
    }

    /// Padded plotting range of one axis; a flat axis is widened to +-1.
    pub fn range(&self, axis: usize) -> Range<f32> {
        let (mut lo, mut hi) = (self.min[axis], self.max[axis]);
        if (hi - lo).abs() < f32::EPSILON {
            lo -= 1.0;
            hi += 1.0;
        }
        let padding = (hi - lo) * 0.05;
        (lo - padding)..(hi + padding)
    }

    fn velocity_color(&self, v: f32) -> RGBColor {
        velocity_color(v, self.min[3], self.max[3])
    }
}

fn plotting_error<E: std::fmt::Display>(e: E) -> VisualizationError {
    VisualizationError::PlottingError(e.to_string())
}

/// Plot a frame's filtered points coloured by velocity or cluster label.
///
/// `points` are `[x, y, z, v]` as produced by the frame filter and `labels`
/// must match them one to one. Pass sequence-wide `bounds` to fix axis limits
/// across frames; `None` fits the plot to this frame.
pub fn plot_frame(
    output_path: &Path,
    points: &[[f32; 4]],
    labels: &[i32],
    bounds: Option<&PlotBounds>,
    config: &PlotConfig,
) -> Result<()> {
    if points.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }
    if points.len() != labels.len() {
        return Err(VisualizationError::LabelMismatch {
            points: points.len(),
            labels: labels.len(),
        });
    }
    let bounds = match bounds {
        Some(bounds) => *bounds,
        None => PlotBounds::from_points(points.iter().copied()).ok_or(VisualizationError::EmptyPointCloud)?,
    };

    let step = subsample_step(points.len(), config.max_points);
    let plotted: Vec<([f32; 3], RGBColor)> = points
        .iter()
        .zip(labels)
        .step_by(step)
        .map(|(p, &label)| {
            let color = match config.color {
                ColorKey::Velocity => bounds.velocity_color(p[3]),
                ColorKey::Cluster => cluster_color(label),
            };
            ([p[0], p[1], p[2]], color)
        })
        .collect();

    draw_points(output_path, &plotted, &bounds, config)
}

/// Plot a raw frame, dropping points with |v| below `min_abs_velocity`.
///
/// Points are coloured by velocity.
pub fn plot_raw_frame(
    output_path: &Path,
    frame: &Frame,
    min_abs_velocity: f32,
    bounds: Option<&PlotBounds>,
    config: &PlotConfig,
) -> Result<()> {
    let kept = moving_points(frame, min_abs_velocity);
    if kept.is_empty() {
        return Err(VisualizationError::EmptyPointCloud);
    }

    let velocity_keyed = PlotConfig {
        color: ColorKey::Velocity,
        ..config.clone()
    };
    let labels = vec![NOISE_LABEL; kept.len()];
    plot_frame(output_path, &kept, &labels, bounds, &velocity_keyed)
}

/// Points of `frame` with |v| >= `min_abs_velocity`.
pub fn moving_points(frame: &Frame, min_abs_velocity: f32) -> Vec<[f32; 4]> {
    frame
        .iter()
        .filter(|p| p.v.abs() >= min_abs_velocity)
        .map(|p| [p.x, p.y, p.z, p.v])
        .collect()
}

fn subsample_step(n: usize, max_points: usize) -> usize {
    if max_points > 0 && n > max_points {
        n.div_ceil(max_points)
    } else {
        1
    }
}

fn draw_points(
    output_path: &Path,
    points: &[([f32; 3], RGBColor)],
    bounds: &PlotBounds,
    config: &PlotConfig,
) -> Result<()> {
    let root = BitMapBackend::new(output_path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plotting_error)?;

    match config.axes.columns() {
        Some((a, b)) => {
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .build_cartesian_2d(bounds.range(a), bounds.range(b))
                .map_err(plotting_error)?;

            chart
                .draw_series(
                    points
                        .iter()
                        .map(|(p, color)| Circle::new((p[a], p[b]), 3, color.filled())),
                )
                .map_err(plotting_error)?;
        }
        None => {
            // plotters draws its second axis upwards, so z goes there
            let mut chart = ChartBuilder::on(&root)
                .margin(10)
                .build_cartesian_3d(bounds.range(0), bounds.range(2), bounds.range(1))
                .map_err(plotting_error)?;
            chart.with_projection(|mut pb| {
                pb.yaw = 0.6;
                pb.pitch = 0.35;
                pb.scale = 0.85;
                pb.into_matrix()
            });

            chart
                .draw_series(
                    points
                        .iter()
                        .map(|(p, color)| Circle::new((p[0], p[2], p[1]), 2, color.filled())),
                )
                .map_err(plotting_error)?;
        }
    }

    root.present().map_err(plotting_error)?;
    Ok(())
}
