//! Sequence-level object counting.
//!
//! Drives the whole pipeline over a recording: noise profile, velocity floors,
//! then per-frame filtering and DBSCAN, reduced to a single object-count
//! estimate by taking the mode of the per-frame cluster counts.

use std::fmt;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use thiserror::Error;

use crate::config::{ConfigError, CountingConfig};
use crate::core::frame::{Frame, FrameError};
use crate::core::stats::mode_min;

use super::clustering::cluster_frame;
use super::filter::{filter_frame, FilteredFrame};
use super::noise::NoiseMap;
use super::velocity::{velocity_floors, VelocityFloor};

/// Pipeline stage, reported with errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Validation,
    NoiseProfile,
    VelocityGate,
    Filter,
    Clustering,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validation => "validation",
            Stage::NoiseProfile => "noise-profile",
            Stage::VelocityGate => "velocity-gate",
            Stage::Filter => "filter",
            Stage::Clustering => "clustering",
        };
        f.write_str(name)
    }
}

/// Which input sequence a frame came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    Foreground,
    Background,
}

impl fmt::Display for SequenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SequenceKind::Foreground => f.write_str("foreground"),
            SequenceKind::Background => f.write_str("background"),
        }
    }
}

/// Errors returned by [`count_objects`].
#[derive(Error, Debug)]
pub enum CountError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("point cloud sequence has no frames")]
    EmptySequence,

    #[error("{stage} stage: malformed {sequence} frame {frame}: {source}")]
    MalformedFrame {
        stage: Stage,
        sequence: SequenceKind,
        frame: usize,
        #[source]
        source: FrameError,
    },

    #[error("{stage} stage: deadline of {deadline:?} exceeded at frame {frame} after {elapsed:?}")]
    DeadlineExceeded {
        stage: Stage,
        frame: usize,
        deadline: Duration,
        elapsed: Duration,
    },
}

/// Wall-clock budget for one aggregation.
#[derive(Debug, Clone, Copy)]
struct Deadline {
    start: Instant,
    limit: Option<Duration>,
}

impl Deadline {
    fn new(limit: Option<Duration>) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    fn check(&self, stage: Stage, frame: usize) -> Result<(), CountError> {
        let Some(deadline) = self.limit else {
            return Ok(());
        };
        let elapsed = self.start.elapsed();
        if elapsed > deadline {
            return Err(CountError::DeadlineExceeded {
                stage,
                frame,
                deadline,
                elapsed,
            });
        }
        Ok(())
    }
}

/// Everything produced for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub velocity_floor: VelocityFloor,
    /// Points fed to the clusterer.
    pub filtered: FilteredFrame,
    /// Cluster label per filtered point.
    pub labels: Vec<i32>,
    /// Clusters found, excluding noise.
    pub clusters: usize,
}

/// Result of counting objects across a sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectCountReport {
    /// Mode of the per-frame cluster counts, smallest value on ties.
    pub estimate: usize,
    /// Per-frame results, in frame order.
    pub frames: Vec<FrameResult>,
}

impl ObjectCountReport {
    pub fn frame_counts(&self) -> Vec<usize> {
        self.frames.iter().map(|frame| frame.clusters).collect()
    }

    pub fn frame_labels(&self) -> Vec<&[i32]> {
        self.frames.iter().map(|frame| frame.labels.as_slice()).collect()
    }
}

/// Object-count estimate from per-frame counts.
///
/// Returns the most frequent count, the smallest one when several tie, or
/// `None` when there are no frames. Counts are integers, so the floor applied
/// to the modal value is the identity.
pub fn estimate_from_counts(counts: &[usize]) -> Option<usize> {
    mode_min(counts.iter().copied())
}

fn validate_frames(frames: &[Frame], sequence: SequenceKind) -> Result<(), CountError> {
    frames.iter().enumerate().try_for_each(|(frame, data)| {
        data.validate().map_err(|source| CountError::MalformedFrame {
            stage: Stage::Validation,
            sequence,
            frame,
            source,
        })
    })
}

/// Estimate the number of objects seen across `frames`.
///
/// `background` frames only enrich the noise profile and may be empty. The
/// noise map and all velocity floors are complete before any frame is
/// filtered; frames are then filtered and clustered in parallel and collected
/// in frame order. Identical input always yields the same estimate, counts
/// and labels.
pub fn count_objects(
    frames: &[Frame],
    background: &[Frame],
    config: &CountingConfig,
) -> Result<ObjectCountReport, CountError> {
    config.validate()?;
    if frames.is_empty() {
        return Err(CountError::EmptySequence);
    }
    validate_frames(frames, SequenceKind::Foreground)?;
    validate_frames(background, SequenceKind::Background)?;

    let deadline = Deadline::new(config.deadline());

    let noise_map = NoiseMap::build(frames, background, config.thresh, config.spatial_quantizer());
    log::info!(
        "noise profile: {} static positions from {} frames + {} background frames",
        noise_map.len(),
        frames.len(),
        background.len()
    );
    deadline.check(Stage::NoiseProfile, 0)?;

    let velocity_quantizer = config.velocity_quantizer();
    let floors = velocity_floors(frames, &noise_map, &velocity_quantizer);
    deadline.check(Stage::VelocityGate, 0)?;

    let results: Vec<FrameResult> = frames
        .par_iter()
        .zip(floors.par_iter())
        .enumerate()
        .map(|(idx, (frame, &floor))| {
            deadline.check(Stage::Filter, idx)?;
            let filtered = filter_frame(frame, &noise_map, floor, &velocity_quantizer);

            deadline.check(Stage::Clustering, idx)?;
            let clusters = cluster_frame(&filtered.points, config.eps, config.min_samples);
            log::debug!(
                "frame {}: {} -> {} points after filtering, {} clusters",
                idx,
                frame.len(),
                filtered.len(),
                clusters.count
            );

            Ok(FrameResult {
                velocity_floor: floor,
                filtered,
                labels: clusters.labels,
                clusters: clusters.count,
            })
        })
        .collect::<Result<Vec<_>, CountError>>()?;

    let counts: Vec<usize> = results.iter().map(|frame| frame.clusters).collect();
    let estimate = estimate_from_counts(&counts).ok_or(CountError::EmptySequence)?;
    log::info!("object count estimate: {} over {} frames", estimate, counts.len());

    Ok(ObjectCountReport {
        estimate,
        frames: results,
    })
}
