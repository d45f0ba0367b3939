//! Object counting for radar point-cloud sequences.
//!
//! This crate provides tools for:
//! - Loading frame sequences of `(x, y, z, v)` radar points from CSV
//! - Profiling static clutter into a noise map of quantized positions
//! - Gating each frame on its modal non-noise velocity
//! - 4-D DBSCAN clustering per frame (parallelized)
//! - Aggregating per-frame cluster counts into one object estimate
//!
//! # Example
//!
//! ```no_run
//! use radar_object_count::{core::loaders::load_sequence, count_objects, CountingConfig};
//!
//! let frames = load_sequence("frames.csv").unwrap();
//! let report = count_objects(&frames, &[], &CountingConfig::default()).unwrap();
//! println!("{} objects", report.estimate);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{CountingConfig, PipelineConfig, PlotConfig};
pub use core::frame::{Frame, RadarPoint};
pub use processors::counting::{count_objects, CountError, ObjectCountReport};
pub use processors::noise::NoiseMap;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
