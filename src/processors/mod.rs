//! Noise filtering, clustering and counting stages.

pub mod clustering;
pub mod counting;
pub mod filter;
pub mod noise;
pub mod velocity;

// Re-export key types for convenience
pub use clustering::{cluster_frame, count_clusters, dbscan, FrameClusters, NOISE_LABEL};
pub use counting::{
    count_objects, estimate_from_counts, CountError, FrameResult, ObjectCountReport, SequenceKind, Stage,
};
pub use filter::{filter_frame, FilteredFrame};
pub use noise::NoiseMap;
pub use velocity::{velocity_floor, velocity_floors, VelocityFloor};
