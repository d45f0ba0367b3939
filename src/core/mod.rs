//! Core data types, quantization and I/O.

pub mod frame;
pub mod loaders;
pub mod quantize;
pub mod stats;
pub mod writers;

pub use frame::{Frame, FrameError, RadarPoint};
pub use loaders::{load_sequence, LoaderError};
pub use quantize::{Binning, QuantizedPosition, Quantizer};
pub use writers::{write_counts_csv, write_labels_csv, WriteError};
