//! CSV writers for object counting results.
//!
//! - Labels CSV: one row per filtered point with its frame and cluster label
//! - Counts CSV: one row per frame with its cluster count and velocity floor

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use thiserror::Error;

use crate::processors::counting::ObjectCountReport;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to flush data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// A frame's labels do not line up with its filtered points.
    #[error("frame {frame}: {points} filtered points but {labels} labels")]
    LengthMismatch {
        frame: usize,
        points: usize,
        labels: usize,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Opens a buffered CSV writer at `path`, creating parent directories.
fn create_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::Writer::from_writer(BufWriter::new(file)))
}

fn write_rows<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let path_str = path.display().to_string();
    let mut writer = create_csv_writer(path)?;
    let csv_err = |e| WriteError::CsvError {
        path: path_str.clone(),
        source: e,
    };

    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    })
}

/// Write every filtered point with its cluster label.
///
/// Columns: `frame,x,y,z,v,label`. Coordinates are the quantized values the
/// clusterer saw; `v` is the raw velocity. Noise points carry label -1.
pub fn write_labels_csv(path: &Path, report: &ObjectCountReport) -> Result<()> {
    for (idx, frame) in report.frames.iter().enumerate() {
        if frame.filtered.len() != frame.labels.len() {
            return Err(WriteError::LengthMismatch {
                frame: idx,
                points: frame.filtered.len(),
                labels: frame.labels.len(),
            });
        }
    }

    let rows = report.frames.iter().enumerate().flat_map(|(idx, frame)| {
        frame
            .filtered
            .points
            .iter()
            .zip(&frame.labels)
            .map(move |(p, label)| {
                vec![
                    idx.to_string(),
                    format!("{:.6}", p[0]),
                    format!("{:.6}", p[1]),
                    format!("{:.6}", p[2]),
                    format!("{:.6}", p[3]),
                    label.to_string(),
                ]
            })
    });

    write_rows(path, &["frame", "x", "y", "z", "v", "label"], rows)
}

/// Write per-frame cluster counts.
///
/// Columns: `frame,clusters,velocity_floor`; the floor is empty when the frame
/// had no points outside the noise map.
pub fn write_counts_csv(path: &Path, report: &ObjectCountReport) -> Result<()> {
    let rows = report.frames.iter().enumerate().map(|(idx, frame)| {
        vec![
            idx.to_string(),
            frame.clusters.to_string(),
            frame
                .velocity_floor
                .value()
                .map(|v| format!("{:.2}", v))
                .unwrap_or_default(),
        ]
    });

    write_rows(path, &["frame", "clusters", "velocity_floor"], rows)
}
