//! Loaders for radar frame sequences.
//!
//! Two layouts are supported:
//! - A single long-format CSV with `frame,x,y,z,v` columns, one row per point
//! - A directory of per-frame CSVs named `frame_<n>.csv` with `x,y,z,v` columns

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use csv::{ReaderBuilder, StringRecord};
use rayon::prelude::*;
use regex::Regex;
use thiserror::Error;

use super::frame::{Frame, FrameError, RadarPoint};

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("No frame files found in {0}")]
    NoFrames(PathBuf),

    #[error("{path}: missing required columns: {columns}")]
    MissingColumns { path: PathBuf, columns: String },

    #[error("{path}: line {line} has {found} columns, expected {expected}")]
    MalformedRow {
        path: PathBuf,
        line: u64,
        found: usize,
        expected: usize,
    },

    #[error("{path}: line {line}: invalid {column} value '{value}'")]
    ParseError {
        path: PathBuf,
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error("{path}: frame {frame}: {source}")]
    InvalidFrame {
        path: PathBuf,
        frame: usize,
        #[source]
        source: FrameError,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

const POINT_COLUMNS: [&str; 4] = ["x", "y", "z", "v"];

fn frame_file_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)frame[_-]?(\d+)").expect("frame file pattern is valid"))
}

/// Column positions by lower-cased header name.
fn column_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(i, name)| (name.trim().to_lowercase(), i))
        .collect()
}

fn require_columns(path: &Path, columns: &HashMap<String, usize>, names: &[&str]) -> Result<Vec<usize>> {
    let missing: Vec<&str> = names
        .iter()
        .copied()
        .filter(|name| !columns.contains_key(*name))
        .collect();
    if !missing.is_empty() {
        return Err(LoaderError::MissingColumns {
            path: path.to_path_buf(),
            columns: missing.join(", "),
        });
    }
    Ok(names.iter().map(|name| columns[*name]).collect())
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map_or(0, |pos| pos.line())
}

fn parse_field<T: std::str::FromStr>(
    path: &Path,
    record: &StringRecord,
    idx: usize,
    column: &'static str,
) -> Result<T> {
    let raw = record.get(idx).unwrap_or_default().trim();
    raw.parse().map_err(|_| LoaderError::ParseError {
        path: path.to_path_buf(),
        line: record_line(record),
        column,
        value: raw.to_string(),
    })
}

fn check_width(path: &Path, record: &StringRecord, expected: usize) -> Result<()> {
    if record.len() != expected {
        return Err(LoaderError::MalformedRow {
            path: path.to_path_buf(),
            line: record_line(record),
            found: record.len(),
            expected,
        });
    }
    Ok(())
}

fn parse_point(path: &Path, record: &StringRecord, idx: &[usize]) -> Result<RadarPoint> {
    Ok(RadarPoint::new(
        parse_field(path, record, idx[0], POINT_COLUMNS[0])?,
        parse_field(path, record, idx[1], POINT_COLUMNS[1])?,
        parse_field(path, record, idx[2], POINT_COLUMNS[2])?,
        parse_field(path, record, idx[3], POINT_COLUMNS[3])?,
    ))
}

/// Load a sequence from a long-format CSV with `frame,x,y,z,v` columns.
///
/// Rows may appear in any order. The result holds frames `0..=max` indexed by
/// frame number; a frame number with no rows is an empty frame.
pub fn load_sequence_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let columns = column_map(&headers);
    let frame_idx = require_columns(path, &columns, &["frame"])?[0];
    let point_idx = require_columns(path, &columns, &POINT_COLUMNS)?;

    let mut frames: BTreeMap<usize, Frame> = BTreeMap::new();
    for result in reader.records() {
        let record = result?;
        check_width(path, &record, headers.len())?;

        let frame: usize = parse_field(path, &record, frame_idx, "frame")?;
        let point = parse_point(path, &record, &point_idx)?;
        frames.entry(frame).or_default().push(point);
    }

    for (&frame, data) in &frames {
        data.validate().map_err(|source| LoaderError::InvalidFrame {
            path: path.to_path_buf(),
            frame,
            source,
        })?;
    }

    // Frames without detections have no rows; they still count
    let total = frames.keys().next_back().map_or(0, |&last| last + 1);
    let observed = frames.len();
    let mut sequence = vec![Frame::new(); total];
    for (frame, data) in frames {
        sequence[frame] = data;
    }
    if observed < total {
        log::debug!("{}: {} frames without detections", path.display(), total - observed);
    }

    log::info!("{}: loaded {} frames", path.display(), total);
    Ok(sequence)
}

/// Load a single frame from a CSV with `x,y,z,v` columns.
///
/// Columns are matched by name (case-insensitive). A header must name all of
/// `x,y,z,v` or none of them; without names the first four columns are used in
/// x, y, z, v order and a numeric first row is read as a point.
pub fn load_frame_csv<P: AsRef<Path>>(path: P) -> Result<Frame> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(BufReader::new(file));

    let headers = reader.headers()?.clone();
    let columns = column_map(&headers);
    let named = POINT_COLUMNS.iter().filter(|name| columns.contains_key(**name)).count();

    let mut frame = Frame::new();
    let point_idx: Vec<usize> = if named == 0 {
        // No column names: positional, and the first row may already be data
        if let Ok(point) = parse_point(path, &headers, &[0, 1, 2, 3]) {
            frame.push(point);
        }
        (0..POINT_COLUMNS.len()).collect()
    } else {
        require_columns(path, &columns, &POINT_COLUMNS)?
    };
    let width = headers.len().max(POINT_COLUMNS.len());

    for result in reader.records() {
        let record = result?;
        check_width(path, &record, width)?;
        frame.push(parse_point(path, &record, &point_idx)?);
    }

    frame.validate().map_err(|source| LoaderError::InvalidFrame {
        path: path.to_path_buf(),
        frame: 0,
        source,
    })?;
    Ok(frame)
}

/// Discover per-frame CSVs in a directory.
///
/// Matches file stems containing `frame_<n>` / `frame-<n>` / `frame<n>` and
/// returns `(n, path)` pairs sorted by `n`.
pub fn find_frame_files(directory: &Path) -> Vec<(usize, PathBuf)> {
    let pattern = frame_file_pattern();

    let mut files: Vec<(usize, PathBuf)> = fs::read_dir(directory)
        .into_iter()
        .flatten()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .map(|ext| ext.eq_ignore_ascii_case("csv"))
                .unwrap_or(false)
        })
        .filter_map(|path| {
            let stem = path.file_stem()?.to_str()?;
            let index = pattern.captures(stem)?.get(1)?.as_str().parse().ok()?;
            Some((index, path))
        })
        .collect();

    files.sort();
    files
}

/// Load every `frame_<n>.csv` in a directory, in frame-number order.
pub fn load_sequence_dir<P: AsRef<Path>>(directory: P) -> Result<Vec<Frame>> {
    let directory = directory.as_ref();
    let files = find_frame_files(directory);
    if files.is_empty() {
        return Err(LoaderError::NoFrames(directory.to_path_buf()));
    }

    let frames = files
        .par_iter()
        .map(|(_, path)| load_frame_csv(path))
        .collect::<Result<Vec<Frame>>>()?;

    log::info!("{}: loaded {} frame files", directory.display(), frames.len());
    Ok(frames)
}

/// Load a sequence from either a long-format CSV or a frame directory.
pub fn load_sequence<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    if path.is_dir() {
        load_sequence_dir(path)
    } else {
        load_sequence_csv(path)
    }
}
