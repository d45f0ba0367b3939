//! Radar frame container.
//!
//! A [`Frame`] holds one time sample from the sensor as parallel coordinate and
//! velocity columns. Frames carry no identity across a sequence; a recording
//! session is simply a slice of frames.

use thiserror::Error;

/// Number of columns per point: x, y, z, v.
pub const COLUMNS: usize = 4;

const COLUMN_NAMES: [&str; COLUMNS] = ["x", "y", "z", "v"];

/// Malformed frame input.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FrameError {
    #[error("row {row} has {found} columns, expected 4 (x, y, z, v)")]
    ColumnCount { row: usize, found: usize },

    #[error("ragged frame: x has {x} values, y has {y}, z has {z}, v has {v}")]
    RaggedColumns { x: usize, y: usize, z: usize, v: usize },

    #[error("non-finite {column} value at row {row}")]
    NonFinite { row: usize, column: &'static str },
}

/// A single radar return.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadarPoint {
    /// Position in meters.
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Radial velocity in m/s.
    pub v: f32,
}

impl RadarPoint {
    pub fn new(x: f32, y: f32, z: f32, v: f32) -> Self {
        Self { x, y, z, v }
    }
}

/// One frame of radar returns.
///
/// Columns are `f32`. Values read from text are rounded to the nearest `f32`
/// once, on load, and every later binning works from that stored value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    /// X coordinates of all points.
    pub x: Vec<f32>,
    /// Y coordinates of all points.
    pub y: Vec<f32>,
    /// Z coordinates of all points.
    pub z: Vec<f32>,
    /// Radial velocity of all points.
    pub v: Vec<f32>,
}

impl Frame {
    /// Creates a new empty frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new frame with pre-allocated capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            x: Vec::with_capacity(capacity),
            y: Vec::with_capacity(capacity),
            z: Vec::with_capacity(capacity),
            v: Vec::with_capacity(capacity),
        }
    }

    /// Builds a frame from column vectors, rejecting ragged or non-finite input.
    pub fn from_columns(
        x: Vec<f32>,
        y: Vec<f32>,
        z: Vec<f32>,
        v: Vec<f32>,
    ) -> Result<Self, FrameError> {
        let frame = Self { x, y, z, v };
        frame.validate()?;
        Ok(frame)
    }

    /// Builds a frame from `(n_points, 4)` row data with columns x, y, z, v.
    pub fn from_rows<R: AsRef<[f32]>>(rows: &[R]) -> Result<Self, FrameError> {
        let mut frame = Self::with_capacity(rows.len());
        for (row, values) in rows.iter().enumerate() {
            let values = values.as_ref();
            if values.len() != COLUMNS {
                return Err(FrameError::ColumnCount {
                    row,
                    found: values.len(),
                });
            }
            frame.push(RadarPoint::new(values[0], values[1], values[2], values[3]));
        }
        frame.validate()?;
        Ok(frame)
    }

    /// Checks that all columns have equal length and hold finite values.
    pub fn validate(&self) -> Result<(), FrameError> {
        let n = self.x.len();
        if self.y.len() != n || self.z.len() != n || self.v.len() != n {
            return Err(FrameError::RaggedColumns {
                x: self.x.len(),
                y: self.y.len(),
                z: self.z.len(),
                v: self.v.len(),
            });
        }

        let columns = [&self.x, &self.y, &self.z, &self.v];
        for (name, column) in COLUMN_NAMES.iter().zip(columns) {
            if let Some(row) = column.iter().position(|value| !value.is_finite()) {
                return Err(FrameError::NonFinite { row, column: *name });
            }
        }
        Ok(())
    }

    /// Returns the number of points in the frame.
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Returns true if the frame holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Adds a point to the frame.
    #[inline]
    pub fn push(&mut self, point: RadarPoint) {
        self.x.push(point.x);
        self.y.push(point.y);
        self.z.push(point.z);
        self.v.push(point.v);
    }

    /// Returns the point at `index`.
    #[inline]
    pub fn point(&self, index: usize) -> RadarPoint {
        RadarPoint::new(self.x[index], self.y[index], self.z[index], self.v[index])
    }

    /// Iterates over the frame's points in order.
    pub fn iter(&self) -> impl Iterator<Item = RadarPoint> + '_ {
        self.x
            .iter()
            .zip(&self.y)
            .zip(&self.z)
            .zip(&self.v)
            .map(|(((&x, &y), &z), &v)| RadarPoint::new(x, y, z, v))
    }
}

impl FromIterator<RadarPoint> for Frame {
    fn from_iter<I: IntoIterator<Item = RadarPoint>>(iter: I) -> Self {
        let mut frame = Frame::new();
        for point in iter {
            frame.push(point);
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_operations() {
        let mut frame = Frame::new();
        assert!(frame.is_empty());

        frame.push(RadarPoint::new(1.0, 2.0, 3.0, 0.5));
        frame.push(RadarPoint::new(4.0, 5.0, 6.0, -0.5));

        assert_eq!(frame.len(), 2);
        assert_eq!(frame.point(1), RadarPoint::new(4.0, 5.0, 6.0, -0.5));

        let points: Vec<RadarPoint> = frame.iter().collect();
        assert_eq!(points[0].v, 0.5);
    }

    #[test]
    fn test_from_rows() {
        let rows = vec![vec![1.0f32, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0, 8.0]];
        let frame = Frame::from_rows(&rows).unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.v, vec![4.0, 8.0]);
    }

    #[test]
    fn test_from_rows_wrong_column_count() {
        let rows = vec![vec![1.0f32, 2.0, 3.0, 4.0], vec![5.0, 6.0, 7.0]];
        let err = Frame::from_rows(&rows).unwrap_err();
        assert_eq!(err, FrameError::ColumnCount { row: 1, found: 3 });
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let err = Frame::from_columns(vec![1.0, 2.0], vec![1.0, 2.0], vec![1.0], vec![0.0, 0.0])
            .unwrap_err();
        assert!(matches!(err, FrameError::RaggedColumns { z: 1, .. }));
    }

    #[test]
    fn test_non_finite_rejected() {
        let rows = [[0.0f32, 0.0, 0.0, 0.0], [0.0, f32::NAN, 0.0, 0.0]];
        let err = Frame::from_rows(&rows).unwrap_err();
        assert_eq!(err, FrameError::NonFinite { row: 1, column: "y" });
    }

    #[test]
    fn test_collect_points() {
        let frame: Frame = (0..3)
            .map(|i| RadarPoint::new(i as f32, 0.0, 0.0, 1.0))
            .collect();
        assert_eq!(frame.x, vec![0.0, 1.0, 2.0]);
        assert!(frame.validate().is_ok());
    }
}
