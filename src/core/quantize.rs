//! Fixed-precision binning of coordinates and velocities.
//!
//! Every stage that hashes or compares rounded values goes through a
//! [`Quantizer`]. Values are scaled by the number of bins per unit and rounded
//! half-to-even, and the resulting integer bin index is what gets hashed, so two
//! values share a key exactly when they land in the same bin.

use serde::{Deserialize, Serialize};

/// Largest number of decimal places a [`Binning::Decimals`] may request.
pub const MAX_DECIMAL_PLACES: u32 = 9;

/// Binning used for spatial noise keys (one decimal place, 0.1 m).
pub const SPATIAL_BINNING: Binning = Binning::Decimals { places: 1 };

/// Binning used for velocity statistics (two decimal places, 0.01 m/s).
pub const VELOCITY_BINNING: Binning = Binning::Decimals { places: 2 };

/// Rounding scheme applied before values are used as keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Binning {
    /// Round to a fixed number of decimal places.
    Decimals { places: u32 },
    /// Round to the nearest quarter unit.
    Quarter,
}

impl Binning {
    /// Number of bins per unit of the measured quantity.
    pub fn bins_per_unit(&self) -> f64 {
        match *self {
            Binning::Decimals { places } => 10f64.powi(places as i32),
            Binning::Quarter => 4.0,
        }
    }
}

impl std::fmt::Display for Binning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Binning::Decimals { places } => write!(f, "{} decimal place(s)", places),
            Binning::Quarter => write!(f, "quarter steps"),
        }
    }
}

/// A quantized (x, y, z) position, stored as integer bin indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QuantizedPosition {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Rounds values onto a fixed grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantizer {
    binning: Binning,
    scale: f64,
}

impl Quantizer {
    pub fn new(binning: Binning) -> Self {
        Self {
            binning,
            scale: binning.bins_per_unit(),
        }
    }

    /// Quantizer for spatial noise keys.
    pub fn spatial() -> Self {
        Self::new(SPATIAL_BINNING)
    }

    /// Quantizer for velocity statistics.
    pub fn velocity() -> Self {
        Self::new(VELOCITY_BINNING)
    }

    #[inline]
    pub fn binning(&self) -> Binning {
        self.binning
    }

    /// Integer bin index of `value` (round half to even).
    ///
    /// Rounding acts on the stored `f32`, widened exactly to `f64`. A decimal
    /// half-way value usually is not half-way once stored: `1.05f32` is
    /// `1.0499999523...` and bins to 1.0, `0.15f32` is `0.1500000059...` and
    /// bins to 0.2.
    #[inline]
    pub fn bin(&self, value: f32) -> i64 {
        (value as f64 * self.scale).round_ties_even() as i64
    }

    /// Representative value of a bin.
    #[inline]
    pub fn value_of(&self, bin: i64) -> f32 {
        (bin as f64 / self.scale) as f32
    }

    /// Round `value` to this quantizer's precision.
    #[inline]
    pub fn quantize(&self, value: f32) -> f32 {
        self.value_of(self.bin(value))
    }

    /// Quantized key of a spatial position.
    #[inline]
    pub fn position(&self, x: f32, y: f32, z: f32) -> QuantizedPosition {
        QuantizedPosition {
            x: self.bin(x),
            y: self.bin(y),
            z: self.bin(z),
        }
    }
}

impl Default for Quantizer {
    fn default() -> Self {
        Self::spatial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantize_one_decimal() {
        let q = Quantizer::spatial();
        assert_eq!(q.quantize(1.04), 1.0);
        assert_eq!(q.quantize(1.06), 1.1);
        assert_eq!(q.quantize(-2.36), -2.4);
        assert_eq!(q.bin(3.14), 31);
    }

    #[test]
    fn test_round_half_to_even() {
        let q = Quantizer::new(Binning::Decimals { places: 0 });
        assert_eq!(q.quantize(0.5), 0.0);
        assert_eq!(q.quantize(1.5), 2.0);
        assert_eq!(q.quantize(2.5), 2.0);
        assert_eq!(q.quantize(-0.5), 0.0);
        assert_eq!(q.quantize(-1.5), -2.0);
    }

    #[test]
    fn test_bins_follow_stored_f32_value() {
        let q = Quantizer::spatial();
        assert_eq!(q.bin(1.05), 10);
        assert_eq!(q.bin(0.15), 2);
        assert_eq!(q.bin(0.25), 2);
    }

    #[test]
    fn test_quarter_binning() {
        let q = Quantizer::new(Binning::Quarter);
        assert_eq!(q.quantize(0.1), 0.0);
        assert_eq!(q.quantize(0.2), 0.25);
        assert_eq!(q.quantize(1.8), 1.75);
        assert_eq!(q.quantize(-0.6), -0.5);
    }

    #[test]
    fn test_quantize_is_idempotent() {
        for binning in [SPATIAL_BINNING, VELOCITY_BINNING, Binning::Quarter] {
            let q = Quantizer::new(binning);
            for i in -500..500 {
                let v = i as f32 * 0.0371;
                let once = q.quantize(v);
                assert_eq!(q.quantize(once), once, "binning {} value {}", binning, v);
                assert_eq!(q.bin(once), q.bin(v));
            }
        }
    }

    #[test]
    fn test_position_keys() {
        let q = Quantizer::spatial();
        assert_eq!(q.position(1.01, 0.99, 1.0), q.position(1.0, 1.0, 1.04));
        assert_ne!(q.position(1.0, 1.0, 1.0), q.position(2.0, 2.0, 2.0));
    }

    #[test]
    fn test_velocity_precision() {
        let q = Quantizer::velocity();
        assert_eq!(q.bin(0.123), 12);
        assert_eq!(q.quantize(-0.456), -0.46);
    }
}
