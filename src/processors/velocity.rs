//! Per-frame velocity gate.
//!
//! Residual clutter that escapes the noise map tends to share one velocity
//! within a frame. The modal quantized velocity of a frame's non-noise points
//! becomes that frame's minimum admitted velocity.

use rayon::prelude::*;

use crate::core::frame::Frame;
use crate::core::quantize::Quantizer;
use crate::core::stats::mode_min;

use super::noise::NoiseMap;

/// Minimum admitted (quantized) velocity for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VelocityFloor {
    /// Modal velocity of the frame's non-noise points.
    Defined(f32),
    /// The frame had no non-noise points; nothing is admitted.
    Undefined,
}

impl VelocityFloor {
    /// Whether a quantized velocity passes the gate (`>=`, signed).
    #[inline]
    pub fn admits(&self, quantized_velocity: f32) -> bool {
        match *self {
            VelocityFloor::Defined(floor) => quantized_velocity >= floor,
            VelocityFloor::Undefined => false,
        }
    }

    pub fn value(&self) -> Option<f32> {
        match *self {
            VelocityFloor::Defined(floor) => Some(floor),
            VelocityFloor::Undefined => None,
        }
    }
}

/// Velocity floor of a single frame.
///
/// Only points outside the noise map contribute. Ties between equally frequent
/// velocities resolve to the smallest one.
pub fn velocity_floor(frame: &Frame, noise_map: &NoiseMap, velocity_quantizer: &Quantizer) -> VelocityFloor {
    let signal = noise_map.signal_mask(frame);
    let bins = frame
        .v
        .iter()
        .zip(&signal)
        .filter(|(_, &keep)| keep)
        .map(|(&v, _)| velocity_quantizer.bin(v));

    match mode_min(bins) {
        Some(bin) => VelocityFloor::Defined(velocity_quantizer.value_of(bin)),
        None => VelocityFloor::Undefined,
    }
}

/// Velocity floors for every frame, in frame order.
pub fn velocity_floors(frames: &[Frame], noise_map: &NoiseMap, velocity_quantizer: &Quantizer) -> Vec<VelocityFloor> {
    let floors: Vec<VelocityFloor> = frames
        .par_iter()
        .map(|frame| velocity_floor(frame, noise_map, velocity_quantizer))
        .collect();

    for (idx, floor) in floors.iter().enumerate() {
        match floor {
            VelocityFloor::Defined(value) => log::debug!("frame {}: velocity floor {:.2} m/s", idx, value),
            VelocityFloor::Undefined => {
                log::warn!("frame {}: no points outside the noise map, velocity floor undefined", idx)
            }
        }
    }

    floors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_of(points: &[[f32; 4]]) -> Frame {
        Frame::from_rows(points).unwrap()
    }

    fn empty_noise() -> NoiseMap {
        NoiseMap::build(&[], &[], 0, Quantizer::spatial())
    }

    #[test]
    fn test_modal_velocity() {
        let frame = frame_of(&[
            [0.0, 0.0, 0.0, 0.5],
            [1.0, 0.0, 0.0, 0.501],
            [2.0, 0.0, 0.0, 1.2],
            [3.0, 0.0, 0.0, 0.499],
        ]);
        let floor = velocity_floor(&frame, &empty_noise(), &Quantizer::velocity());
        assert_eq!(floor, VelocityFloor::Defined(0.5));
    }

    #[test]
    fn test_tie_takes_lowest_velocity() {
        let frame = frame_of(&[
            [0.0, 0.0, 0.0, 2.0],
            [1.0, 0.0, 0.0, -1.0],
            [2.0, 0.0, 0.0, 2.0],
            [3.0, 0.0, 0.0, -1.0],
        ]);
        let floor = velocity_floor(&frame, &empty_noise(), &Quantizer::velocity());
        assert_eq!(floor, VelocityFloor::Defined(-1.0));
    }

    #[test]
    fn test_noise_points_do_not_bias_floor() {
        let background: Vec<Frame> = (0..10).map(|_| frame_of(&[[5.0, 5.0, 5.0, 0.0]])).collect();
        let noise = NoiseMap::build(&[], &background, 5, Quantizer::spatial());

        // Three clutter returns at 0.0 m/s would win the mode if counted
        let frame = frame_of(&[
            [5.0, 5.0, 5.0, 0.0],
            [5.01, 5.0, 5.0, 0.0],
            [5.0, 4.99, 5.0, 0.0],
            [0.0, 0.0, 0.0, 3.0],
            [1.0, 0.0, 0.0, 3.0],
        ]);
        let floor = velocity_floor(&frame, &noise, &Quantizer::velocity());
        assert_eq!(floor, VelocityFloor::Defined(3.0));
    }

    #[test]
    fn test_all_noise_frame_is_undefined() {
        let frames: Vec<Frame> = (0..3).map(|_| frame_of(&[[1.0, 1.0, 1.0, 0.4]])).collect();
        let noise = NoiseMap::build(&frames, &[], 0, Quantizer::spatial());

        let floors = velocity_floors(&frames, &noise, &Quantizer::velocity());
        assert_eq!(floors, vec![VelocityFloor::Undefined; 3]);
        assert!(!floors[0].admits(100.0));
    }

    #[test]
    fn test_empty_frame_is_undefined() {
        let floor = velocity_floor(&Frame::new(), &empty_noise(), &Quantizer::velocity());
        assert_eq!(floor, VelocityFloor::Undefined);
        assert_eq!(floor.value(), None);
    }

    #[test]
    fn test_admits_is_signed_comparison() {
        let floor = VelocityFloor::Defined(-0.5);
        assert!(floor.admits(-0.5));
        assert!(floor.admits(0.0));
        assert!(!floor.admits(-0.51));
    }
}
