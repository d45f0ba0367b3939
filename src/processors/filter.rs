//! Two-stage frame filter: noise map, then velocity gate.

use crate::core::frame::Frame;
use crate::core::quantize::Quantizer;

use super::noise::NoiseMap;
use super::velocity::VelocityFloor;

/// Points of one frame that survived filtering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilteredFrame {
    /// `[x, y, z, v]` with x/y/z rounded to the noise map's spatial precision
    /// and v left unrounded.
    pub points: Vec<[f32; 4]>,
    /// Index of each surviving point in the source frame.
    pub source_indices: Vec<usize>,
}

impl FilteredFrame {
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Apply the noise mask and velocity floor to one frame.
///
/// A point survives when its quantized position is not in `noise_map` and its
/// velocity, quantized with `velocity_quantizer`, is at least `floor`.
/// Coordinates are emitted on the spatial grid since the clustering radius is
/// tuned against that scale.
pub fn filter_frame(
    frame: &Frame,
    noise_map: &NoiseMap,
    floor: VelocityFloor,
    velocity_quantizer: &Quantizer,
) -> FilteredFrame {
    let spatial = noise_map.quantizer();
    let mut filtered = FilteredFrame::default();

    for (idx, point) in frame.iter().enumerate() {
        if noise_map.contains(point.x, point.y, point.z) {
            continue;
        }
        if !floor.admits(velocity_quantizer.quantize(point.v)) {
            continue;
        }
        filtered.points.push([
            spatial.quantize(point.x),
            spatial.quantize(point.y),
            spatial.quantize(point.z),
            point.v,
        ]);
        filtered.source_indices.push(idx);
    }

    filtered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processors::velocity::velocity_floor;

    fn frame_of(points: &[[f32; 4]]) -> Frame {
        Frame::from_rows(points).unwrap()
    }

    #[test]
    fn test_filter_drops_noise_and_slow_points() {
        let background: Vec<Frame> = (0..10).map(|_| frame_of(&[[9.0, 9.0, 9.0, 0.0]])).collect();
        let noise = NoiseMap::build(&[], &background, 5, Quantizer::spatial());

        let frame = frame_of(&[
            [9.0, 9.0, 9.0, 5.0],    // noise position
            [1.234, 2.0, 3.0, 1.0],  // modal velocity, kept
            [2.0, 2.0, 2.0, 1.0],    // kept
            [3.0, 3.0, 3.0, 0.25],   // below floor
            [4.0, 4.0, 4.0, 1.776],  // above floor, kept
        ]);
        let velocity = Quantizer::velocity();
        let floor = velocity_floor(&frame, &noise, &velocity);
        assert_eq!(floor, VelocityFloor::Defined(1.0));

        let filtered = filter_frame(&frame, &noise, floor, &velocity);
        assert_eq!(filtered.source_indices, vec![1, 2, 4]);
        assert_eq!(filtered.points[0], [1.2, 2.0, 3.0, 1.0]);
        // velocity stays unrounded
        assert_eq!(filtered.points[2][3], 1.776);
    }

    #[test]
    fn test_filter_output_is_subset() {
        let frame = frame_of(&[[0.0, 0.0, 0.0, -1.0], [0.0, 1.0, 0.0, 0.5], [2.0, 0.0, 0.0, 0.5]]);
        let noise = NoiseMap::build(&[], &[], 10, Quantizer::spatial());
        let velocity = Quantizer::velocity();

        for floor in [
            VelocityFloor::Defined(-5.0),
            VelocityFloor::Defined(0.5),
            VelocityFloor::Defined(9.0),
            VelocityFloor::Undefined,
        ] {
            let filtered = filter_frame(&frame, &noise, floor, &velocity);
            assert!(filtered.len() <= frame.len());
            assert_eq!(filtered.points.len(), filtered.source_indices.len());
        }
    }

    #[test]
    fn test_repeating_points_with_zero_thresh_filter_to_empty() {
        let frames: Vec<Frame> = (0..4)
            .map(|_| frame_of(&[[1.0, 0.0, 0.0, 2.0], [0.0, 1.0, 0.0, 3.0]]))
            .collect();
        let noise = NoiseMap::build(&frames, &[], 0, Quantizer::spatial());
        let velocity = Quantizer::velocity();

        for frame in &frames {
            let floor = velocity_floor(frame, &noise, &velocity);
            let filtered = filter_frame(frame, &noise, floor, &velocity);
            assert!(filtered.is_empty());
        }
    }

    #[test]
    fn test_empty_frame() {
        let noise = NoiseMap::build(&[], &[], 0, Quantizer::spatial());
        let filtered = filter_frame(&Frame::new(), &noise, VelocityFloor::Undefined, &Quantizer::velocity());
        assert!(filtered.is_empty());
        assert!(filtered.source_indices.is_empty());
    }
}
