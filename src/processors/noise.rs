//! Static clutter detection from repeated spatial occurrences.
//!
//! Returns from stationary reflectors land in the same place frame after frame.
//! Every point of the foreground and background sequences is quantized and
//! counted, and positions seen more than `thresh` times become the
//! [`NoiseMap`]. The map owns the [`Quantizer`] it was built with, so lookups
//! always bin positions the same way the builder did.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::frame::Frame;
use crate::core::quantize::{QuantizedPosition, Quantizer};

/// Occurrence count per quantized position across `frames`.
///
/// Frames are histogrammed in parallel and the partial maps merged.
pub fn count_occurrences(frames: &[Frame], quantizer: &Quantizer) -> HashMap<QuantizedPosition, usize> {
    frames
        .par_iter()
        .fold(HashMap::new, |mut counts, frame| {
            for ((&x, &y), &z) in frame.x.iter().zip(&frame.y).zip(&frame.z) {
                *counts.entry(quantizer.position(x, y, z)).or_insert(0) += 1;
            }
            counts
        })
        .reduce(HashMap::new, merge_counts)
}

fn merge_counts(
    mut into: HashMap<QuantizedPosition, usize>,
    from: HashMap<QuantizedPosition, usize>,
) -> HashMap<QuantizedPosition, usize> {
    if into.len() < from.len() {
        return merge_counts(from, into);
    }
    for (key, count) in from {
        *into.entry(key).or_insert(0) += count;
    }
    into
}

/// Quantized positions that recur often enough to be treated as static clutter.
///
/// Immutable once built; share it by reference across per-frame work.
#[derive(Debug, Clone)]
pub struct NoiseMap {
    quantizer: Quantizer,
    thresh: usize,
    counts: HashMap<QuantizedPosition, usize>,
}

impl NoiseMap {
    /// Build the noise profile from a sequence and an optional background capture.
    ///
    /// A position is kept when its combined count is strictly greater than
    /// `thresh`; with `thresh == 0` any position that occurs at all is noise.
    pub fn build(frames: &[Frame], background: &[Frame], thresh: usize, quantizer: Quantizer) -> Self {
        let counts = merge_counts(
            count_occurrences(frames, &quantizer),
            count_occurrences(background, &quantizer),
        );
        let total_positions = counts.len();

        let counts: HashMap<QuantizedPosition, usize> = counts
            .into_iter()
            .filter(|&(_, count)| count > thresh)
            .collect();

        log::debug!(
            "noise profile: {} of {} quantized positions exceed thresh={} ({})",
            counts.len(),
            total_positions,
            thresh,
            quantizer.binning()
        );

        Self {
            quantizer,
            thresh,
            counts,
        }
    }

    /// The quantizer used for keys; membership tests must go through it.
    #[inline]
    pub fn quantizer(&self) -> &Quantizer {
        &self.quantizer
    }

    #[inline]
    pub fn thresh(&self) -> usize {
        self.thresh
    }

    /// Number of noise positions.
    #[inline]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// True if the raw position falls in a noise bin.
    #[inline]
    pub fn contains(&self, x: f32, y: f32, z: f32) -> bool {
        self.counts.contains_key(&self.quantizer.position(x, y, z))
    }

    #[inline]
    pub fn contains_key(&self, key: &QuantizedPosition) -> bool {
        self.counts.contains_key(key)
    }

    /// Occurrence count of a noise position, `None` if it is not noise.
    pub fn count(&self, key: &QuantizedPosition) -> Option<usize> {
        self.counts.get(key).copied()
    }

    pub fn keys(&self) -> impl Iterator<Item = &QuantizedPosition> {
        self.counts.keys()
    }

    /// Per-point mask for `frame`; `true` marks a point that is NOT noise.
    pub fn signal_mask(&self, frame: &Frame) -> Vec<bool> {
        frame
            .x
            .iter()
            .zip(&frame.y)
            .zip(&frame.z)
            .map(|((&x, &y), &z)| !self.contains(x, y, z))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::frame::RadarPoint;
    use crate::core::quantize::Binning;

    fn frame_of(points: &[[f32; 4]]) -> Frame {
        Frame::from_rows(points).unwrap()
    }

    #[test]
    fn test_background_only_noise() {
        let background: Vec<Frame> = (0..50).map(|_| frame_of(&[[1.0, 1.0, 1.0, 0.0]])).collect();
        let map = NoiseMap::build(&[], &background, 30, Quantizer::spatial());

        assert!(map.contains(1.0, 1.0, 1.0));
        assert!(map.contains_key(&Quantizer::spatial().position(1.0, 1.0, 1.0)));
        assert!(!map.contains(2.0, 2.0, 2.0));
        assert_eq!(map.count(&Quantizer::spatial().position(1.0, 1.0, 1.0)), Some(50));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn test_threshold_is_strict() {
        let frames: Vec<Frame> = (0..30).map(|_| frame_of(&[[0.5, 0.5, 0.5, 1.0]])).collect();
        assert!(NoiseMap::build(&frames, &[], 30, Quantizer::spatial()).is_empty());
        assert_eq!(NoiseMap::build(&frames, &[], 29, Quantizer::spatial()).len(), 1);
    }

    #[test]
    fn test_foreground_and_background_combine() {
        let frames: Vec<Frame> = (0..3).map(|_| frame_of(&[[4.0, 0.0, 0.0, 0.0]])).collect();
        let background: Vec<Frame> = (0..3).map(|_| frame_of(&[[4.02, 0.01, 0.0, 0.0]])).collect();

        assert!(NoiseMap::build(&frames, &[], 5, Quantizer::spatial()).is_empty());
        assert!(NoiseMap::build(&frames, &background, 5, Quantizer::spatial()).contains(4.0, 0.0, 0.0));
    }

    #[test]
    fn test_zero_thresh_flags_any_occurrence() {
        let frames = vec![frame_of(&[[1.0, 2.0, 3.0, 0.1], [7.0, 8.0, 9.0, 0.2]])];
        let map = NoiseMap::build(&frames, &[], 0, Quantizer::spatial());
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_threshold_monotonicity() {
        let frames: Vec<Frame> = (0..20)
            .map(|f| {
                (0..10)
                    .map(|i| RadarPoint::new((i % (f % 4 + 1)) as f32, (i % 3) as f32 * 0.5, 0.0, 0.0))
                    .collect()
            })
            .collect();

        let maps: Vec<NoiseMap> = (0..40)
            .map(|thresh| NoiseMap::build(&frames, &[], thresh, Quantizer::spatial()))
            .collect();

        for pair in maps.windows(2) {
            assert!(pair[1].len() <= pair[0].len());
            assert!(pair[1].keys().all(|key| pair[0].contains_key(key)));
        }
    }

    #[test]
    fn test_signal_mask() {
        let background: Vec<Frame> = (0..10).map(|_| frame_of(&[[1.0, 1.0, 1.0, 0.0]])).collect();
        let map = NoiseMap::build(&[], &background, 5, Quantizer::spatial());

        let frame = frame_of(&[[1.04, 0.96, 1.0, 2.0], [3.0, 3.0, 3.0, 2.0]]);
        assert_eq!(map.signal_mask(&frame), vec![false, true]);
    }

    #[test]
    fn test_quarter_binning_keys() {
        let frames: Vec<Frame> = (0..4)
            .map(|i| frame_of(&[[1.0 + i as f32 * 0.03, 0.0, 0.0, 0.0]]))
            .collect();

        // 1.00..1.09 share one quarter bin but split across two decimal bins
        let quarter = NoiseMap::build(&frames, &[], 3, Quantizer::new(Binning::Quarter));
        assert!(quarter.contains(1.0, 0.0, 0.0));
        assert!(NoiseMap::build(&frames, &[], 3, Quantizer::spatial()).is_empty());
    }
}
