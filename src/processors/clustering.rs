//! Density-based clustering of filtered radar points.
//!
//! DBSCAN runs in the 4-D feature space `(x, y, z, v)`, so velocity separates
//! groups that overlap in space but move differently. The implementation uses:
//! - `kiddo` KD-tree for radius neighbour queries
//! - `rayon` for parallel neighbour finding and core point identification
//! - Atomic union-find for lock-free cluster merging
//!
//! # Example
//!
//! ```no_run
//! use radar_object_count::processors::clustering::dbscan;
//!
//! let points = vec![[0.0f32, 0.0, 0.0, 1.0], [0.1, 0.0, 0.0, 1.0], [50.0, 0.0, 0.0, 1.0]];
//! let labels = dbscan(&points, 1.0, 2);
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use kiddo::{ImmutableKdTree, SquaredEuclidean};
use rayon::prelude::*;

/// Label given to points that belong to no cluster.
pub const NOISE_LABEL: i32 = -1;

/// Lock-free disjoint sets over point indices.
///
/// A set's root is always its lowest index: unions only ever hang the higher
/// root under the lower one.
pub struct AtomicUnionFind {
    parent: Vec<AtomicUsize>,
}

impl AtomicUnionFind {
    pub fn new(size: usize) -> Self {
        Self {
            parent: (0..size).map(AtomicUsize::new).collect(),
        }
    }

    /// Root of the set holding `x`, halving the path on the way up.
    pub fn find(&self, mut x: usize) -> usize {
        loop {
            let parent = self.parent[x].load(Ordering::Relaxed);
            if parent == x {
                return x;
            }
            let grandparent = self.parent[parent].load(Ordering::Relaxed);
            if grandparent != parent {
                let _ = self.parent[x].compare_exchange(parent, grandparent, Ordering::Relaxed, Ordering::Relaxed);
            }
            x = parent;
        }
    }

    /// Merge the sets holding `x` and `y`; false if they were already one set.
    pub fn union(&self, x: usize, y: usize) -> bool {
        loop {
            let (a, b) = (self.find(x), self.find(y));
            if a == b {
                return false;
            }
            let (low, high) = (a.min(b), a.max(b));
            if self.parent[high]
                .compare_exchange(high, low, Ordering::Relaxed, Ordering::Relaxed)
                .is_ok()
            {
                return true;
            }
        }
    }
}

/// Distinct points of a frame with their multiplicities.
///
/// Quantized frames repeat positions often; the tree only ever sees each
/// distinct `[x, y, z, v]` once.
struct Collapsed {
    /// Distinct points in order of first appearance.
    points: Vec<[f32; 4]>,
    /// How many input points each distinct point stands for.
    weight: Vec<usize>,
    /// Distinct-point index of every input point.
    slot: Vec<usize>,
}

fn collapse_duplicates(points: &[[f32; 4]]) -> Collapsed {
    let mut seen: HashMap<[u32; 4], usize> = HashMap::with_capacity(points.len());
    let mut collapsed = Collapsed {
        points: Vec::new(),
        weight: Vec::new(),
        slot: Vec::with_capacity(points.len()),
    };

    for point in points {
        // -0.0 and 0.0 are the same position
        let key = point.map(|c| (c + 0.0).to_bits());
        let next = collapsed.points.len();
        let idx = *seen.entry(key).or_insert(next);
        if idx == next {
            collapsed.points.push(*point);
            collapsed.weight.push(0);
        }
        collapsed.weight[idx] += 1;
        collapsed.slot.push(idx);
    }

    collapsed
}

/// Smallest `f32` strictly greater than a non-negative finite `value`.
fn next_up(value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        f32::from_bits(value.to_bits() + 1)
    } else {
        value
    }
}

/// DBSCAN over `[x, y, z, v]` points.
///
/// A point is a core point when at least `min_samples` points (itself
/// included) lie within Euclidean distance `eps`, boundary inclusive. Core
/// points within `eps` of each other share a cluster; a non-core point within
/// `eps` of a core point joins the cluster of its nearest one (lowest index on
/// ties); everything else gets [`NOISE_LABEL`].
///
/// # Algorithm (Parallelized)
///
/// 1. **Collapse duplicates**: identical points become one weighted point
/// 2. **Build KD-tree**: kiddo immutable tree over the distinct points
/// 3. **Parallel neighbor finding**: radius query of every point with rayon,
///    widened by one ulp and cut back to `distance <= eps`
/// 4. **Core point identification**: weighted neighbour count >= `min_samples`
/// 5. **Lock-free cluster formation**: union every core point with its core
///    neighbours through the atomic union-find
/// 6. **Label assignment**: clusters are numbered in order of their
///    lowest-index core point, so identical input gives identical labels
///
/// # Returns
///
/// One label per input point, in input order.
pub fn dbscan(points: &[[f32; 4]], eps: f32, min_samples: usize) -> Vec<i32> {
    if points.is_empty() {
        return Vec::new();
    }

    let collapsed = collapse_duplicates(points);
    let distinct = &collapsed.points;
    let n = distinct.len();

    let tree: ImmutableKdTree<f32, 4> = ImmutableKdTree::new_from_slice(distinct);
    let eps_sq = eps * eps;
    let query_radius = next_up(eps_sq);

    // Neighbours sorted by (distance, index)
    let neighbors: Vec<Vec<usize>> = distinct
        .par_iter()
        .map(|point| {
            let mut found: Vec<(f32, usize)> = tree
                .within::<SquaredEuclidean>(point, query_radius)
                .into_iter()
                .filter(|nn| nn.distance <= eps_sq)
                .map(|nn| (nn.distance, nn.item as usize))
                .collect();
            found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            found.into_iter().map(|(_, idx)| idx).collect()
        })
        .collect();

    let is_core: Vec<bool> = neighbors
        .par_iter()
        .map(|neigh| neigh.iter().map(|&j| collapsed.weight[j]).sum::<usize>() >= min_samples)
        .collect();

    let uf = AtomicUnionFind::new(n);
    (0..n).into_par_iter().filter(|&i| is_core[i]).for_each(|i| {
        for &j in &neighbors[i] {
            if j > i && is_core[j] {
                uf.union(i, j);
            }
        }
    });

    // Distinct points are in first-appearance order, so walking them in order
    // numbers clusters by their lowest-index core point.
    let mut root_to_cluster: HashMap<usize, i32> = HashMap::new();
    let mut distinct_labels = vec![NOISE_LABEL; n];
    for i in 0..n {
        if is_core[i] {
            let next_id = root_to_cluster.len() as i32;
            distinct_labels[i] = *root_to_cluster.entry(uf.find(i)).or_insert(next_id);
        }
    }
    for i in 0..n {
        if !is_core[i] {
            if let Some(&core) = neighbors[i].iter().find(|&&j| is_core[j]) {
                distinct_labels[i] = distinct_labels[core];
            }
        }
    }

    collapsed.slot.iter().map(|&idx| distinct_labels[idx]).collect()
}

/// Number of distinct cluster labels, ignoring [`NOISE_LABEL`].
pub fn count_clusters(labels: &[i32]) -> usize {
    labels
        .iter()
        .filter(|&&label| label != NOISE_LABEL)
        .collect::<HashSet<_>>()
        .len()
}

/// Clustering result for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameClusters {
    /// Frame-local label per input point.
    pub labels: Vec<i32>,
    /// Number of clusters, excluding noise.
    pub count: usize,
}

/// Cluster one frame's filtered points.
///
/// An empty input yields no labels and a count of 0.
pub fn cluster_frame(points: &[[f32; 4]], eps: f32, min_samples: usize) -> FrameClusters {
    let labels = dbscan(points, eps, min_samples);
    let count = count_clusters(&labels);
    FrameClusters { labels, count }
}
