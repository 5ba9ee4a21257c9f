//! Max-norm nearest-neighbour queries used by the KSG estimator and the
//! Ragwitz embedding search.
//!
//! A [`NeighbourIndex`] is built once per point set and answers every query
//! against it. Low-dimensional sets are indexed with a `kiddo` kd-tree; since
//! `d_max <= d_euclid <= sqrt(dims) * d_max`, a Euclidean ball query returns a
//! superset of the max-norm candidates, which are then filtered exactly. Sets
//! the tree cannot hold (too many dimensions, non-finite values, or long runs
//! of equal coordinates) are searched exhaustively. Both paths return the
//! same answers.
//!
//! Every query excludes the query point itself and any point within the
//! dynamic correlation exclusion (Theiler) window, i.e. `|i - j| <= window`.

use kiddo::{KdTree, SquaredEuclidean};
use std::fmt;
use std::sync::Arc;

/// Widest point set indexed by a kd-tree.
const MAX_TREE_DIMS: usize = 8;
/// Leaf capacity of `kiddo::KdTree`; a leaf cannot split when this many
/// points share a coordinate on one axis.
const TREE_BUCKET_SIZE: usize = 32;
/// Relative slack on Euclidean superset radii.
const RADIUS_SLACK: f64 = 1e-9;

/// Row-major set of points with a fixed dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Points {
    data: Vec<f64>,
    dims: usize,
}

impl Points {
    /// Wrap row-major data.
    ///
    /// # Panics
    /// Panics if `dims == 0` or `data.len()` is not a multiple of `dims`.
    pub fn new(data: Vec<f64>, dims: usize) -> Self {
        assert!(dims > 0, "points need at least one dimension");
        assert_eq!(data.len() % dims, 0, "data length must be a multiple of dims");
        Self { data, dims }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len() / self.dims
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn dims(&self) -> usize {
        self.dims
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// Max-norm (Chebyshev) distance between rows `i` and `j`.
    #[inline]
    pub fn distance(&self, i: usize, j: usize) -> f64 {
        max_norm(self.row(i), self.row(j))
    }

    /// Copy of the point set with rows reordered: row `i` of the result is
    /// row `order[i]` of `self`.
    pub fn reordered(&self, order: &[usize]) -> Self {
        let mut data = Vec::with_capacity(order.len() * self.dims);
        for &idx in order {
            data.extend_from_slice(self.row(idx));
        }
        Self {
            data,
            dims: self.dims,
        }
    }

    /// Row-wise concatenation: row `i` of the result is row `i` of `self`
    /// followed by row `i` of `other`.
    ///
    /// # Panics
    /// Panics if the row counts differ.
    pub fn concat(&self, other: &Points) -> Self {
        assert_eq!(self.len(), other.len(), "point sets must have the same number of rows");
        let dims = self.dims + other.dims;
        let mut data = Vec::with_capacity(self.len() * dims);
        for i in 0..self.len() {
            data.extend_from_slice(self.row(i));
            data.extend_from_slice(other.row(i));
        }
        Self { data, dims }
    }
}

/// Chebyshev distance between two equal-length vectors.
#[inline]
pub fn max_norm(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b.iter())
        .fold(0.0_f64, |acc, (&x, &y)| acc.max((x - y).abs()))
}

#[inline]
fn excluded(i: usize, j: usize, window: usize) -> bool {
    i.abs_diff(j) <= window
}

/// Number of points a query at `i` may use as neighbours.
pub fn available_neighbours(n: usize, i: usize, window: usize) -> usize {
    let lo = i.saturating_sub(window);
    let hi = i.saturating_add(window).min(n.saturating_sub(1));
    n - (hi - lo + 1)
}

fn by_distance_then_row(a: &(f64, usize), b: &(f64, usize)) -> std::cmp::Ordering {
    a.0.total_cmp(&b.0).then(a.1.cmp(&b.1))
}

// ─── kd-tree backend ────────────────────────────────────────────────────────

/// Euclidean queries over a fixed point set, answered with row indices.
trait EuclideanTree: Send + Sync {
    /// The `qty` closest rows to `query`.
    fn nearest(&self, query: &[f64], qty: usize) -> Vec<usize>;

    /// Rows within squared Euclidean distance `radius_sq` of `query`.
    fn within(&self, query: &[f64], radius_sq: f64) -> Vec<usize>;
}

struct Tree<const D: usize>(KdTree<f64, D>);

#[inline]
fn to_array<const D: usize>(row: &[f64]) -> [f64; D] {
    let mut p = [0.0f64; D];
    p.copy_from_slice(row);
    p
}

impl<const D: usize> EuclideanTree for Tree<D> {
    fn nearest(&self, query: &[f64], qty: usize) -> Vec<usize> {
        self.0
            .nearest_n::<SquaredEuclidean>(&to_array::<D>(query), qty)
            .iter()
            .map(|neighbour| neighbour.item as usize)
            .collect()
    }

    fn within(&self, query: &[f64], radius_sq: f64) -> Vec<usize> {
        self.0
            .within_unsorted::<SquaredEuclidean>(&to_array::<D>(query), radius_sq)
            .iter()
            .map(|neighbour| neighbour.item as usize)
            .collect()
    }
}

fn build_tree<const D: usize>(points: &Points) -> Box<dyn EuclideanTree> {
    let mut tree: KdTree<f64, D> = KdTree::new();
    for i in 0..points.len() {
        tree.add(&to_array::<D>(points.row(i)), i as u64);
    }
    Box::new(Tree(tree))
}

macro_rules! tree_for_dims {
    ($points:expr; $($d:literal),+) => {
        match $points.dims() {
            $($d => Some(build_tree::<$d>($points)),)+
            _ => None,
        }
    };
}

/// Whether `points` can be held by a kd-tree.
fn tree_compatible(points: &Points) -> bool {
    if points.dims() > MAX_TREE_DIMS || points.data.iter().any(|v| !v.is_finite()) {
        return false;
    }
    let mut column = Vec::with_capacity(points.len());
    for d in 0..points.dims() {
        column.clear();
        column.extend((0..points.len()).map(|i| points.row(i)[d]));
        column.sort_unstable_by(f64::total_cmp);
        let longest_run = column
            .chunk_by(|a, b| a == b)
            .map(|run| run.len())
            .max()
            .unwrap_or(0);
        if longest_run >= TREE_BUCKET_SIZE {
            return false;
        }
    }
    true
}

// ─── Neighbour index ────────────────────────────────────────────────────────

/// A point set prepared for repeated max-norm neighbour queries.
pub struct NeighbourIndex {
    points: Points,
    tree: Option<Box<dyn EuclideanTree>>,
}

impl fmt::Debug for NeighbourIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NeighbourIndex")
            .field("len", &self.points.len())
            .field("dims", &self.points.dims())
            .field("tree", &self.tree.is_some())
            .finish()
    }
}

impl NeighbourIndex {
    pub fn new(points: Points) -> Self {
        let tree = if tree_compatible(&points) {
            tree_for_dims!(&points; 1, 2, 3, 4, 5, 6, 7, 8)
        } else {
            None
        };
        Self { points, tree }
    }

    pub fn points(&self) -> &Points {
        &self.points
    }

    /// Whether queries go through a kd-tree rather than a full scan.
    pub fn is_tree_backed(&self) -> bool {
        self.tree.is_some()
    }

    /// The `count` nearest neighbours of row `i` as `(distance, row)`,
    /// closest first, ties broken by row.
    ///
    /// Returns `None` if fewer than `count` points are available.
    pub fn nearest(&self, i: usize, count: usize, window: usize) -> Option<Vec<(f64, usize)>> {
        if count == 0 || available_neighbours(self.points.len(), i, window) < count {
            return None;
        }
        let Some(tree) = self.tree.as_deref() else {
            return scan_nearest(&self.points, i, count, window);
        };

        // the exclusion window hides at most 2 * window + 1 rows
        let qty = count
            .saturating_add(window.saturating_mul(2))
            .saturating_add(1)
            .min(self.points.len());
        let mut bounds: Vec<f64> = tree
            .nearest(self.points.row(i), qty)
            .into_iter()
            .filter(|&j| !excluded(i, j, window))
            .map(|j| self.points.distance(i, j))
            .collect();
        if bounds.len() < count {
            return scan_nearest(&self.points, i, count, window);
        }
        // at least `count` points lie within this max-norm radius
        let (_, radius, _) = bounds.select_nth_unstable_by(count - 1, f64::total_cmp);
        let radius = *radius;

        let mut nearest: Vec<(f64, usize)> = tree
            .within(self.points.row(i), self.superset_radius_sq(radius))
            .into_iter()
            .filter(|&j| !excluded(i, j, window))
            .map(|j| (self.points.distance(i, j), j))
            .filter(|&(d, _)| d <= radius)
            .collect();
        nearest.sort_unstable_by(by_distance_then_row);
        nearest.truncate(count);
        Some(nearest)
    }

    /// Number of points strictly closer than `radius` to row `i`.
    pub fn count_within(&self, i: usize, radius: f64, window: usize) -> usize {
        if radius.is_nan() || radius <= 0.0 {
            return 0;
        }
        let Some(tree) = self.tree.as_deref() else {
            return scan_count(&self.points, i, radius, window);
        };
        tree.within(self.points.row(i), self.superset_radius_sq(radius))
            .into_iter()
            .filter(|&j| !excluded(i, j, window) && self.points.distance(i, j) < radius)
            .count()
    }

    /// Squared Euclidean radius enclosing the max-norm ball of `radius`.
    fn superset_radius_sq(&self, radius: f64) -> f64 {
        self.points.dims() as f64 * radius * radius * (1.0 + RADIUS_SLACK) + f64::MIN_POSITIVE
    }
}

fn scan_nearest(points: &Points, i: usize, count: usize, window: usize) -> Option<Vec<(f64, usize)>> {
    let mut candidates: Vec<(f64, usize)> = (0..points.len())
        .filter(|&j| !excluded(i, j, window))
        .map(|j| (points.distance(i, j), j))
        .collect();
    if count == 0 || candidates.len() < count {
        return None;
    }
    candidates.select_nth_unstable_by(count - 1, by_distance_then_row);
    candidates.truncate(count);
    candidates.sort_unstable_by(by_distance_then_row);
    Some(candidates)
}

fn scan_count(points: &Points, i: usize, radius: f64, window: usize) -> usize {
    (0..points.len())
        .filter(|&j| !excluded(i, j, window) && points.distance(i, j) < radius)
        .count()
}

// ─── Conditional KSG counts ─────────────────────────────────────────────────

/// Neighbour counts for one query point of a conditional KSG estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConditionalCounts {
    /// Points strictly within ε in the (first variable, conditional) subspace.
    pub n_xz: usize,
    /// Points strictly within ε in the (second variable, conditional) subspace.
    pub n_yz: usize,
    /// Points strictly within ε in the conditional subspace.
    pub n_z: usize,
}

/// Indexed joint and marginal spaces of `(var1, var2, cond)`.
///
/// The `(var2, cond)` and `cond` indices are shared, so surrogates that only
/// replace `var1` rebuild two indices instead of four.
#[derive(Debug)]
pub struct ConditionalSpaces {
    joint: NeighbourIndex,
    var1_cond: NeighbourIndex,
    var2_cond: Arc<NeighbourIndex>,
    cond: Arc<NeighbourIndex>,
}

impl ConditionalSpaces {
    /// # Panics
    /// Panics if the point sets have different row counts.
    pub fn new(var1: &Points, var2: &Points, cond: &Points) -> Self {
        let var2_cond = Arc::new(NeighbourIndex::new(var2.concat(cond)));
        let cond = Arc::new(NeighbourIndex::new(cond.clone()));
        Self::assemble(var1, var2_cond, cond)
    }

    /// The same spaces with `var1` replaced.
    pub fn with_first(&self, var1: &Points) -> Self {
        Self::assemble(var1, Arc::clone(&self.var2_cond), Arc::clone(&self.cond))
    }

    fn assemble(var1: &Points, var2_cond: Arc<NeighbourIndex>, cond: Arc<NeighbourIndex>) -> Self {
        Self {
            joint: NeighbourIndex::new(var1.concat(var2_cond.points())),
            var1_cond: NeighbourIndex::new(var1.concat(cond.points())),
            var2_cond,
            cond,
        }
    }

    pub fn len(&self) -> usize {
        self.cond.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cond.points().is_empty()
    }

    /// KSG algorithm 1 counts for query `i`.
    ///
    /// ε is the max-norm distance from `i` to its `k`-th nearest neighbour in
    /// the joint space; the marginal counts use strict `< ε`. Returns `None`
    /// when fewer than `k` neighbours are available.
    pub fn counts(&self, i: usize, k: usize, window: usize) -> Option<ConditionalCounts> {
        let nearest = self.joint.nearest(i, k, window)?;
        let (eps, _) = *nearest.last()?;
        Some(ConditionalCounts {
            n_xz: self.var1_cond.count_within(i, eps, window),
            n_yz: self.var2_cond.count_within(i, eps, window),
            n_z: self.cond.count_within(i, eps, window),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::white_noise;

    fn line(values: &[f64]) -> Points {
        Points::new(values.to_vec(), 1)
    }

    fn rows(nearest: &[(f64, usize)]) -> Vec<usize> {
        nearest.iter().map(|&(_, j)| j).collect()
    }

    #[test]
    fn test_max_norm() {
        assert_eq!(max_norm(&[0.0, 1.0], &[0.5, -2.0]), 3.0);
        assert_eq!(max_norm(&[], &[]), 0.0);
    }

    #[test]
    fn test_points_layout() {
        let p = Points::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2);
        assert_eq!(p.len(), 3);
        assert_eq!(p.row(1), &[3.0, 4.0]);
        assert_eq!(p.distance(0, 2), 4.0);

        let r = p.reordered(&[2, 0, 1]);
        assert_eq!(r.row(0), &[5.0, 6.0]);
        assert_eq!(r.row(2), &[3.0, 4.0]);

        let c = p.concat(&line(&[7.0, 8.0, 9.0]));
        assert_eq!(c.dims(), 3);
        assert_eq!(c.row(1), &[3.0, 4.0, 8.0]);
    }

    #[test]
    fn test_nearest_sorted() {
        let index = NeighbourIndex::new(line(&[0.0, 10.0, 1.0, 3.0, -0.5]));
        assert!(index.is_tree_backed());
        let nn = index.nearest(0, 3, 0).unwrap();
        assert_eq!(rows(&nn), vec![4, 2, 3]);
        assert_eq!(nn[2].0, 3.0);
        assert!(index.nearest(0, 5, 0).is_none());
        assert!(index.nearest(0, 0, 0).is_none());
    }

    #[test]
    fn test_theiler_window_excludes_time_neighbours() {
        let index = NeighbourIndex::new(line(&[0.0, 0.1, 0.2, 5.0, 6.0]));
        // indices 1 and 2 are within the window of index 0
        let nn = index.nearest(0, 1, 2).unwrap();
        assert_eq!(rows(&nn), vec![3]);
        assert_eq!(index.count_within(0, 5.5, 2), 1);
        assert_eq!(available_neighbours(5, 0, 2), 2);
        assert_eq!(available_neighbours(5, 2, 1), 2);
        assert_eq!(available_neighbours(5, 2, 0), 4);
        assert_eq!(available_neighbours(5, 2, usize::MAX), 0);
    }

    #[test]
    fn test_count_within_is_strict() {
        let index = NeighbourIndex::new(line(&[0.0, 1.0, -1.0, 0.5, 2.0]));
        assert_eq!(index.count_within(0, 1.0, 0), 1);
        assert_eq!(index.count_within(0, 1.0 + 1e-12, 0), 3);
        assert_eq!(index.count_within(0, 0.0, 0), 0);
    }

    #[test]
    fn test_tree_matches_full_scan() {
        let n = 300;
        let noise = white_noise(3 * n, 1.0, 17);
        let points = Points::new(noise, 3);
        let index = NeighbourIndex::new(points.clone());
        assert!(index.is_tree_backed());

        for window in [0, 3] {
            for i in (0..n).step_by(7) {
                for count in [1, 4, 10] {
                    assert_eq!(
                        index.nearest(i, count, window),
                        scan_nearest(&points, i, count, window),
                        "row {i}, count {count}, window {window}"
                    );
                }
                for radius in [0.05, 0.3, 1.0, 4.0] {
                    assert_eq!(
                        index.count_within(i, radius, window),
                        scan_count(&points, i, radius, window)
                    );
                }
            }
        }
    }

    #[test]
    fn test_tree_handles_tied_distances() {
        // integer grid: many neighbours share a distance
        let data: Vec<f64> = (0..200).flat_map(|i| [(i % 10) as f64, (i / 10) as f64]).collect();
        let points = Points::new(data, 2);
        let index = NeighbourIndex::new(points.clone());
        assert!(index.is_tree_backed());
        for i in [0, 55, 199] {
            for count in [1, 3, 8, 9] {
                assert_eq!(index.nearest(i, count, 0), scan_nearest(&points, i, count, 0));
            }
            assert_eq!(index.count_within(i, 1.0, 0), scan_count(&points, i, 1.0, 0));
            assert_eq!(index.count_within(i, 2.0, 0), scan_count(&points, i, 2.0, 0));
        }
    }

    #[test]
    fn test_unindexable_sets_fall_back_to_scan() {
        let repeated = NeighbourIndex::new(line(&[1.0; 40]));
        assert!(!repeated.is_tree_backed());
        assert_eq!(rows(&repeated.nearest(0, 2, 0).unwrap()), vec![1, 2]);

        let wide = NeighbourIndex::new(Points::new(white_noise(9 * 20, 1.0, 3), 9));
        assert!(!wide.is_tree_backed());
        assert_eq!(wide.nearest(0, 3, 0).unwrap().len(), 3);

        let with_nan = NeighbourIndex::new(line(&[0.0, f64::NAN, 1.0]));
        assert!(!with_nan.is_tree_backed());
    }

    #[test]
    fn test_conditional_counts_hand_computed() {
        // query 0; joint distances to 1,2,3 are 0.5, 1.0, 2.0
        let var1 = line(&[0.0, 0.5, 0.2, 2.0]);
        let var2 = line(&[0.0, 0.1, 1.0, 0.0]);
        let cond = line(&[0.0, 0.2, 0.1, 0.3]);
        let spaces = ConditionalSpaces::new(&var1, &var2, &cond);
        assert_eq!(spaces.len(), 4);
        let c = spaces.counts(0, 2, 0).unwrap();
        // eps = 1.0 (second smallest joint distance)
        assert_eq!(c.n_z, 3);
        assert_eq!(c.n_xz, 2); // points 1, 2
        assert_eq!(c.n_yz, 2); // points 1, 3
    }

    #[test]
    fn test_with_first_matches_fresh_spaces() {
        let var1 = Points::new(white_noise(100, 1.0, 1), 1);
        let var2 = Points::new(white_noise(100, 1.0, 2), 1);
        let cond = Points::new(white_noise(200, 1.0, 3), 2);
        let spaces = ConditionalSpaces::new(&var1, &var2, &cond);

        let order: Vec<usize> = (0..100).rev().collect();
        let shuffled = var1.reordered(&order);
        let reused = spaces.with_first(&shuffled);
        let fresh = ConditionalSpaces::new(&shuffled, &var2, &cond);
        for i in 0..100 {
            assert_eq!(reused.counts(i, 4, 1), fresh.counts(i, 4, 1));
        }
    }

    #[test]
    fn test_conditional_counts_insufficient() {
        let p = line(&[0.0, 1.0]);
        assert!(ConditionalSpaces::new(&p, &p, &p).counts(0, 2, 0).is_none());
    }
}
