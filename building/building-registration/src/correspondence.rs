//! Nearest-neighbor correspondence search.
//!
//! For every source point the closest target point is found; pairs farther
//! apart than the maximum distance are dropped. Two strategies give identical
//! output:
//!
//! - brute force over every target point
//! - a uniform hash grid with cells as wide as the maximum distance, so only
//!   the 27 cells around a query can hold a valid match
//!
//! Ties between equally distant targets go to the lowest target index, and
//! the output is ordered by source index regardless of strategy or thread
//! count.

use hashbrown::HashMap;
use nalgebra::Point3;
use rayon::prelude::*;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Below this many target points `Auto` keeps brute force.
const AUTO_GRID_MIN_TARGETS: usize = 64;

/// A paired source/target point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correspondence {
    /// Index of the point in the source slice that was searched.
    pub source_index: usize,
    /// Index of the matched point in the target slice.
    pub target_index: usize,
    /// Source position as searched (already transformed).
    pub source_point: Point3<f64>,
    /// Matched target position.
    pub target_point: Point3<f64>,
    /// Euclidean distance between the two, never above the search limit.
    pub distance: f64,
}

/// Strategy for nearest-neighbor lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeighborSearch {
    /// Compare against every target point.
    BruteForce,
    /// Uniform hash grid. Needs a finite maximum distance; falls back to
    /// brute force otherwise.
    Grid,
    /// Grid for large targets with a finite maximum distance, brute force
    /// otherwise.
    #[default]
    Auto,
}

/// Target points prepared for repeated nearest-neighbor queries.
///
/// Built once per registration and queried every iteration.
#[derive(Debug, Clone)]
pub struct TargetIndex<'a> {
    points: &'a [Point3<f64>],
    max_distance: f64,
    grid: Option<CellGrid>,
}

impl<'a> TargetIndex<'a> {
    /// Indexes `points` for queries with the given distance limit.
    ///
    /// A NaN or negative `max_distance` matches nothing.
    #[must_use]
    pub fn build(points: &'a [Point3<f64>], max_distance: f64, search: NeighborSearch) -> Self {
        let grid_usable = max_distance.is_finite() && max_distance > 0.0;
        let use_grid = match search {
            NeighborSearch::BruteForce => false,
            NeighborSearch::Grid => grid_usable,
            NeighborSearch::Auto => grid_usable && points.len() >= AUTO_GRID_MIN_TARGETS,
        };

        let grid = use_grid.then(|| CellGrid::build(points, max_distance));
        debug!(
            targets = points.len(),
            max_distance,
            grid = grid.is_some(),
            cells = grid.as_ref().map_or(0, CellGrid::cell_count),
            "built target index"
        );

        Self {
            points,
            max_distance,
            grid,
        }
    }

    /// The indexed target points.
    #[must_use]
    pub const fn points(&self) -> &'a [Point3<f64>] {
        self.points
    }

    /// Whether queries go through the hash grid.
    #[must_use]
    pub const fn uses_grid(&self) -> bool {
        self.grid.is_some()
    }

    /// Nearest target within the distance limit as `(index, distance)`.
    #[must_use]
    pub fn nearest(&self, query: &Point3<f64>) -> Option<(usize, f64)> {
        let best = match &self.grid {
            Some(grid) => grid.nearest(self.points, query),
            None => brute_force_nearest(self.points, query),
        };
        best.map(|(index, dist_sq)| (index, dist_sq.sqrt()))
            .filter(|&(_, distance)| distance <= self.max_distance)
    }

    /// Matches every source point against the target, in parallel.
    ///
    /// The result is ordered by source index.
    #[must_use]
    pub fn correspondences(&self, source: &[Point3<f64>]) -> Vec<Correspondence> {
        source
            .par_iter()
            .enumerate()
            .filter_map(|(source_index, p)| {
                self.nearest(p).map(|(target_index, distance)| Correspondence {
                    source_index,
                    target_index,
                    source_point: *p,
                    target_point: self.points[target_index],
                    distance,
                })
            })
            .collect()
    }
}

/// Finds correspondences from `source` to `target` within `max_distance`.
///
/// Builds a throwaway [`TargetIndex`] with [`NeighborSearch::Auto`]. Use the
/// index directly when querying the same target repeatedly.
///
/// # Example
///
/// ```
/// use building_registration::find_correspondences;
/// use nalgebra::Point3;
///
/// let target = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(5.0, 0.0, 0.0)];
/// let source = vec![Point3::new(0.1, 0.0, 0.0), Point3::new(2.5, 9.0, 0.0)];
///
/// let pairs = find_correspondences(&source, &target, 1.0);
/// assert_eq!(pairs.len(), 1);
/// assert_eq!(pairs[0].target_index, 0);
/// assert!((pairs[0].distance - 0.1).abs() < 1e-12);
/// ```
#[must_use]
pub fn find_correspondences(
    source: &[Point3<f64>],
    target: &[Point3<f64>],
    max_distance: f64,
) -> Vec<Correspondence> {
    TargetIndex::build(target, max_distance, NeighborSearch::Auto).correspondences(source)
}

/// Lowest-index nearest point as `(index, squared distance)`.
fn brute_force_nearest(points: &[Point3<f64>], query: &Point3<f64>) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;
    for (i, p) in points.iter().enumerate() {
        let dist_sq = (p - query).norm_squared();
        if best.map_or(true, |(_, d)| dist_sq < d) {
            best = Some((i, dist_sq));
        }
    }
    best
}

type CellKey = (i64, i64, i64);

/// Uniform spatial hash over target point indices.
#[derive(Debug, Clone)]
struct CellGrid {
    inv_cell_size: f64,
    cells: HashMap<CellKey, Vec<usize>>,
}

impl CellGrid {
    fn build(points: &[Point3<f64>], cell_size: f64) -> Self {
        let mut grid = Self {
            inv_cell_size: 1.0 / cell_size,
            cells: HashMap::new(),
        };
        for (i, p) in points.iter().enumerate() {
            let key = grid.key(p);
            grid.cells.entry(key).or_default().push(i);
        }
        grid
    }

    fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn key(&self, p: &Point3<f64>) -> CellKey {
        // `as` saturates, so far-away points collapse into edge cells rather than wrap
        (
            (p.x * self.inv_cell_size).floor() as i64,
            (p.y * self.inv_cell_size).floor() as i64,
            (p.z * self.inv_cell_size).floor() as i64,
        )
    }

    #[allow(clippy::float_cmp)]
    fn nearest(&self, points: &[Point3<f64>], query: &Point3<f64>) -> Option<(usize, f64)> {
        let (cx, cy, cz) = self.key(query);
        let mut best: Option<(usize, f64)> = None;

        for dx in -1..=1_i64 {
            for dy in -1..=1_i64 {
                for dz in -1..=1_i64 {
                    let key = (
                        cx.saturating_add(dx),
                        cy.saturating_add(dy),
                        cz.saturating_add(dz),
                    );
                    let Some(bucket) = self.cells.get(&key) else {
                        continue;
                    };
                    for &i in bucket {
                        let dist_sq = (points[i] - query).norm_squared();
                        let better = best.map_or(true, |(bi, bd)| {
                            dist_sq < bd || (dist_sq == bd && i < bi)
                        });
                        if better {
                            best = Some((i, dist_sq));
                        }
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_points(rng: &mut StdRng, n: usize, extent: f64) -> Vec<Point3<f64>> {
        (0..n)
            .map(|_| {
                Point3::new(
                    rng.gen_range(0.0..extent),
                    rng.gen_range(0.0..extent),
                    rng.gen_range(0.0..extent),
                )
            })
            .collect()
    }

    #[test]
    fn test_points_beyond_limit_dropped() {
        let target = vec![Point3::origin()];
        let source = vec![Point3::new(0.5, 0.0, 0.0), Point3::new(1.5, 0.0, 0.0)];

        let pairs = find_correspondences(&source, &target, 1.0);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].source_index, 0);
        assert_relative_eq!(pairs[0].distance, 0.5);
    }

    #[test]
    fn test_limit_is_inclusive() {
        let target = vec![Point3::origin()];
        let source = vec![Point3::new(1.0, 0.0, 0.0)];
        assert_eq!(find_correspondences(&source, &target, 1.0).len(), 1);
    }

    #[test]
    fn test_ties_go_to_lowest_target_index() {
        let target = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let source = vec![Point3::origin()];

        for search in [NeighborSearch::BruteForce, NeighborSearch::Grid] {
            let index = TargetIndex::build(&target, 2.0, search);
            let pairs = index.correspondences(&source);
            assert_eq!(pairs[0].target_index, 0, "{search:?}");
        }
    }

    #[test]
    fn test_empty_inputs() {
        let points = vec![Point3::origin()];
        assert!(find_correspondences(&[], &points, 1.0).is_empty());
        assert!(find_correspondences(&points, &[], 1.0).is_empty());
    }

    #[test]
    fn test_nan_limit_matches_nothing() {
        let points = vec![Point3::origin()];
        assert!(find_correspondences(&points, &points, f64::NAN).is_empty());
    }

    #[test]
    fn test_infinite_limit_uses_brute_force() {
        let target: Vec<_> = (0..200).map(|i| Point3::new(f64::from(i), 0.0, 0.0)).collect();
        let index = TargetIndex::build(&target, f64::INFINITY, NeighborSearch::Grid);
        assert!(!index.uses_grid());

        let pairs = index.correspondences(&[Point3::new(1000.0, 0.0, 0.0)]);
        assert_eq!(pairs[0].target_index, 199);
    }

    #[test]
    fn test_auto_picks_grid_for_large_targets() {
        let mut rng = StdRng::seed_from_u64(3);
        let small = random_points(&mut rng, 10, 1.0);
        let large = random_points(&mut rng, 500, 1.0);

        assert!(!TargetIndex::build(&small, 0.2, NeighborSearch::Auto).uses_grid());
        assert!(TargetIndex::build(&large, 0.2, NeighborSearch::Auto).uses_grid());
    }

    #[test]
    fn test_grid_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(42);
        let target = random_points(&mut rng, 2_000, 5.0);
        let source = random_points(&mut rng, 1_000, 5.0);

        for max_distance in [0.05, 0.3, 1.0] {
            let brute = TargetIndex::build(&target, max_distance, NeighborSearch::BruteForce)
                .correspondences(&source);
            let grid = TargetIndex::build(&target, max_distance, NeighborSearch::Grid)
                .correspondences(&source);
            assert_eq!(brute, grid, "max_distance {max_distance}");
        }
    }

    #[test]
    fn test_grid_handles_negative_coordinates() {
        let target = vec![Point3::new(-0.05, -0.05, -0.05), Point3::new(3.0, 3.0, 3.0)];
        let source = vec![Point3::new(0.05, 0.05, 0.05)];

        let index = TargetIndex::build(&target, 0.2, NeighborSearch::Grid);
        let pairs = index.correspondences(&source);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].target_index, 0);
    }

    #[test]
    fn test_output_ordered_by_source() {
        let mut rng = StdRng::seed_from_u64(7);
        let target = random_points(&mut rng, 300, 2.0);
        let pairs = find_correspondences(&target, &target, 0.5);

        assert_eq!(pairs.len(), target.len());
        for (i, c) in pairs.iter().enumerate() {
            assert_eq!(c.source_index, i);
            assert_eq!(c.distance, 0.0);
        }
    }
}
