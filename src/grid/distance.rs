//! Incremental Euclidean distance transform.
//!
//! Maintains, for every cell within `max_distance` of an obstacle, the exact
//! squared Euclidean distance (in cell units) to its nearest obstacle and
//! that obstacle's coordinates, under incremental insertion and removal of
//! obstacles (the dynamic brushfire of Kalra/Lau).
//!
//! Two priority queues order the work by squared distance:
//!
//! - the **lower** queue propagates shrinking distances outward from new or
//!   repaired sources;
//! - the **raise** queue clears cells whose nearest obstacle was removed and
//!   collects the still-valid frontier around the cleared region so it can
//!   be repaired by a subsequent lower wave.
//!
//! [`update`](DynamicDistanceMap::update) drains raise first, then lower, to
//! a fixed point. Cells can sit in the lower queue several times with stale
//! keys; entries whose key no longer matches the cell are skipped on pop
//! (lazy deletion). A monotone sequence number breaks ties in insertion
//! order, keeping drain order deterministic.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use crate::core::{GridCoord, WorldPoint};
use crate::error::ConfigError;

use super::container::SparseGrid;

/// Squared-distance sentinel for cells with no known nearby obstacle.
const SQ_UNKNOWN: u32 = u32::MAX;

/// A distance-map cell.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct DistanceCell {
    /// Squared distance to the nearest obstacle, in cell units
    pub sq_dist: u32,
    /// Coordinates of that obstacle
    pub obstacle: GridCoord,
    /// Whether the obstacle reference is valid
    pub valid: bool,
}

impl Default for DistanceCell {
    fn default() -> Self {
        Self {
            sq_dist: SQ_UNKNOWN,
            obstacle: GridCoord::new(0, 0),
            valid: false,
        }
    }
}

/// Queue entry: `(squared distance, insertion sequence, cell)`.
///
/// Ordered so a min-heap pops the smallest distance first and, among equal
/// distances, the earliest insertion.
type QueueEntry = Reverse<(u32, u64, (i32, i32))>;

/// Incremental Euclidean distance map over a sparse grid.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DynamicDistanceMap {
    grid: SparseGrid<DistanceCell>,
    max_distance: f64,
    /// Squared saturation radius in cell units.
    max_sq: u32,
    #[serde(skip)]
    lower: BinaryHeap<QueueEntry>,
    #[serde(skip)]
    raise: BinaryHeap<QueueEntry>,
    #[serde(skip)]
    seq: u64,
}

impl DynamicDistanceMap {
    /// Create an empty distance map.
    ///
    /// `max_distance` (meters) saturates propagation: cells farther than
    /// this from every obstacle read as `max_distance`.
    pub fn new(
        resolution: f64,
        patch_side: usize,
        max_distance: f64,
    ) -> Result<Self, ConfigError> {
        if !(max_distance > 0.0) {
            return Err(ConfigError::InvalidMaxDistance(max_distance));
        }
        let grid = SparseGrid::new(resolution, patch_side)?;

        let cells = max_distance / resolution;
        let max_sq = (cells * cells).floor() as u32;

        Ok(Self {
            grid,
            max_distance,
            max_sq,
            lower: BinaryHeap::new(),
            raise: BinaryHeap::new(),
            seq: 0,
        })
    }

    /// Cell size in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.grid.resolution()
    }

    /// Saturation distance in meters.
    #[inline]
    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    /// Number of allocated patches.
    #[inline]
    pub fn patch_count(&self) -> usize {
        self.grid.patch_count()
    }

    /// Cell containing a world point.
    #[inline]
    pub fn cell_of(&self, p: WorldPoint) -> GridCoord {
        self.grid.cell_of(p)
    }

    /// Borrow the backing grid (patch-wise iteration for persistence).
    #[inline]
    pub fn grid(&self) -> &SparseGrid<DistanceCell> {
        &self.grid
    }

    /// Whether a cell currently is a distance source (a known obstacle).
    #[inline]
    pub fn is_obstacle(&self, c: GridCoord) -> bool {
        let cell = self.grid.get(c);
        cell.valid && cell.sq_dist == 0 && cell.obstacle == c
    }

    /// Register an obstacle at a cell.
    ///
    /// Idempotent: re-adding a known obstacle is a no-op. The patch covering
    /// the cell is allocated on demand; arbitrary coordinates are accepted.
    /// Takes effect on the next [`update`](Self::update).
    pub fn add_obstacle(&mut self, c: GridCoord) {
        if self.is_obstacle(c) {
            return;
        }

        let cell = self.grid.get_mut(c);
        cell.sq_dist = 0;
        cell.obstacle = c;
        cell.valid = true;

        self.push_lower(0, c);
    }

    /// Remove a previously registered obstacle.
    ///
    /// A no-op for cells that are not sources. Takes effect on the next
    /// [`update`](Self::update).
    pub fn remove_obstacle(&mut self, c: GridCoord) {
        if !self.is_obstacle(c) {
            return;
        }

        let cell = self.grid.get_mut(c);
        cell.valid = false;

        self.push_raise(0, c);
    }

    /// Propagate pending obstacle changes to a fixed point.
    ///
    /// Drains the raise queue (clearing regions that referenced removed
    /// obstacles and queueing their valid frontier for repair), then the
    /// lower queue. Returns the number of cell writes performed.
    pub fn update(&mut self) -> usize {
        let mut updated = 0;

        while let Some(Reverse((_, _, key))) = self.raise.pop() {
            updated += self.process_raise(GridCoord::new(key.0, key.1));
        }

        while let Some(Reverse((sq, _, key))) = self.lower.pop() {
            let c = GridCoord::new(key.0, key.1);
            let cell = self.grid.get(c);
            // Lazy deletion: skip entries whose key went stale.
            if !cell.valid || cell.sq_dist != sq {
                continue;
            }
            updated += self.process_lower(c, cell.obstacle);
        }

        if updated > 0 {
            log::trace!("distance map settled after {} cell updates", updated);
        }
        updated
    }

    /// Clear a raised cell and sort its neighbors into raise or repair.
    fn process_raise(&mut self, c: GridCoord) -> usize {
        // The cell may have been re-anchored (e.g. the obstacle was re-added)
        // between the removal and the drain; leave it alone then.
        if self.grid.get(c).valid {
            return 0;
        }

        let mut updated = 0;

        for n in c.neighbors_8() {
            let ncell = self.grid.get(n);
            if !ncell.valid {
                continue;
            }
            if self.is_obstacle(ncell.obstacle) {
                // Still anchored to a live obstacle: repair wave source.
                self.push_lower(ncell.sq_dist, n);
            } else {
                // Anchored to a removed obstacle: clear it too.
                let sq = ncell.sq_dist;
                let cell = self.grid.get_mut(n);
                cell.valid = false;
                self.push_raise(sq, n);
            }
        }

        let cell = self.grid.get_mut(c);
        if cell.sq_dist != SQ_UNKNOWN {
            cell.sq_dist = SQ_UNKNOWN;
            updated += 1;
        }

        updated
    }

    /// Offer `c`'s source to its 8-neighborhood.
    fn process_lower(&mut self, c: GridCoord, source: GridCoord) -> usize {
        let mut updated = 0;

        for n in c.neighbors_8() {
            let candidate = n.squared_distance(&source);
            if candidate > self.max_sq {
                continue;
            }

            let ncell = self.grid.get(n);
            if !ncell.valid || candidate < ncell.sq_dist {
                let cell = self.grid.get_mut(n);
                cell.sq_dist = candidate;
                cell.obstacle = source;
                cell.valid = true;
                updated += 1;
                self.push_lower(candidate, n);
            }
        }

        updated
    }

    #[inline]
    fn push_lower(&mut self, sq: u32, c: GridCoord) {
        self.seq += 1;
        self.lower.push(Reverse((sq, self.seq, (c.x, c.y))));
    }

    #[inline]
    fn push_raise(&mut self, sq: u32, c: GridCoord) {
        self.seq += 1;
        self.raise.push(Reverse((sq, self.seq, (c.x, c.y))));
    }

    // === Queries ===

    /// Euclidean distance of a cell to its nearest obstacle, in meters,
    /// saturated at `max_distance`.
    #[inline]
    pub fn cell_distance(&self, c: GridCoord) -> f64 {
        let cell = self.grid.get(c);
        if !cell.valid || cell.sq_dist > self.max_sq {
            return self.max_distance;
        }
        ((cell.sq_dist as f64).sqrt() * self.grid.resolution()).min(self.max_distance)
    }

    /// Interpolated Euclidean distance at a world point, in meters.
    ///
    /// Bilinear over the four surrounding cells; regions with no allocated
    /// data read as `max_distance`.
    #[inline]
    pub fn distance(&self, p: WorldPoint) -> f64 {
        self.distance_and_gradient(p).0
    }

    /// Distance gradient at a world point, `(∂d/∂x, ∂d/∂y)`.
    #[inline]
    pub fn gradient(&self, p: WorldPoint) -> (f64, f64) {
        let (_, gx, gy) = self.distance_and_gradient(p);
        (gx, gy)
    }

    /// Interpolated distance and its gradient at a world point.
    ///
    /// The gradient differentiates the bilinear surface: corner differences
    /// blended by the opposite fractional coordinate. Unallocated regions
    /// contribute the saturated distance with zero gradient.
    pub fn distance_and_gradient(&self, p: WorldPoint) -> (f64, f64, f64) {
        let resolution = self.grid.resolution();
        let gx = p.x / resolution;
        let gy = p.y / resolution;

        let x0 = gx.floor() as i32;
        let y0 = gy.floor() as i32;

        let fx = gx - x0 as f64;
        let fy = gy - y0 as f64;

        let d00 = self.cell_distance(GridCoord::new(x0, y0));
        let d10 = self.cell_distance(GridCoord::new(x0 + 1, y0));
        let d01 = self.cell_distance(GridCoord::new(x0, y0 + 1));
        let d11 = self.cell_distance(GridCoord::new(x0 + 1, y0 + 1));

        let d0 = d00 * (1.0 - fx) + d10 * fx;
        let d1 = d01 * (1.0 - fx) + d11 * fx;
        let distance = d0 * (1.0 - fy) + d1 * fy;

        let grad_x = ((d10 - d00) * (1.0 - fy) + (d11 - d01) * fy) / resolution;
        let grad_y = ((d01 - d00) * (1.0 - fx) + (d11 - d10) * fx) / resolution;

        (distance, grad_x, grad_y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_map(max_distance: f64) -> DynamicDistanceMap {
        DynamicDistanceMap::new(1.0, 16, max_distance).unwrap()
    }

    #[test]
    fn test_rejects_bad_max_distance() {
        assert!(DynamicDistanceMap::new(1.0, 16, 0.0).is_err());
        assert!(DynamicDistanceMap::new(1.0, 16, -1.0).is_err());
    }

    #[test]
    fn test_single_obstacle_exact_distances() {
        let mut map = unit_map(10.0);
        map.add_obstacle(GridCoord::new(0, 0));
        map.update();

        assert_eq!(map.cell_distance(GridCoord::new(0, 0)), 0.0);
        assert!((map.cell_distance(GridCoord::new(3, 4)) - 5.0).abs() < 1e-12);
        assert!((map.cell_distance(GridCoord::new(-6, 8)) - 10.0).abs() < 1e-12);
        // Beyond the saturation radius.
        assert_eq!(map.cell_distance(GridCoord::new(11, 0)), 10.0);
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut once = unit_map(5.0);
        once.add_obstacle(GridCoord::new(2, 2));
        once.update();

        let mut twice = unit_map(5.0);
        twice.add_obstacle(GridCoord::new(2, 2));
        twice.add_obstacle(GridCoord::new(2, 2));
        twice.update();
        twice.add_obstacle(GridCoord::new(2, 2));
        assert_eq!(twice.update(), 0);

        for x in -4..9 {
            for y in -4..9 {
                let c = GridCoord::new(x, y);
                assert_eq!(once.cell_distance(c), twice.cell_distance(c));
            }
        }
    }

    #[test]
    fn test_remove_restores_previous_field() {
        let mut map = unit_map(4.0);
        map.add_obstacle(GridCoord::new(0, 0));
        map.update();
        map.remove_obstacle(GridCoord::new(0, 0));
        map.update();

        for x in -6..7 {
            for y in -6..7 {
                assert_eq!(map.cell_distance(GridCoord::new(x, y)), 4.0);
            }
        }
    }

    #[test]
    fn test_removal_repairs_from_remaining_obstacle() {
        let mut map = unit_map(10.0);
        map.add_obstacle(GridCoord::new(0, 0));
        map.add_obstacle(GridCoord::new(6, 0));
        map.update();

        assert!((map.cell_distance(GridCoord::new(2, 0)) - 2.0).abs() < 1e-12);

        map.remove_obstacle(GridCoord::new(0, 0));
        map.update();

        // Everything now anchors to the survivor at (6, 0).
        assert!((map.cell_distance(GridCoord::new(2, 0)) - 4.0).abs() < 1e-12);
        assert!((map.cell_distance(GridCoord::new(0, 0)) - 6.0).abs() < 1e-12);
        assert!((map.cell_distance(GridCoord::new(6, 3)) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_is_continuous_across_cells() {
        let mut map = unit_map(10.0);
        map.add_obstacle(GridCoord::new(0, 0));
        map.update();

        // Sample a segment crossing several cell borders; neighbor samples
        // must not jump.
        let mut previous = None;
        let mut t = 0.0;
        while t <= 6.0 {
            let d = map.distance(WorldPoint::new(t, 1.3));
            if let Some(prev) = previous {
                let jump: f64 = d - prev;
                assert!(jump.abs() < 0.05, "discontinuity at t={}: {}", t, jump);
            }
            previous = Some(d);
            t += 0.01;
        }
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let mut map = unit_map(10.0);
        map.add_obstacle(GridCoord::new(0, 0));
        map.update();

        let eps = 1e-6;
        for &(x, y) in &[(2.3, 1.7), (-3.4, 0.2), (0.6, 4.9)] {
            let p = WorldPoint::new(x, y);
            let (_, gx, gy) = map.distance_and_gradient(p);

            let fd_x = (map.distance(WorldPoint::new(x + eps, y))
                - map.distance(WorldPoint::new(x - eps, y)))
                / (2.0 * eps);
            let fd_y = (map.distance(WorldPoint::new(x, y + eps))
                - map.distance(WorldPoint::new(x, y - eps)))
                / (2.0 * eps);

            assert!((gx - fd_x).abs() < 1e-6, "gx {} vs fd {}", gx, fd_x);
            assert!((gy - fd_y).abs() < 1e-6, "gy {} vs fd {}", gy, fd_y);
        }
    }

    #[test]
    fn test_unallocated_reads_saturated() {
        let map = unit_map(2.5);
        assert_eq!(map.distance(WorldPoint::new(1000.0, -1000.0)), 2.5);
        let (d, gx, gy) = map.distance_and_gradient(WorldPoint::new(1000.0, -1000.0));
        assert_eq!(d, 2.5);
        assert_eq!(gx, 0.0);
        assert_eq!(gy, 0.0);
    }

    #[test]
    fn test_field_matches_brute_force() {
        let mut map = DynamicDistanceMap::new(0.5, 8, 3.0).unwrap();
        let obstacles = [
            GridCoord::new(0, 0),
            GridCoord::new(5, 2),
            GridCoord::new(-3, 4),
            GridCoord::new(2, -6),
        ];
        for &o in &obstacles {
            map.add_obstacle(o);
        }
        map.update();

        map.remove_obstacle(GridCoord::new(5, 2));
        map.update();

        let remaining: Vec<GridCoord> = obstacles
            .iter()
            .copied()
            .filter(|&o| o != GridCoord::new(5, 2))
            .collect();

        for x in -12..12 {
            for y in -12..12 {
                let c = GridCoord::new(x, y);
                let brute = remaining
                    .iter()
                    .map(|o| (c.squared_distance(o) as f64).sqrt() * 0.5)
                    .fold(f64::INFINITY, f64::min)
                    .min(3.0);
                let stored = map.cell_distance(c);
                assert!(
                    (stored - brute).abs() < 1e-9,
                    "cell ({}, {}): stored {} brute {}",
                    x,
                    y,
                    stored,
                    brute
                );
            }
        }
    }
}
