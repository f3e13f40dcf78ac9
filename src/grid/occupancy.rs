//! Occupancy grid over the sparse container.
//!
//! Every cell carries fixed-point log-odds plus hit/visit counters; the
//! update-rule variants share this layout and the ray traversal, differing
//! only in how an observation changes a cell:
//!
//! - **Simple**: a tri-state that latches directly to occupied or free.
//! - **Frequency**: classifies by the hit/visit ratio.
//! - **Probabilistic**: accumulates clamped log-odds increments.

use serde::{Deserialize, Serialize};

use crate::core::{GridCoord, WorldPoint};
use crate::error::ConfigError;

use super::container::SparseGrid;
use super::raycast::BresenhamLine;

/// Log-odds fixed point scale: stored value is `ln(p / (1-p)) * 100`.
const L_SATURATED: i16 = 200;
const L_OCCUPIED_THRESHOLD: i16 = 50;
const L_FREE_THRESHOLD: i16 = -50;

/// A single occupancy cell.
///
/// `visits == 0` means the cell has never been observed.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct OccupancyCell {
    /// Fixed-point log-odds of occupancy (×100)
    pub log_odds: i16,
    /// Number of observations that hit an obstacle in this cell
    pub hits: u16,
    /// Total number of observations of this cell
    pub visits: u16,
}

/// Cell update rule, dispatched by value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OccupancyModel {
    /// Latching tri-state occupancy
    #[default]
    Simple,
    /// Hit/visit frequency counting; occupied when the ratio reaches the
    /// threshold
    Frequency {
        /// Hit ratio at and above which a cell counts as occupied
        occupied_ratio: f64,
    },
    /// Clamped log-odds accumulation
    Probabilistic {
        /// Log-odds increment for a hit (×100)
        l_hit: i16,
        /// Log-odds increment for a miss (×100, negative)
        l_miss: i16,
    },
}

/// Result of carving one ray into the map.
///
/// Transitions are reported so obstacle bookkeeping (the distance map) can
/// follow occupancy changes.
#[derive(Clone, Debug, Default)]
pub struct LineUpdate {
    /// Endpoint cell, if it newly became occupied
    pub newly_occupied: Option<GridCoord>,
    /// Cells along the ray that stopped being occupied
    pub newly_freed: Vec<GridCoord>,
}

/// Occupancy map backed by a [`SparseGrid`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OccupancyGrid {
    grid: SparseGrid<OccupancyCell>,
    model: OccupancyModel,
}

impl OccupancyGrid {
    /// Create an empty occupancy map.
    pub fn new(
        resolution: f64,
        patch_side: usize,
        model: OccupancyModel,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            grid: SparseGrid::new(resolution, patch_side)?,
            model,
        })
    }

    /// Cell size in meters.
    #[inline]
    pub fn resolution(&self) -> f64 {
        self.grid.resolution()
    }

    /// The update-rule variant in use.
    #[inline]
    pub fn model(&self) -> OccupancyModel {
        self.model
    }

    /// Cell containing a world point.
    #[inline]
    pub fn cell_of(&self, p: WorldPoint) -> GridCoord {
        self.grid.cell_of(p)
    }

    /// Axis-aligned bounds of the observed region, `None` while empty.
    pub fn bounds(&self) -> Option<(WorldPoint, WorldPoint)> {
        self.grid.bounds()
    }

    /// Number of allocated patches.
    #[inline]
    pub fn patch_count(&self) -> usize {
        self.grid.patch_count()
    }

    /// Borrow the backing grid (patch-wise iteration for persistence).
    #[inline]
    pub fn grid(&self) -> &SparseGrid<OccupancyCell> {
        &self.grid
    }

    // === Classification ===

    /// Whether the cell at a world point is classified free.
    #[inline]
    pub fn is_free(&self, p: WorldPoint) -> bool {
        self.is_free_cell(self.grid.cell_of(p))
    }

    /// Whether the cell at a world point is classified occupied.
    #[inline]
    pub fn is_occupied(&self, p: WorldPoint) -> bool {
        self.is_occupied_cell(self.grid.cell_of(p))
    }

    /// Whether the cell at a world point has never been observed.
    #[inline]
    pub fn is_unknown(&self, p: WorldPoint) -> bool {
        self.grid.get_world(p).visits == 0
    }

    /// Whether a cell is classified free.
    pub fn is_free_cell(&self, c: GridCoord) -> bool {
        let cell = self.grid.get(c);
        if cell.visits == 0 {
            return false;
        }
        match self.model {
            OccupancyModel::Simple | OccupancyModel::Probabilistic { .. } => {
                cell.log_odds < L_FREE_THRESHOLD
            }
            OccupancyModel::Frequency { occupied_ratio } => {
                (cell.hits as f64) < occupied_ratio * cell.visits as f64
            }
        }
    }

    /// Whether a cell is classified occupied.
    pub fn is_occupied_cell(&self, c: GridCoord) -> bool {
        let cell = self.grid.get(c);
        if cell.visits == 0 {
            return false;
        }
        match self.model {
            OccupancyModel::Simple | OccupancyModel::Probabilistic { .. } => {
                cell.log_odds > L_OCCUPIED_THRESHOLD
            }
            OccupancyModel::Frequency { occupied_ratio } => {
                cell.hits as f64 >= occupied_ratio * cell.visits as f64
            }
        }
    }

    // === Updates ===

    /// Record an obstacle observation at a world point.
    ///
    /// Returns `true` if the cell transitioned into the occupied class.
    pub fn set_occupied(&mut self, p: WorldPoint) -> bool {
        let c = self.grid.cell_of(p);
        self.set_occupied_cell(c)
    }

    /// Record a free-space observation at a world point.
    ///
    /// Returns `true` if the cell transitioned out of the occupied class.
    pub fn set_free(&mut self, p: WorldPoint) -> bool {
        let c = self.grid.cell_of(p);
        self.set_free_cell(c)
    }

    /// Record an obstacle observation at a cell.
    pub fn set_occupied_cell(&mut self, c: GridCoord) -> bool {
        let was_occupied = self.is_occupied_cell(c);
        let model = self.model;
        let cell = self.grid.get_mut(c);

        cell.visits = cell.visits.saturating_add(1);
        cell.hits = cell.hits.saturating_add(1);
        match model {
            OccupancyModel::Simple => cell.log_odds = L_SATURATED,
            OccupancyModel::Probabilistic { l_hit, .. } => {
                cell.log_odds = cell
                    .log_odds
                    .saturating_add(l_hit)
                    .clamp(-L_SATURATED, L_SATURATED);
            }
            OccupancyModel::Frequency { .. } => {}
        }

        !was_occupied && self.is_occupied_cell(c)
    }

    /// Record a free-space observation at a cell.
    pub fn set_free_cell(&mut self, c: GridCoord) -> bool {
        let was_occupied = self.is_occupied_cell(c);
        let model = self.model;
        let cell = self.grid.get_mut(c);

        cell.visits = cell.visits.saturating_add(1);
        match model {
            OccupancyModel::Simple => cell.log_odds = -L_SATURATED,
            OccupancyModel::Probabilistic { l_miss, .. } => {
                cell.log_odds = cell
                    .log_odds
                    .saturating_add(l_miss)
                    .clamp(-L_SATURATED, L_SATURATED);
            }
            OccupancyModel::Frequency { .. } => {}
        }

        was_occupied && !self.is_occupied_cell(c)
    }

    /// Carve a sensor ray from `from` to `to`.
    ///
    /// Every traversed cell before the endpoint is marked free; the endpoint
    /// cell is marked occupied. Transitions are collected so callers can
    /// mirror them into the distance map.
    pub fn update_free_line(&mut self, from: WorldPoint, to: WorldPoint) -> LineUpdate {
        let start = self.grid.cell_of(from);
        let end = self.grid.cell_of(to);

        let mut update = LineUpdate::default();
        for cell in BresenhamLine::new(start, end) {
            if cell == end {
                if self.set_occupied_cell(cell) {
                    update.newly_occupied = Some(cell);
                }
            } else if self.set_free_cell(cell) {
                update.newly_freed.push(cell);
            }
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple_map() -> OccupancyGrid {
        OccupancyGrid::new(1.0, 8, OccupancyModel::Simple).unwrap()
    }

    #[test]
    fn test_unknown_until_observed() {
        let map = simple_map();
        let p = WorldPoint::new(2.5, 2.5);
        assert!(map.is_unknown(p));
        assert!(!map.is_free(p));
        assert!(!map.is_occupied(p));
    }

    #[test]
    fn test_simple_latches() {
        let mut map = simple_map();
        let p = WorldPoint::new(0.5, 0.5);

        assert!(map.set_occupied(p));
        assert!(map.is_occupied(p));
        assert!(!map.is_free(p));

        // Re-marking occupied is not a transition.
        assert!(!map.set_occupied(p));

        // A free observation flips the tri-state.
        assert!(map.set_free(p));
        assert!(map.is_free(p));
        assert!(!map.is_occupied(p));
    }

    #[test]
    fn test_probabilistic_accumulates() {
        let mut map = OccupancyGrid::new(
            1.0,
            8,
            OccupancyModel::Probabilistic {
                l_hit: 40,
                l_miss: -20,
            },
        )
        .unwrap();
        let p = WorldPoint::new(0.0, 0.0);

        // One hit is not enough to cross the occupied threshold.
        assert!(!map.set_occupied(p));
        assert!(!map.is_occupied(p));

        // The second hit crosses it.
        assert!(map.set_occupied(p));
        assert!(map.is_occupied(p));

        // Misses erode the belief back below the threshold.
        map.set_free(p);
        map.set_free(p);
        assert!(!map.is_occupied(p));
    }

    #[test]
    fn test_frequency_ratio() {
        let mut map = OccupancyGrid::new(
            1.0,
            8,
            OccupancyModel::Frequency {
                occupied_ratio: 0.5,
            },
        )
        .unwrap();
        let p = WorldPoint::new(0.0, 0.0);

        map.set_occupied(p);
        assert!(map.is_occupied(p)); // 1/1

        map.set_free(p);
        map.set_free(p);
        assert!(!map.is_occupied(p)); // 1/3
        assert!(map.is_free(p));
    }

    #[test]
    fn test_update_free_line() {
        let mut map = simple_map();
        let update = map.update_free_line(WorldPoint::new(0.5, 0.5), WorldPoint::new(5.5, 0.5));

        assert_eq!(update.newly_occupied, Some(GridCoord::new(5, 0)));
        assert!(update.newly_freed.is_empty());

        for x in 0..5 {
            assert!(map.is_free_cell(GridCoord::new(x, 0)), "cell {} not free", x);
        }
        assert!(map.is_occupied_cell(GridCoord::new(5, 0)));
    }

    #[test]
    fn test_free_line_reports_cleared_obstacles() {
        let mut map = simple_map();
        map.set_occupied(WorldPoint::new(2.5, 0.5));

        let update = map.update_free_line(WorldPoint::new(0.5, 0.5), WorldPoint::new(5.5, 0.5));
        assert_eq!(update.newly_freed, vec![GridCoord::new(2, 0)]);
    }
}
