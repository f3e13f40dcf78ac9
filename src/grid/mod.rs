//! Sparse-dense map storage.
//!
//! A sparse map of dense fixed-size patches backs both representations the
//! localizer needs:
//!
//! - [`OccupancyGrid`]: per-cell occupancy with pluggable update rules
//! - [`DynamicDistanceMap`]: an incremental Euclidean distance transform
//!
//! Both sit on the shared [`SparseGrid`] container, which pages cells into
//! lazily allocated patches and keeps unbounded maps cheap.

mod container;
mod distance;
mod occupancy;
mod patch;
pub mod raycast;

pub use container::SparseGrid;
pub use distance::{DistanceCell, DynamicDistanceMap};
pub use occupancy::{LineUpdate, OccupancyCell, OccupancyGrid, OccupancyModel};
pub use patch::Patch;
