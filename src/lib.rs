//! # vastu-loc
//!
//! 2D localization for mobile robots with a planar range sensor and wheel
//! odometry: the robot pose is tracked by matching each scan against the
//! distance transform of a persistent occupancy map.
//!
//! ## Overview
//!
//! Four subsystems cooperate:
//!
//! - **Sparse-dense grids** ([`grid`]): fixed-size patches allocated
//!   lazily, backing both map representations.
//! - **Dynamic distance map** ([`grid::DynamicDistanceMap`]): an
//!   incremental Euclidean distance transform with priority-driven
//!   raise/lower propagation.
//! - **NLLS solver** ([`solver`]): Gauss–Newton and Levenberg–Marquardt
//!   over a generic residual functor, with robust M-estimator weights.
//! - **Localizer** ([`localization::Localizer`]): odometry-gated
//!   prediction, distance-field scan matching, and sampled global
//!   relocalization.
//!
//! ## Quick Start
//!
//! ```rust
//! use vastu_loc::{Localizer, LocalizerOptions, Point3, PointCloud, Pose2D};
//!
//! let mut localizer = Localizer::new(LocalizerOptions::default())?;
//!
//! // Build a map from a scan taken at a known pose...
//! let mut cloud = PointCloud::default();
//! cloud.push(Point3::new(2.0, 0.0, 0.0));
//! localizer.insert_scan(&cloud, &Pose2D::default());
//!
//! // ...then feed (cloud, odometry, timestamp) observations.
//! let updated = localizer.update(&cloud, &Pose2D::default(), 0.0);
//! assert!(updated);
//! # Ok::<(), vastu_loc::ConfigError>(())
//! ```
//!
//! ## Coordinate System
//!
//! Uses ROS REP-103 convention:
//! - X: Forward (positive ahead of robot)
//! - Y: Left (positive to robot's left)
//! - Theta: Rotation in radians, CCW positive from +X axis
//!
//! Cell `(cx, cy)` anchors at world `(cx * resolution, cy * resolution)`.
//!
//! ## Concurrency
//!
//! A localizer and its maps belong to one thread; `update` runs to
//! completion and outputs are deterministic for identical inputs and a
//! fixed RNG seed.

#![warn(missing_docs)]

pub mod core;
pub mod grid;
pub mod localization;
pub mod matching;
pub mod solver;

mod error;

pub use crate::core::{normalize_angle, GridCoord, Point3, PointCloud, Pose2D, SensorTransform, WorldPoint};

pub use error::{ConfigError, SolveError};

pub use grid::{
    DistanceCell, DynamicDistanceMap, LineUpdate, OccupancyCell, OccupancyGrid, OccupancyModel,
    Patch, SparseGrid,
};

pub use localization::{Localizer, LocalizerOptions};

pub use matching::MatchSurface;

pub use solver::{solve, Problem, RobustLoss, SolveSummary, SolverOptions, Strategy};
