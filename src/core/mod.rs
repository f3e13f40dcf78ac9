//! Core types for the localization engine.
//!
//! All types follow the ROS REP-103 coordinate convention:
//! - **X-axis**: Forward (positive ahead of robot)
//! - **Y-axis**: Left (positive to robot's left)
//! - **Theta**: Counter-clockwise rotation from +X axis (radians)
//!
//! ## Type Categories
//!
//! ### Coordinates
//! - [`GridCoord`]: Integer cell indices for grid access
//! - [`WorldPoint`]: Floating-point world coordinates in meters
//!
//! ### Robot State
//! - [`Pose2D`]: Planar rigid transform (x, y, theta) with SE(2) composition
//!
//! ### Sensing
//! - [`Point3`], [`SensorTransform`], [`PointCloud`]: range-sensor data and
//!   the sensor mounting

mod cloud;
mod point;
mod pose;

pub use cloud::{Point3, PointCloud, SensorTransform};
pub use point::{GridCoord, WorldPoint};
pub use pose::{normalize_angle, Pose2D};
