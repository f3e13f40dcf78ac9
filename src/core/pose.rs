//! Planar rigid transforms (SE(2)).

use serde::{Deserialize, Serialize};

use super::point::WorldPoint;

/// Robot pose in world coordinates (x, y, theta).
///
/// Coordinate system: ROS REP-103
/// - X: Forward (positive ahead of robot)
/// - Y: Left (positive to robot's left)
/// - Theta: Rotation angle in radians, CCW positive from +X axis
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize)]
pub struct Pose2D {
    /// X position in meters
    pub x: f64,
    /// Y position in meters
    pub y: f64,
    /// Orientation in radians (CCW positive from +X)
    pub theta: f64,
}

impl Pose2D {
    /// Create a new pose.
    #[inline]
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Build a pose from a 3-vector state `[x, y, theta]`.
    #[inline]
    pub fn from_state(state: [f64; 3]) -> Self {
        Self::new(state[0], state[1], state[2])
    }

    /// The pose as a 3-vector state `[x, y, theta]`, as consumed by the solver.
    #[inline]
    pub fn state(&self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }

    /// Get the position as a WorldPoint.
    #[inline]
    pub fn position(&self) -> WorldPoint {
        WorldPoint::new(self.x, self.y)
    }

    /// Norm of the translational component.
    #[inline]
    pub fn xy_norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Transform a point from this pose's frame to the world frame.
    #[inline]
    pub fn transform_point(&self, local: WorldPoint) -> WorldPoint {
        let cos_t = self.theta.cos();
        let sin_t = self.theta.sin();

        WorldPoint::new(
            self.x + local.x * cos_t - local.y * sin_t,
            self.y + local.x * sin_t + local.y * cos_t,
        )
    }

    /// Transform a point from the world frame into this pose's frame.
    #[inline]
    pub fn inverse_transform_point(&self, world: WorldPoint) -> WorldPoint {
        let cos_t = self.theta.cos();
        let sin_t = self.theta.sin();

        let dx = world.x - self.x;
        let dy = world.y - self.y;

        WorldPoint::new(dx * cos_t + dy * sin_t, -dx * sin_t + dy * cos_t)
    }

    /// Compose two poses: `self ∘ other`, applying other's transform in
    /// self's frame.
    #[inline]
    pub fn compose(&self, other: &Pose2D) -> Pose2D {
        let transformed = self.transform_point(other.position());
        Pose2D::new(
            transformed.x,
            transformed.y,
            normalize_angle(self.theta + other.theta),
        )
    }

    /// Inverse of this pose.
    #[inline]
    pub fn inverse(&self) -> Pose2D {
        let cos_t = self.theta.cos();
        let sin_t = self.theta.sin();

        Pose2D::new(
            -self.x * cos_t - self.y * sin_t,
            self.x * sin_t - self.y * cos_t,
            -self.theta,
        )
    }

    /// Relative transform from this pose to `other`: `self⁻¹ ∘ other`.
    ///
    /// For two consecutive odometry readings this is the motion expressed in
    /// the frame of the first reading, suitable for right-composition onto a
    /// pose estimate.
    #[inline]
    pub fn between(&self, other: &Pose2D) -> Pose2D {
        self.inverse().compose(other)
    }

    /// Angular difference to another pose, normalized to (−π, π].
    #[inline]
    pub fn angle_diff(&self, other: &Pose2D) -> f64 {
        normalize_angle(other.theta - self.theta)
    }
}

impl PartialEq for Pose2D {
    fn eq(&self, other: &Self) -> bool {
        (self.x - other.x).abs() < 1e-9
            && (self.y - other.y).abs() < 1e-9
            && normalize_angle(self.theta - other.theta).abs() < 1e-9
    }
}

/// Normalize an angle to (−π, π].
#[inline]
pub fn normalize_angle(angle: f64) -> f64 {
    let mut a = angle;
    while a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    }
    while a <= -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    a
}
