//! Range-sensor point clouds.
//!
//! A [`PointCloud`] is an ordered sequence of 3D points in the sensor frame
//! together with the rigid sensor-to-body transform. The localizer works in
//! the plane, so the z component of the points is carried but ignored by the
//! matcher. Non-finite points must be filtered by the producer.

use serde::{Deserialize, Serialize};

use super::point::WorldPoint;

/// A 3D point in the sensor frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    /// X coordinate in meters
    pub x: f64,
    /// Y coordinate in meters
    pub y: f64,
    /// Z coordinate in meters (ignored in 2D use)
    pub z: f64,
}

impl Point3 {
    /// Create a new point.
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Rigid transform from the sensor frame to the robot body frame.
///
/// Stored as a rotation matrix plus a translation, the row-major equivalent
/// of the upper 3×4 of a homogeneous 4×4 transform.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SensorTransform {
    /// Row-major 3×3 rotation
    pub rotation: [[f64; 3]; 3],
    /// Translation in meters
    pub translation: [f64; 3],
}

impl SensorTransform {
    /// The identity transform (sensor frame coincides with the body frame).
    pub fn identity() -> Self {
        Self {
            rotation: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
            translation: [0.0, 0.0, 0.0],
        }
    }

    /// A planar mounting: offset `(x, y)` and yaw about the body z axis.
    pub fn from_planar(x: f64, y: f64, yaw: f64) -> Self {
        let (sin_y, cos_y) = yaw.sin_cos();
        Self {
            rotation: [
                [cos_y, -sin_y, 0.0],
                [sin_y, cos_y, 0.0],
                [0.0, 0.0, 1.0],
            ],
            translation: [x, y, 0.0],
        }
    }

    /// Apply the transform to a point.
    #[inline]
    pub fn apply(&self, p: &Point3) -> Point3 {
        let r = &self.rotation;
        let t = &self.translation;
        Point3::new(
            r[0][0] * p.x + r[0][1] * p.y + r[0][2] * p.z + t[0],
            r[1][0] * p.x + r[1][1] * p.y + r[1][2] * p.z + t[1],
            r[2][0] * p.x + r[2][1] * p.y + r[2][2] * p.z + t[2],
        )
    }

    /// Planar projection of the sensor origin in the body frame.
    #[inline]
    pub fn origin_2d(&self) -> WorldPoint {
        WorldPoint::new(self.translation[0], self.translation[1])
    }
}

impl Default for SensorTransform {
    fn default() -> Self {
        Self::identity()
    }
}

/// An ordered point cloud with its sensor-to-body transform.
///
/// The cloud is owned by the caller; the scan matcher borrows it only for
/// the duration of a solve.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PointCloud {
    /// Points in the sensor frame, in scan order
    pub points: Vec<Point3>,
    /// Rigid transform from the sensor frame to the body frame
    pub sensor_to_body: SensorTransform,
}

impl PointCloud {
    /// Create an empty cloud with the given sensor mounting.
    pub fn new(sensor_to_body: SensorTransform) -> Self {
        Self {
            points: Vec::new(),
            sensor_to_body,
        }
    }

    /// Number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the cloud has no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Append a point in the sensor frame.
    #[inline]
    pub fn push(&mut self, p: Point3) {
        self.points.push(p);
    }

    /// Iterate the points projected into the body frame plane.
    pub fn body_points_2d(&self) -> impl Iterator<Item = WorldPoint> + '_ {
        self.points.iter().map(move |p| {
            let q = self.sensor_to_body.apply(p);
            WorldPoint::new(q.x, q.y)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    #[test]
    fn test_identity_transform() {
        let t = SensorTransform::identity();
        let p = Point3::new(1.0, 2.0, 3.0);
        assert_eq!(t.apply(&p), p);
    }

    #[test]
    fn test_planar_mounting() {
        // Sensor mounted 10cm behind the body origin, rotated 90° CCW.
        let t = SensorTransform::from_planar(-0.1, 0.0, FRAC_PI_2);
        let p = Point3::new(1.0, 0.0, 0.0);
        let q = t.apply(&p);

        assert!((q.x - (-0.1)).abs() < 1e-12);
        assert!((q.y - 1.0).abs() < 1e-12);
        assert!(q.z.abs() < 1e-12);
    }

    #[test]
    fn test_body_points_projection() {
        let mut cloud = PointCloud::new(SensorTransform::from_planar(0.5, 0.0, 0.0));
        cloud.push(Point3::new(1.0, -2.0, 0.7));

        let projected: Vec<WorldPoint> = cloud.body_points_2d().collect();
        assert_eq!(projected.len(), 1);
        assert!((projected[0].x - 1.5).abs() < 1e-12);
        assert!((projected[0].y - (-2.0)).abs() < 1e-12);
    }
}
