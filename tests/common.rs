//! Shared builders for the integration tests.

#![allow(dead_code)]

use vastu_loc::{DynamicDistanceMap, OccupancyGrid, Point3, PointCloud, Pose2D, WorldPoint};

/// Points along the outline of an axis-aligned square, in world
/// coordinates.
pub fn square_outline(center: (f64, f64), half: f64, step: f64) -> Vec<(f64, f64)> {
    let mut points = Vec::new();
    let n = ((2.0 * half) / step).round() as usize;
    for i in 0..n {
        let t = -half + i as f64 * step;
        points.push((center.0 + t, center.1 - half)); // south
        points.push((center.0 + half, center.1 + t)); // east
        points.push((center.0 - t, center.1 + half)); // north
        points.push((center.0 - half, center.1 - t)); // west
    }
    points
}

/// Points along a straight segment, endpoints inclusive.
pub fn segment(from: (f64, f64), to: (f64, f64), step: f64) -> Vec<(f64, f64)> {
    let dx = to.0 - from.0;
    let dy = to.1 - from.1;
    let length = (dx * dx + dy * dy).sqrt();
    let n = (length / step).ceil() as usize;
    (0..=n)
        .map(|i| {
            let t = i as f64 / n as f64;
            (from.0 + t * dx, from.1 + t * dy)
        })
        .collect()
}

/// Outline of an L-shaped room: the unit of asymmetry for the
/// relocalization scenarios.
///
/// Polygon (0,0) → (10,0) → (10,6) → (5,6) → (5,10) → (0,10) → (0,0).
pub fn l_room_outline(step: f64) -> Vec<(f64, f64)> {
    let corners = [
        (0.0, 0.0),
        (10.0, 0.0),
        (10.0, 6.0),
        (5.0, 6.0),
        (5.0, 10.0),
        (0.0, 10.0),
    ];
    let mut points = Vec::new();
    for i in 0..corners.len() {
        let from = corners[i];
        let to = corners[(i + 1) % corners.len()];
        let side = segment(from, to, step);
        // Drop the duplicated corner point.
        points.extend_from_slice(&side[..side.len() - 1]);
    }
    points
}

/// Whether a point lies inside the L-shaped room with a safety margin.
pub fn l_room_contains(x: f64, y: f64, margin: f64) -> bool {
    let inside_full = x > margin && x < 10.0 - margin && y > margin && y < 10.0 - margin;
    let in_notch = x > 5.0 - margin && y > 6.0 - margin;
    inside_full && !in_notch
}

/// A cloud whose body-frame points are the given world points as seen from
/// `pose` (an idealized scan without occlusion).
pub fn cloud_seen_from(pose: &Pose2D, world_points: &[(f64, f64)]) -> PointCloud {
    let mut cloud = PointCloud::default();
    for &(x, y) in world_points {
        let body = pose.inverse_transform_point(WorldPoint::new(x, y));
        cloud.push(Point3::new(body.x, body.y, 0.0));
    }
    cloud
}

/// Distance map with obstacles registered at the given world points.
pub fn field_from_points(
    resolution: f64,
    patch_size: usize,
    max_distance: f64,
    world_points: &[(f64, f64)],
) -> DynamicDistanceMap {
    let mut field = DynamicDistanceMap::new(resolution, patch_size, max_distance).unwrap();
    for &(x, y) in world_points {
        let cell = field.cell_of(WorldPoint::new(x, y));
        field.add_obstacle(cell);
    }
    field.update();
    field
}

/// Register the given world points as occupied cells.
pub fn occupy_points(map: &mut OccupancyGrid, world_points: &[(f64, f64)]) {
    for &(x, y) in world_points {
        map.set_occupied(WorldPoint::new(x, y));
    }
}
