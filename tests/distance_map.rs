//! Distance-map scenario tests.
//!
//! Exercises the incremental EDT end to end: exact distances around single
//! and paired obstacles, saturation, and full restoration after removal.

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use vastu_loc::{DynamicDistanceMap, GridCoord, WorldPoint};

#[test]
fn s1_single_obstacle_field() {
    let mut map = DynamicDistanceMap::new(1.0, 32, 10.0).unwrap();
    map.add_obstacle(GridCoord::new(0, 0));
    map.update();

    // Exact Euclidean distances on the grid.
    assert!((map.distance(WorldPoint::new(3.0, 4.0)) - 5.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(0.0, 0.0)) - 0.0).abs() < 1e-9);

    // Beyond the saturation radius everything reads max_distance.
    assert!((map.distance(WorldPoint::new(10.1, 0.0)) - 10.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(-20.0, 5.0)) - 10.0).abs() < 1e-9);

    // Removing the obstacle resets every touched cell.
    map.remove_obstacle(GridCoord::new(0, 0));
    map.update();

    assert!((map.distance(WorldPoint::new(3.0, 4.0)) - 10.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(0.0, 0.0)) - 10.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(1.0, 1.0)) - 10.0).abs() < 1e-9);
}

#[test]
fn s2_two_obstacles_share_the_field() {
    let mut map = DynamicDistanceMap::new(1.0, 32, 10.0).unwrap();
    map.add_obstacle(GridCoord::new(0, 0));
    map.add_obstacle(GridCoord::new(10, 0));
    map.update();

    assert!((map.distance(WorldPoint::new(5.0, 0.0)) - 5.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(4.0, 0.0)) - 4.0).abs() < 1e-9);
    assert!((map.distance(WorldPoint::new(6.0, 0.0)) - 4.0).abs() < 1e-9);
}

#[test]
fn add_remove_round_trip_restores_field() {
    let mut map = DynamicDistanceMap::new(0.5, 16, 4.0).unwrap();

    // A baseline obstacle pattern.
    for x in 0..5 {
        map.add_obstacle(GridCoord::new(x, 0));
    }
    map.update();

    let probes: Vec<GridCoord> = (-10..15)
        .flat_map(|x| (-10..10).map(move |y| GridCoord::new(x, y)))
        .collect();
    let baseline: Vec<f64> = probes.iter().map(|&c| map.cell_distance(c)).collect();

    // Perturb with an extra obstacle, then take it back.
    map.add_obstacle(GridCoord::new(3, 5));
    map.update();
    assert!((map.cell_distance(GridCoord::new(3, 5)) - 0.0).abs() < 1e-12);

    map.remove_obstacle(GridCoord::new(3, 5));
    map.update();

    for (probe, expected) in probes.iter().zip(baseline.iter()) {
        let actual = map.cell_distance(*probe);
        assert!(
            (actual - expected).abs() < 1e-9,
            "cell ({}, {}) changed: {} vs {}",
            probe.x,
            probe.y,
            actual,
            expected
        );
    }
}

#[test]
fn randomized_field_matches_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut map = DynamicDistanceMap::new(0.25, 8, 1.5).unwrap();

    // Random obstacle churn: adds with occasional removals.
    let mut obstacles: Vec<GridCoord> = Vec::new();
    for _ in 0..60 {
        let c = GridCoord::new(rng.gen_range(-20..20), rng.gen_range(-20..20));
        map.add_obstacle(c);
        if !obstacles.contains(&c) {
            obstacles.push(c);
        }
    }
    map.update();

    for _ in 0..20 {
        if obstacles.is_empty() {
            break;
        }
        let i = rng.gen_range(0..obstacles.len());
        let c = obstacles.swap_remove(i);
        map.remove_obstacle(c);
    }
    map.update();

    // Every cell in the arena agrees with the brute-force answer.
    for x in -30..30 {
        for y in -30..30 {
            let c = GridCoord::new(x, y);
            let brute = obstacles
                .iter()
                .map(|o| (c.squared_distance(o) as f64).sqrt() * 0.25)
                .fold(f64::INFINITY, f64::min)
                .min(1.5);
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

#[test]
fn interpolation_is_continuous_along_a_diagonal() {
    let points = common::square_outline((0.0, 0.0), 1.0, 0.1);
    let map = common::field_from_points(0.1, 16, 1.5, &points);

    let mut previous: Option<f64> = None;
    let mut t = -2.0;
    while t <= 2.0 {
        let d = map.distance(WorldPoint::new(t, t * 0.8));
        if let Some(prev) = previous {
            assert!(
                (d - prev).abs() < 0.02,
                "jump of {} at t={}",
                (d - prev).abs(),
                t
            );
        }
        previous = Some(d);
        t += 0.005;
    }
}
