//! Scan-matching localization on a known or incrementally built map.
//!
//! # Pipeline
//!
//! ```text
//! PointCloud + Odometry
//!       │
//!       ▼
//! ┌─────────────────┐
//! │  Motion Gating  │  skip while ‖Δxy‖ and |Δθ| stay small
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Odom Prediction │  pose ← pose ∘ Δ
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ Global Reloc.?  │  sampled coarse recovery when triggered
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Scan Matching  │  minimize distance-field residuals (GN / LM)
//! └────────┬────────┘
//!          │
//!          ▼
//!     updated pose
//! ```
//!
//! The localizer exclusively owns its occupancy and distance maps; the scan
//! matcher borrows the distance field for a single solve. All state lives on
//! the caller's thread, and updates are totally ordered by the caller.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::core::{PointCloud, Pose2D, WorldPoint};
use crate::error::ConfigError;
use crate::grid::{DynamicDistanceMap, OccupancyGrid, OccupancyModel};
use crate::matching::MatchSurface;
use crate::solver::{solve, Problem, RobustLoss, SolverOptions, Strategy};

/// Residual RMSE below which a global-relocalization estimate counts as
/// locked in.
const GLOBAL_LOC_RMSE_LOCK: f64 = 0.15;

/// Candidate poses drawn per global relocalization pass.
const GLOBAL_LOC_SAMPLES: usize = 3000;

/// Redraw budget per candidate while hunting for a free cell.
const GLOBAL_LOC_MAX_REDRAWS: usize = 1000;

/// Localizer configuration.
///
/// Defaults match a typical indoor robot with a 5cm grid.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct LocalizerOptions {
    /// Translation gate in meters: updates are skipped below this motion
    #[serde(default = "default_trans_thresh")]
    pub trans_thresh: f64,

    /// Rotation gate in radians
    #[serde(default = "default_rot_thresh")]
    pub rot_thresh: f64,

    /// Distance-map saturation in meters
    #[serde(default = "default_l2_max")]
    pub l2_max: f64,

    /// Cell size in meters
    #[serde(default = "default_resolution")]
    pub resolution: f64,

    /// Patch edge length in cells
    #[serde(default = "default_patch_size")]
    pub patch_size: usize,

    /// Solver iteration cap
    #[serde(default = "default_max_iter")]
    pub max_iter: usize,

    /// Solver strategy (`"gn"` or `"lm"`)
    #[serde(default)]
    pub strategy: Strategy,

    /// Robust weight applied to scan residuals
    #[serde(default = "default_robust")]
    pub robust: RobustLoss,

    /// Occupancy cell update rule
    #[serde(default)]
    pub occupancy_model: OccupancyModel,

    /// RNG seed for global relocalization sampling
    #[serde(default)]
    pub seed: u64,
}

fn default_trans_thresh() -> f64 {
    0.5
}
fn default_rot_thresh() -> f64 {
    0.5
}
fn default_l2_max() -> f64 {
    1.0
}
fn default_resolution() -> f64 {
    0.05
}
fn default_patch_size() -> usize {
    32
}
fn default_max_iter() -> usize {
    100
}
fn default_robust() -> RobustLoss {
    RobustLoss::Cauchy(0.15)
}

impl Default for LocalizerOptions {
    fn default() -> Self {
        Self {
            trans_thresh: default_trans_thresh(),
            rot_thresh: default_rot_thresh(),
            l2_max: default_l2_max(),
            resolution: default_resolution(),
            patch_size: default_patch_size(),
            max_iter: default_max_iter(),
            strategy: Strategy::default(),
            robust: default_robust(),
            occupancy_model: OccupancyModel::default(),
            seed: 0,
        }
    }
}

impl LocalizerOptions {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.resolution > 0.0) {
            return Err(ConfigError::InvalidResolution(self.resolution));
        }
        if self.patch_size == 0 {
            return Err(ConfigError::InvalidPatchSize(self.patch_size));
        }
        if !(self.l2_max > 0.0) {
            return Err(ConfigError::InvalidMaxDistance(self.l2_max));
        }
        if self.max_iter == 0 {
            return Err(ConfigError::InvalidIterationCap);
        }
        if self.trans_thresh < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.trans_thresh));
        }
        if self.rot_thresh < 0.0 {
            return Err(ConfigError::InvalidThreshold(self.rot_thresh));
        }
        Ok(())
    }
}

/// Scan-matching localizer.
///
/// Consumes a stream of (point cloud, odometry, timestamp) observations and
/// maintains the robot pose against its owned occupancy and distance maps.
pub struct Localizer {
    options: LocalizerOptions,
    solver_options: SolverOptions,

    occupancy: OccupancyGrid,
    distance: DynamicDistanceMap,

    pose: Pose2D,
    odom: Pose2D,
    has_first_scan: bool,
    do_global_localization: bool,

    rng: StdRng,
}

impl Localizer {
    /// Create a localizer with empty maps.
    pub fn new(options: LocalizerOptions) -> Result<Self, ConfigError> {
        options.validate()?;

        let occupancy = OccupancyGrid::new(
            options.resolution,
            options.patch_size,
            options.occupancy_model,
        )?;
        let distance =
            DynamicDistanceMap::new(options.resolution, options.patch_size, options.l2_max)?;

        let solver_options = SolverOptions {
            max_iterations: options.max_iter,
            strategy: options.strategy,
            robust: options.robust,
            ..Default::default()
        };

        Ok(Self {
            options,
            solver_options,
            occupancy,
            distance,
            pose: Pose2D::default(),
            odom: Pose2D::default(),
            has_first_scan: false,
            do_global_localization: false,
            rng: StdRng::seed_from_u64(options.seed),
        })
    }

    /// Current pose estimate.
    #[inline]
    pub fn pose(&self) -> Pose2D {
        self.pose
    }

    /// Overwrite the pose estimate (e.g. from an external initializer).
    pub fn set_pose(&mut self, pose: Pose2D) {
        self.pose = pose;
    }

    /// Whether the first observation has been consumed.
    #[inline]
    pub fn has_first_scan(&self) -> bool {
        self.has_first_scan
    }

    /// Whether a global relocalization pass is pending or unconfirmed.
    #[inline]
    pub fn is_relocalizing(&self) -> bool {
        self.do_global_localization
    }

    /// Borrow the occupancy map.
    #[inline]
    pub fn occupancy(&self) -> &OccupancyGrid {
        &self.occupancy
    }

    /// Mutable occupancy map access, for loading a known map.
    #[inline]
    pub fn occupancy_mut(&mut self) -> &mut OccupancyGrid {
        &mut self.occupancy
    }

    /// Borrow the distance map.
    #[inline]
    pub fn distance_map(&self) -> &DynamicDistanceMap {
        &self.distance
    }

    /// Mutable distance map access, for loading a known map.
    #[inline]
    pub fn distance_map_mut(&mut self) -> &mut DynamicDistanceMap {
        &mut self.distance
    }

    /// Whether an odometry reading has moved past the motion gates.
    ///
    /// Always true before the first observation.
    pub fn enough_motion(&self, odometry: &Pose2D) -> bool {
        if !self.has_first_scan {
            return true;
        }
        let delta = self.odom.between(odometry);
        delta.xy_norm() > self.options.trans_thresh
            || delta.theta.abs() > self.options.rot_thresh
    }

    /// Apply one observation.
    ///
    /// Returns `true` when the pose estimate was updated (including the
    /// first, seeding observation) and `false` when the observation was
    /// gated out or the cloud was empty. The timestamp is used for logging
    /// only.
    pub fn update(&mut self, cloud: &PointCloud, odometry: &Pose2D, timestamp: f64) -> bool {
        if cloud.is_empty() {
            log::debug!("t={:.3}: empty cloud, skipping update", timestamp);
            return false;
        }

        if !self.has_first_scan {
            self.odom = *odometry;
            self.has_first_scan = true;
            return true;
        }

        // 1. Predict from odometry; only continue once the necessary motion
        //    was gathered.
        let delta = self.odom.between(odometry);
        if delta.xy_norm() <= self.options.trans_thresh
            && delta.theta.abs() <= self.options.rot_thresh
        {
            return false;
        }

        self.pose = self.pose.compose(&delta);
        self.odom = *odometry;

        if self.do_global_localization {
            self.global_localization(cloud);
        }

        // 2. Optimize against the distance field.
        let mut surface = MatchSurface::new(&self.distance, cloud, self.pose.state());
        match solve(&self.solver_options, &mut surface) {
            Ok(summary) => {
                log::trace!(
                    "t={:.3}: scan match {} in {} iterations, cost {:.4e} -> {:.4e}",
                    timestamp,
                    if summary.converged {
                        "converged"
                    } else {
                        "exhausted budget"
                    },
                    summary.iterations,
                    summary.initial_cost,
                    summary.final_cost
                );
            }
            Err(err) => {
                // Keep the odometry prediction; the next scan may recover.
                log::warn!("t={:.3}: scan match failed ({}), keeping prediction", timestamp, err);
            }
        }

        if self.do_global_localization {
            let rmse = surface.rmse();
            if rmse < GLOBAL_LOC_RMSE_LOCK {
                log::info!("t={:.3}: global localization locked (rmse {:.3})", timestamp, rmse);
                self.do_global_localization = false;
            }
        }

        self.pose = Pose2D::from_state(surface.state());
        true
    }

    /// Request a global relocalization pass on the next update.
    pub fn trigger_global_localization(&mut self) {
        self.do_global_localization = true;
    }

    /// Coarse pose recovery by uniform sampling over the free space.
    ///
    /// Draws candidate positions uniformly over the occupancy bounds,
    /// accepting the first draw per candidate whose cell is free, with a
    /// heading uniform in (−π, π]. Each candidate is scored by its summed
    /// squared residuals against the distance field, without optimization;
    /// the best one replaces the pose estimate. Deterministic for a fixed
    /// RNG seed.
    pub fn global_localization(&mut self, cloud: &PointCloud) {
        let (min, max) = match self.occupancy.bounds() {
            Some(bounds) => bounds,
            None => {
                log::warn!("global localization requested on an empty map");
                return;
            }
        };
        let diff = max - min;

        let mut best_error = f64::INFINITY;
        let mut best_pose = self.pose;

        for _ in 0..GLOBAL_LOC_SAMPLES {
            let mut position = None;
            for _ in 0..GLOBAL_LOC_MAX_REDRAWS {
                let x = min.x + self.rng.gen::<f64>() * diff.x;
                let y = min.y + self.rng.gen::<f64>() * diff.y;
                if self.occupancy.is_free(WorldPoint::new(x, y)) {
                    position = Some((x, y));
                    break;
                }
            }
            let (x, y) = match position {
                Some(p) => p,
                None => continue,
            };
            let theta = std::f64::consts::PI - self.rng.gen::<f64>() * std::f64::consts::TAU;

            let candidate = Pose2D::new(x, y, theta);
            let surface = MatchSurface::new(&self.distance, cloud, candidate.state());
            let error = surface.squared_error();
            if error < best_error {
                best_error = error;
                best_pose = candidate;
            }
        }

        log::debug!(
            "global localization best candidate ({:.2}, {:.2}, {:.2}) error {:.3e}",
            best_pose.x,
            best_pose.y,
            best_pose.theta,
            best_error
        );
        self.pose = best_pose;
    }

    /// Integrate a scan into the owned maps at a given pose.
    ///
    /// The mapping direction of the data flow: each point is transformed by
    /// the pose, free space is carved from the sensor origin to the point,
    /// the endpoint cell is marked occupied, and occupancy transitions are
    /// mirrored into the distance map before it settles.
    pub fn insert_scan(&mut self, cloud: &PointCloud, pose: &Pose2D) {
        let origin = pose.transform_point(cloud.sensor_to_body.origin_2d());

        for p in cloud.body_points_2d() {
            let end = pose.transform_point(p);
            let line = self.occupancy.update_free_line(origin, end);

            for freed in &line.newly_freed {
                self.distance.remove_obstacle(*freed);
            }
            if let Some(occupied) = line.newly_occupied {
                self.distance.add_obstacle(occupied);
            }
        }

        self.distance.update();
    }
}
