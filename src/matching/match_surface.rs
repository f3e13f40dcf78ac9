//! Scan-to-field residual functor.

use crate::core::{normalize_angle, PointCloud, WorldPoint};
use crate::grid::DynamicDistanceMap;
use crate::solver::Problem;

/// Nonlinear least-squares view of scan matching.
///
/// Each point of the cloud, brought into the body frame once at
/// construction, produces the residual
///
/// ```text
/// rᵢ(x) = D( R(θ) pᵢ + t )
/// ```
///
/// where `D` is the bilinear interpolation of the distance field, `R(θ)` the
/// planar rotation and `t = (x, y)`. The Jacobian row chains the field
/// gradient with the point's pose derivative. Points landing in unallocated
/// regions read the saturated distance with zero gradient, so they carry no
/// direction and are further suppressed by any robust weight.
///
/// The functor borrows the distance field for the duration of one solve; no
/// aliasing outlives the call.
pub struct MatchSurface<'a> {
    field: &'a DynamicDistanceMap,
    /// Cloud points in the body frame plane.
    points: Vec<WorldPoint>,
    state: [f64; 3],
}

impl<'a> MatchSurface<'a> {
    /// Build the functor for one solve.
    ///
    /// `state` is the initial pose estimate `[x, y, θ]`. The cloud's
    /// sensor-to-body transform is applied here, once.
    pub fn new(field: &'a DynamicDistanceMap, cloud: &PointCloud, state: [f64; 3]) -> Self {
        Self {
            field,
            points: cloud.body_points_2d().collect(),
            state,
        }
    }

    /// Root-mean-square residual at the current state.
    ///
    /// Used to decide whether a global-relocalization estimate has locked
    /// in. Returns infinity for clouds too small to normalize.
    pub fn rmse(&self) -> f64 {
        let n = self.points.len();
        if n <= 1 {
            return f64::INFINITY;
        }
        let mut residuals = Vec::with_capacity(n);
        self.eval(&mut residuals, None);
        let sum: f64 = residuals.iter().map(|r| r * r).sum();
        (sum / (n - 1) as f64).sqrt()
    }

    /// Sum of squared residuals at the current state, without Jacobians.
    ///
    /// The scoring primitive of global relocalization.
    pub fn squared_error(&self) -> f64 {
        let mut residuals = Vec::with_capacity(self.points.len());
        self.eval(&mut residuals, None);
        residuals.iter().map(|r| r * r).sum()
    }
}

impl Problem for MatchSurface<'_> {
    fn residual_count(&self) -> usize {
        self.points.len()
    }

    fn eval(&self, residuals: &mut Vec<f64>, jacobian: Option<&mut Vec<[f64; 3]>>) {
        residuals.clear();
        let mut jac = jacobian;
        if let Some(j) = jac.as_mut() {
            j.clear();
        }

        let (sin_t, cos_t) = self.state[2].sin_cos();
        let tx = self.state[0];
        let ty = self.state[1];

        for p in &self.points {
            let qx = tx + p.x * cos_t - p.y * sin_t;
            let qy = ty + p.x * sin_t + p.y * cos_t;

            let (distance, grad_x, grad_y) = self
                .field
                .distance_and_gradient(WorldPoint::new(qx, qy));
            residuals.push(distance);

            if let Some(j) = jac.as_mut() {
                // ∂q/∂θ rotates the body-frame point by 90° plus θ.
                let dqx_dtheta = -p.x * sin_t - p.y * cos_t;
                let dqy_dtheta = p.x * cos_t - p.y * sin_t;
                j.push([
                    grad_x,
                    grad_y,
                    grad_x * dqx_dtheta + grad_y * dqy_dtheta,
                ]);
            }
        }
    }

    fn state(&self) -> [f64; 3] {
        self.state
    }

    fn set_state(&mut self, state: [f64; 3]) {
        self.state = state;
    }

    fn apply_step(&mut self, delta: [f64; 3]) {
        self.state[0] += delta[0];
        self.state[1] += delta[1];
        self.state[2] = normalize_angle(self.state[2] + delta[2]);
    }
}
