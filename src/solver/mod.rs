//! Nonlinear least-squares solver.
//!
//! Minimizes `Φ(x) = ½ Σ w(rᵢ) rᵢ²` over a [`Problem`]'s SE(2) state, with
//! per-residual robust weights applied as iteratively reweighted least
//! squares. Two strategies are available:
//!
//! - **Gauss–Newton**: solve `H δ = −g` with `H = JᵀWJ`, `g = JᵀWf`, step,
//!   repeat until the step is small.
//! - **Levenberg–Marquardt**: damp the diagonal, accept only
//!   cost-decreasing trial steps, scale the damping up on rejection and
//!   down on acceptance.
//!
//! The linear solve is Cholesky with a single diagonal-jitter retry; in LM a
//! failed factorization escalates the damping instead. All arithmetic is
//! double precision.

mod linalg;
mod problem;
mod robust;

pub use problem::Problem;
pub use robust::RobustLoss;

use serde::{Deserialize, Serialize};

use crate::error::SolveError;
use self::linalg::{cholesky_solve, cholesky_solve_jittered};

/// Iteration strategy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Plain Gauss–Newton steps
    #[default]
    #[serde(rename = "gn")]
    GaussNewton,
    /// Levenberg–Marquardt damping with accept/reject trials
    #[serde(rename = "lm")]
    LevenbergMarquardt,
}

/// Solver configuration.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Iteration budget
    pub max_iterations: usize,
    /// Iteration strategy
    pub strategy: Strategy,
    /// Robust weight applied to every residual
    pub robust: RobustLoss,
    /// Terminate when the step norm drops below this
    pub step_tolerance: f64,
    /// Terminate when the relative cost decrease drops below this (LM)
    pub cost_tolerance: f64,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            strategy: Strategy::GaussNewton,
            robust: RobustLoss::Unit,
            step_tolerance: 1e-8,
            cost_tolerance: 1e-8,
        }
    }
}

/// Outcome of a solve.
#[derive(Clone, Copy, Debug)]
pub struct SolveSummary {
    /// Iterations actually performed
    pub iterations: usize,
    /// Cost `Φ` at the initial state
    pub initial_cost: f64,
    /// Cost `Φ` at the final state
    pub final_cost: f64,
    /// Whether a termination criterion fired within the budget
    pub converged: bool,
}

/// Initial LM damping.
const LM_INITIAL_LAMBDA: f64 = 1e-3;
/// LM damping scale factor.
const LM_LAMBDA_FACTOR: f64 = 10.0;
/// Damping ceiling; reaching it reports a diverged (non-converged) solve.
const LM_MAX_LAMBDA: f64 = 1e7;
const LM_MIN_LAMBDA: f64 = 1e-9;
/// Floor applied to diagonal entries before damping so flat dimensions
/// still receive some stiffness.
const LM_DIAG_FLOOR: f64 = 1e-12;

/// Minimize a problem's cost in place.
///
/// On success the problem's state holds the optimized parameters. A
/// [`SolveError`] leaves the state at its last evaluated value (the initial
/// state if the very first linearization is degenerate); callers treat this
/// as non-fatal and keep their prediction.
pub fn solve<P: Problem>(
    options: &SolverOptions,
    problem: &mut P,
) -> Result<SolveSummary, SolveError> {
    match options.strategy {
        Strategy::GaussNewton => solve_gauss_newton(options, problem),
        Strategy::LevenbergMarquardt => solve_levenberg_marquardt(options, problem),
    }
}

fn solve_gauss_newton<P: Problem>(
    options: &SolverOptions,
    problem: &mut P,
) -> Result<SolveSummary, SolveError> {
    let mut residuals = Vec::with_capacity(problem.residual_count());
    let mut jacobian = Vec::with_capacity(problem.residual_count());

    let mut initial_cost = 0.0;
    let mut converged = false;
    let mut iterations = 0;

    for iter in 0..options.max_iterations {
        iterations = iter + 1;

        let (h, g, current) =
            build_normal_equations(problem, &options.robust, &mut residuals, &mut jacobian)?;
        if iter == 0 {
            initial_cost = current;
        }

        let delta = match cholesky_solve_jittered(&h, &[-g[0], -g[1], -g[2]]) {
            Some(delta) if delta.iter().all(|d| d.is_finite()) => delta,
            _ => {
                log::warn!("gauss-newton: singular normal equations at iteration {}", iter);
                return Err(SolveError::Degenerate);
            }
        };

        problem.apply_step(delta);

        if step_norm(&delta) < options.step_tolerance {
            converged = true;
            break;
        }
    }

    // The last step was applied without re-evaluation; report the cost at
    // the final state.
    problem.eval(&mut residuals, None);
    let final_cost = weighted_cost(&options.robust, &residuals);

    Ok(SolveSummary {
        iterations,
        initial_cost,
        final_cost,
        converged,
    })
}

fn solve_levenberg_marquardt<P: Problem>(
    options: &SolverOptions,
    problem: &mut P,
) -> Result<SolveSummary, SolveError> {
    let mut residuals = Vec::with_capacity(problem.residual_count());
    let mut jacobian = Vec::with_capacity(problem.residual_count());

    let (mut h, mut g, mut cost) =
        build_normal_equations(problem, &options.robust, &mut residuals, &mut jacobian)?;
    let initial_cost = cost;

    let mut lambda = LM_INITIAL_LAMBDA;
    let mut converged = false;
    let mut iterations = 0;

    'outer: for iter in 0..options.max_iterations {
        iterations = iter + 1;

        // Trial loop: escalate damping until a step decreases the cost.
        loop {
            let mut damped = h;
            for i in 0..3 {
                damped[i][i] += lambda * h[i][i].max(LM_DIAG_FLOOR);
            }

            let delta = match cholesky_solve(&damped, &[-g[0], -g[1], -g[2]]) {
                Some(delta) if delta.iter().all(|d| d.is_finite()) => delta,
                _ => {
                    // Singular even when damped: escalate and retry.
                    lambda *= LM_LAMBDA_FACTOR;
                    if lambda > LM_MAX_LAMBDA {
                        log::warn!("levenberg-marquardt: damping exhausted, giving up");
                        break 'outer;
                    }
                    continue;
                }
            };

            let saved = problem.state();
            problem.apply_step(delta);
            problem.eval(&mut residuals, None);
            let trial_cost = weighted_cost(&options.robust, &residuals);

            if trial_cost < cost {
                // Accepted: relax damping and relinearize.
                lambda = (lambda / LM_LAMBDA_FACTOR).max(LM_MIN_LAMBDA);

                let decrease = cost - trial_cost;
                cost = trial_cost;

                if step_norm(&delta) < options.step_tolerance
                    || decrease < options.cost_tolerance * cost.max(f64::MIN_POSITIVE)
                {
                    converged = true;
                    break 'outer;
                }

                let (nh, ng, _) = build_normal_equations(
                    problem,
                    &options.robust,
                    &mut residuals,
                    &mut jacobian,
                )?;
                h = nh;
                g = ng;
                break;
            }

            // Rejected: restore the state and stiffen the damping.
            problem.set_state(saved);

            // A vanishing step that still cannot improve the cost means the
            // state already sits at the minimum.
            if step_norm(&delta) < options.step_tolerance {
                converged = true;
                break 'outer;
            }

            lambda *= LM_LAMBDA_FACTOR;
            if lambda > LM_MAX_LAMBDA {
                log::debug!(
                    "levenberg-marquardt: no acceptable step at cost {:.6e}",
                    cost
                );
                break 'outer;
            }
        }
    }

    Ok(SolveSummary {
        iterations,
        initial_cost,
        final_cost: cost,
        converged,
    })
}

/// Assemble `H = JᵀWJ`, `g = JᵀWf` and the weighted cost at the current
/// state.
fn build_normal_equations<P: Problem>(
    problem: &P,
    robust: &RobustLoss,
    residuals: &mut Vec<f64>,
    jacobian: &mut Vec<[f64; 3]>,
) -> Result<([[f64; 3]; 3], [f64; 3], f64), SolveError> {
    problem.eval(residuals, Some(jacobian));
    if residuals.is_empty() {
        return Err(SolveError::Empty);
    }
    debug_assert_eq!(residuals.len(), jacobian.len());

    let mut h = [[0.0f64; 3]; 3];
    let mut g = [0.0f64; 3];
    let mut cost = 0.0f64;

    for (r, j) in residuals.iter().zip(jacobian.iter()) {
        let w = robust.weight(*r);
        cost += 0.5 * w * r * r;
        for i in 0..3 {
            g[i] += w * j[i] * r;
            for k in 0..3 {
                h[i][k] += w * j[i] * j[k];
            }
        }
    }

    Ok((h, g, cost))
}

#[inline]
fn weighted_cost(robust: &RobustLoss, residuals: &[f64]) -> f64 {
    residuals
        .iter()
        .map(|r| 0.5 * robust.weight(*r) * r * r)
        .sum()
}

#[inline]
fn step_norm(delta: &[f64; 3]) -> f64 {
    (delta[0] * delta[0] + delta[1] * delta[1] + delta[2] * delta[2]).sqrt()
}
