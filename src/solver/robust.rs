//! Robust M-estimator weights for outlier rejection.
//!
//! A robust loss maps a residual to a multiplicative weight applied to the
//! normal equations at every iteration (iteratively reweighted least
//! squares). Outliers receive weights near zero and stop steering the
//! solution.

use serde::{Deserialize, Serialize};

/// Robust weight function, dispatched by value.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum RobustLoss {
    /// No robustness: standard least squares
    #[default]
    Unit,

    /// Cauchy weight with scale `k`: heavy-tailed, strong outlier rejection
    Cauchy(f64),

    /// Tukey biweight with cutoff `k`: hard zero beyond the cutoff
    Tukey(f64),

    /// Student's t weight with `ν` degrees of freedom
    TStudent(f64),
}

impl RobustLoss {
    /// Compute the IRLS weight for a residual.
    ///
    /// Weights lie in `[0, 1]` for Unit/Cauchy/Tukey; the t-distribution
    /// weight can exceed 1 for small residuals.
    pub fn weight(&self, residual: f64) -> f64 {
        match *self {
            RobustLoss::Unit => 1.0,

            RobustLoss::Cauchy(k) => {
                let u = residual / k;
                1.0 / (1.0 + u * u)
            }

            RobustLoss::Tukey(k) => {
                if residual.abs() <= k {
                    let u = residual / k;
                    let v = 1.0 - u * u;
                    v * v
                } else {
                    0.0
                }
            }

            RobustLoss::TStudent(dof) => (dof + 1.0) / (dof + residual * residual),
        }
    }

    /// Name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            RobustLoss::Unit => "unit",
            RobustLoss::Cauchy(_) => "cauchy",
            RobustLoss::Tukey(_) => "tukey",
            RobustLoss::TStudent(_) => "t-student",
        }
    }
}
