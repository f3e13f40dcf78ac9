//! The residual-functor seam between the solver and its cost models.

/// A nonlinear least-squares problem over an SE(2) state.
///
/// Implementors provide residuals and Jacobians at the current state and
/// define how a tangent-space step updates the state. The solver never looks
/// inside the state beyond this contract.
pub trait Problem {
    /// Number of residuals produced by [`eval`](Self::eval).
    fn residual_count(&self) -> usize;

    /// Evaluate residuals at the current state, clearing and filling
    /// `residuals`. When `jacobian` is given, also fill one row
    /// `[∂r/∂x, ∂r/∂y, ∂r/∂θ]` per residual.
    fn eval(&self, residuals: &mut Vec<f64>, jacobian: Option<&mut Vec<[f64; 3]>>);

    /// The current parameter vector `[x, y, θ]`.
    fn state(&self) -> [f64; 3];

    /// Overwrite the parameter vector.
    fn set_state(&mut self, state: [f64; 3]);

    /// Apply a step in the tangent space: `x ⊕ δ`, with the angle wrapped
    /// to (−π, π].
    fn apply_step(&mut self, delta: [f64; 3]);
}
