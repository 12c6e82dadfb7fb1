//! inversion::jacobian — numerical and analytic Jacobian providers.
//!
//! Purpose
//! -------
//! Produce the `m × n` sensitivity matrix `K = ∂f/∂x` at the current state,
//! either by central finite differences on the bounded residual function or
//! by delegating to an externally supplied [`JacobianModel`].
//!
//! Key behaviors
//! -------------
//! - [`NumericalJacobian`] perturbs component `i` by
//!   `δᵢ = (upperᵢ − lowerᵢ) · delta_fraction` and sets column `i` to
//!   `(f(x + δᵢeᵢ) − f(x − δᵢeᵢ)) / (2δᵢ)`.
//! - Both probes go through [`ResidualFunction::evaluate`] and are therefore
//!   clipped independently. Near a bound the estimate degrades to a
//!   one-sided difference; this is accepted, not reported.
//! - [`JacobianProvider`] lets the engine treat both variants uniformly and
//!   validates whatever they return.
//!
//! Invariants & assumptions
//! ------------------------
//! - The forward model is never called with a probe outside the bounds.
//! - Returned Jacobians are finite with shape `m × n`.
//!
//! Testing notes
//! -------------
//! - Unit tests compare the central difference against an exact derivative,
//!   probe at an upper bound with a stub that asserts in-bounds input, and
//!   check validation of analytic Jacobians.
use crate::inversion::{
    bounds::Bounds,
    errors::InvResult,
    forward::{ForwardModel, JacobianModel, ResidualFunction},
    types::{DEFAULT_DELTA_FRACTION, Jacobian, StateVec},
    validation::{validate_jacobian, validate_len, verify_delta_fraction},
};

/// NumericalJacobian — central-difference estimator scaled by the bound span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericalJacobian {
    delta_fraction: f64,
}

impl NumericalJacobian {
    /// Construct an estimator with a validated step fraction in `(0, 0.5]`.
    ///
    /// # Errors
    /// [`InversionError::InvalidDeltaFraction`](crate::inversion::errors::InversionError::InvalidDeltaFraction)
    /// on an out-of-range fraction.
    pub fn new(delta_fraction: f64) -> InvResult<Self> {
        verify_delta_fraction(delta_fraction)?;
        Ok(Self { delta_fraction })
    }

    pub fn delta_fraction(&self) -> f64 {
        self.delta_fraction
    }

    /// Per-component probe offsets `δ = (upper − lower) · delta_fraction`.
    pub fn deltas(&self, bounds: &Bounds) -> StateVec {
        bounds.span() * self.delta_fraction
    }

    /// evaluate — central-difference Jacobian at `state`.
    ///
    /// Parameters
    /// ----------
    /// - `residual`: `&ResidualFunction<F>`
    ///   Bounded forward model; supplies the bounds, the parameters, and the
    ///   expected measurement dimension `m`.
    /// - `state`: `&StateVec`
    ///   Point of evaluation, length `n`.
    ///
    /// Returns
    /// -------
    /// `InvResult<Jacobian>`
    ///   An `m × n` matrix whose column `i` is the central difference along
    ///   component `i`.
    ///
    /// Errors
    /// ------
    /// - `DimensionMismatch` if `state` does not match the bounds.
    /// - Any forward-model error or invalid forward-model output raised by a
    ///   probe evaluation.
    ///
    /// Notes
    /// -----
    /// - The divisor is always `2δᵢ`, also when a probe was clipped onto a
    ///   bound.
    /// - Costs `2n` forward-model evaluations.
    pub fn evaluate<F: ForwardModel + ?Sized>(
        &self, residual: &ResidualFunction<'_, F>, state: &StateVec,
    ) -> InvResult<Jacobian> {
        let bounds = residual.bounds();
        let n = bounds.dim();
        validate_len("state", state.len(), n)?;

        let deltas = self.deltas(bounds);
        let mut jacobian = Jacobian::zeros((residual.measurement_dim(), n));
        for (i, &delta) in deltas.iter().enumerate() {
            let mut plus = state.clone();
            let mut minus = state.clone();
            plus[i] += delta;
            minus[i] -= delta;

            let f_plus = residual.evaluate(&plus)?;
            let f_minus = residual.evaluate(&minus)?;
            jacobian.column_mut(i).assign(&((f_plus - f_minus) / (2.0 * delta)));
        }
        Ok(jacobian)
    }
}

impl Default for NumericalJacobian {
    fn default() -> Self {
        Self { delta_fraction: DEFAULT_DELTA_FRACTION }
    }
}

/// JacobianProvider — where the engine gets `K` from.
///
/// - `Numerical`: central differences on the residual function.
/// - `Analytic`: an external [`JacobianModel`], evaluated at the clipped
///   state.
#[derive(Clone, Copy)]
pub enum JacobianProvider<'a> {
    Numerical(NumericalJacobian),
    Analytic(&'a dyn JacobianModel),
}

impl JacobianProvider<'_> {
    /// Evaluate `K` at `state` and validate its shape and entries.
    ///
    /// # Errors
    /// - Collaborator errors from the forward model or analytic Jacobian.
    /// - `DimensionMismatch` / `NonFiniteValue` when the result is not a
    ///   finite `m × n` matrix.
    pub fn evaluate<F: ForwardModel + ?Sized>(
        &self, residual: &ResidualFunction<'_, F>, state: &StateVec,
    ) -> InvResult<Jacobian> {
        let jacobian = match self {
            JacobianProvider::Numerical(numerical) => numerical.evaluate(residual, state)?,
            JacobianProvider::Analytic(model) => {
                let clipped = residual.bounds().clip(state)?;
                model.jacobian(&clipped, residual.params())?
            }
        };
        validate_jacobian(&jacobian, residual.measurement_dim(), residual.bounds().dim())?;
        Ok(jacobian)
    }

    pub fn is_analytic(&self) -> bool {
        matches!(self, JacobianProvider::Analytic(_))
    }
}

impl std::fmt::Debug for JacobianProvider<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JacobianProvider::Numerical(numerical) => f.debug_tuple("Numerical").field(numerical).finish(),
            JacobianProvider::Analytic(_) => f.write_str("Analytic(..)"),
        }
    }
}
