//! inversion::forward — collaborator interfaces and the residual function.
//!
//! Purpose
//! -------
//! Define the capabilities the engine consumes from the outside world: a
//! forward model `f(x, p) → y` and, optionally, an analytic Jacobian
//! `K(x, p)`. Wrap the forward model into the bounded [`ResidualFunction`]
//! that every other component evaluates.
//!
//! Key behaviors
//! -------------
//! - [`ForwardModel`] / [`JacobianModel`] traits with blanket impls for
//!   plain closures; lookup-table interpolators and test stubs plug in the
//!   same way.
//! - [`LinearModel`]: an exact `y = A·x + b` model implementing both
//!   capabilities.
//! - [`ResidualFunction`]: `f(clip(x), p)` and `f(clip(x), p) − y`, with the
//!   simulated output checked for length and finiteness.
//!
//! Invariants & assumptions
//! ------------------------
//! - The forward model is never evaluated outside the bounds: the residual
//!   function clips every state before calling it.
//! - Collaborators are shared read-only across concurrent retrievals, hence
//!   the `Send + Sync` supertraits.
//!
//! Conventions
//! -----------
//! - Collaborator failures are reported as `InversionError::ForwardModel`
//!   (see [`crate::inversion::errors::InversionError::model`]); they are
//!   fatal to the call.
//!
//! Testing notes
//! -------------
//! - Unit tests cover clipping before evaluation, difference against an
//!   observation, output validation, and the linear model.
use crate::inversion::{
    bounds::Bounds,
    errors::InvResult,
    types::{Jacobian, MeasVec, ParamVec, StateVec},
    validation::{validate_len, validate_measurement},
};

/// Forward model: simulate a measurement vector from a state.
///
/// Implementations must be pure with respect to `state`/`params`; the
/// engine may call them from many threads at once.
pub trait ForwardModel: Send + Sync {
    fn evaluate(&self, state: &StateVec, params: &ParamVec) -> InvResult<MeasVec>;
}

impl<F> ForwardModel for F
where
    F: Fn(&StateVec, &ParamVec) -> InvResult<MeasVec> + Send + Sync,
{
    fn evaluate(&self, state: &StateVec, params: &ParamVec) -> InvResult<MeasVec> {
        self(state, params)
    }
}

/// Analytic (or precomputed) Jacobian `K = ∂f/∂x`, shape `m × n`.
pub trait JacobianModel: Send + Sync {
    fn jacobian(&self, state: &StateVec, params: &ParamVec) -> InvResult<Jacobian>;
}

impl<F> JacobianModel for F
where
    F: Fn(&StateVec, &ParamVec) -> InvResult<Jacobian> + Send + Sync,
{
    fn jacobian(&self, state: &StateVec, params: &ParamVec) -> InvResult<Jacobian> {
        self(state, params)
    }
}

/// LinearModel — exact linear forward model `y = A·x + b`.
///
/// The parameter vector is ignored. Its Jacobian is `A` everywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    matrix: Jacobian,
    offset: MeasVec,
}

impl LinearModel {
    /// Build `y = A·x + b`.
    ///
    /// # Errors
    /// `InversionError::DimensionMismatch` when `offset.len() != A.nrows()`.
    pub fn new(matrix: Jacobian, offset: MeasVec) -> InvResult<Self> {
        validate_len("linear model offset", offset.len(), matrix.nrows())?;
        Ok(Self { matrix, offset })
    }

    /// Build `y = A·x`.
    pub fn through_origin(matrix: Jacobian) -> Self {
        let offset = MeasVec::zeros(matrix.nrows());
        Self { matrix, offset }
    }

    pub fn matrix(&self) -> &Jacobian {
        &self.matrix
    }
}

impl ForwardModel for LinearModel {
    fn evaluate(&self, state: &StateVec, _params: &ParamVec) -> InvResult<MeasVec> {
        validate_len("state", state.len(), self.matrix.ncols())?;
        Ok(self.matrix.dot(state) + &self.offset)
    }
}

impl JacobianModel for LinearModel {
    fn jacobian(&self, state: &StateVec, _params: &ParamVec) -> InvResult<Jacobian> {
        validate_len("state", state.len(), self.matrix.ncols())?;
        Ok(self.matrix.clone())
    }
}

/// ResidualFunction — a forward model evaluated on bounded states.
///
/// Fields
/// ------
/// - `model`: the collaborator forward model.
/// - `bounds`: state bounds applied before every evaluation.
/// - `params`: fixed auxiliary inputs passed through unchanged.
/// - `m`: expected measurement dimension.
pub struct ResidualFunction<'a, F: ForwardModel + ?Sized> {
    model: &'a F,
    bounds: &'a Bounds,
    params: &'a ParamVec,
    m: usize,
}

impl<'a, F: ForwardModel + ?Sized> ResidualFunction<'a, F> {
    pub fn new(model: &'a F, bounds: &'a Bounds, params: &'a ParamVec, m: usize) -> Self {
        Self { model, bounds, params, m }
    }

    pub fn bounds(&self) -> &'a Bounds {
        self.bounds
    }

    pub fn params(&self) -> &'a ParamVec {
        self.params
    }

    pub fn measurement_dim(&self) -> usize {
        self.m
    }

    /// `f(clip(x), p)`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `state` does not match the bounds.
    /// - Any error raised by the forward model.
    /// - `DimensionMismatch` / `NonFiniteValue` if the simulated vector is
    ///   not finite with length `m`.
    pub fn evaluate(&self, state: &StateVec) -> InvResult<MeasVec> {
        let clipped = self.bounds.clip(state)?;
        let simulated = self.model.evaluate(&clipped, self.params)?;
        validate_measurement(&simulated, self.m)?;
        Ok(simulated)
    }

    /// `f(clip(x), p) − y`.
    pub fn difference(&self, state: &StateVec, observed: &MeasVec) -> InvResult<MeasVec> {
        validate_len("observed measurement", observed.len(), self.m)?;
        Ok(self.evaluate(state)? - observed)
    }
}
