//! High-level entry point for a single retrieval.
//!
//! Builds the [`Bounds`] and an [`Inverter`] with the numerical Jacobian and
//! the default [`InversionConfig`] (with the caller's iteration cap), then
//! runs one inversion. Orchestration layers that retrieve many pixels with
//! one setup should build the [`Inverter`] once and call it directly (or use
//! [`invert_batch`](crate::inversion::batch::invert_batch)).
use crate::inversion::{
    bounds::Bounds,
    engine::{InversionOutcome, Inverter, RetrievalRequest},
    errors::InvResult,
    forward::ForwardModel,
    options::InversionConfig,
    types::StateVec,
};

/// Invert one observation with the numerical Jacobian.
///
/// # Behavior
/// - Validates `lower` / `upper` via [`Bounds::new`].
/// - Validates `max_iter > 0`.
/// - Delegates to [`Inverter::invert`].
///
/// # Parameters
/// - `model`: forward model `f(x, p)`.
/// - `lower`, `upper`: state bounds, length `n`.
/// - `request`: observation, parameters, prior, covariances, method, output.
/// - `max_iter`: iteration cap.
///
/// # Errors
/// - Bounds or iteration-cap validation errors.
/// - Everything [`Inverter::invert`] can return.
///
/// # Example
/// ```rust
/// use ndarray::{Array1, array};
/// use oe_retrieval::inversion::prelude::*;
///
/// let model = LinearModel::through_origin(array![[1.0], [2.0]]);
/// let request = RetrievalRequest::new(
///     array![4.0, 8.0],
///     Array1::zeros(0),
///     array![10.0],
///     array![[0.01, 0.0], [0.0, 0.01]],
///     array![[1.0]],
/// )
/// .with_method(Method::Newton);
///
/// let out = invert(&model, array![0.0], array![100.0], &request, 20)?;
/// assert!(out.converged);
/// assert!((out.state[0] - 4.0).abs() < 1e-6);
/// # Ok::<(), InversionError>(())
/// ```
pub fn invert<F: ForwardModel + ?Sized>(
    model: &F, lower: StateVec, upper: StateVec, request: &RetrievalRequest, max_iter: usize,
) -> InvResult<InversionOutcome> {
    let bounds = Bounds::new(lower, upper)?;
    let config = InversionConfig::default().with_max_iter(max_iter)?;
    Inverter::new(model, bounds, config)?.invert(request)
}
