//! inversion::diagnostics — gain, averaging kernel, cost, and retrieval
//! uncertainty at the terminal state.
//!
//! Purpose
//! -------
//! Quantify how the retrieved state relates to the measurement and the
//! prior once the iteration has stopped. These quantities are optional:
//! callers asking for `OutputMode::Basic` never pay for them.
//!
//! Key behaviors
//! -------------
//! - [`gain`]: `pinv(J)` for both Newton variants, `Ŝ·JᵗSe⁻¹` for OE.
//! - [`averaging_kernel`]: identity for both Newton variants, `G·J` for OE.
//! - [`cost`]: `rᵗr` (Newton), `rᵗSe⁻¹r` (NewtonSe),
//!   `(xa − x)ᵗSa⁻¹(xa − x) + rᵗSe⁻¹r` (OE).
//! - [`retrieval_covariance`]: `(JᵗJ)⁻¹`, `(JᵗSe⁻¹J)⁻¹`, or
//!   `(Sa⁻¹ + JᵗSe⁻¹J)⁻¹` by method.
//! - [`diagnose`]: bundle the above together with the degrees of freedom
//!   for signal, per-component standard deviations, and a χ² p-value of
//!   the cost.
//!
//! Invariants & assumptions
//! ------------------------
//! - Inputs are taken at the terminal state and have been shape-checked by
//!   the engine.
//! - The χ² p-value uses `m` degrees of freedom and is only reported for
//!   covariance-weighted costs (`NewtonSe`, `OE`); an unweighted `rᵗr`
//!   has no reference distribution.
//!
//! Testing notes
//! -------------
//! - Unit tests cover each cost branch, the identity kernel of the Newton
//!   variants, `trace(A)` for OE, and the p-value range.
use crate::inversion::{
    errors::InvResult,
    linalg::{identity, invert, left_pseudo_inverse, quadratic_form, weighted_normal},
    options::Method,
    types::{Covariance, Gain, Jacobian, MeasVec, StateVec},
};
use statrs::distribution::{ChiSquared, ContinuousCDF};

/// Diagnostic quantities at the terminal state.
///
/// - `gain`: `n × m` map from residual to state correction.
/// - `averaging_kernel`: `n × n` sensitivity of the retrieval to the truth.
/// - `cost`: scalar goodness of fit.
/// - `dof_signal`: `trace(averaging_kernel)`.
/// - `retrieval_std`: `sqrt(diag(Ŝ))`.
/// - `cost_p_value`: `P(χ²ₘ > cost)` for `NewtonSe` / `OE`, `None` for `Newton`.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub gain: Gain,
    pub averaging_kernel: Covariance,
    pub cost: f64,
    pub dof_signal: f64,
    pub retrieval_std: StateVec,
    pub cost_p_value: Option<f64>,
}

/// Scalar cost of `method` at `state`.
///
/// `sei` is ignored for `Newton`; `sai` and `prior` only enter for `OE`.
pub fn cost(
    method: Method, residual: &MeasVec, sei: &Covariance, sai: &Covariance, state: &StateVec, prior: &StateVec,
) -> f64 {
    match method {
        Method::Newton => residual.dot(residual),
        Method::NewtonSe => quadratic_form(residual, sei),
        Method::OptimalEstimation => {
            let prior_offset = prior - state;
            quadratic_form(&prior_offset, sai) + quadratic_form(residual, sei)
        }
    }
}

/// Gain matrix of `method`.
///
/// # Errors
/// `SingularMatrix` (`"JᵗJ"`) for the Newton variants.
pub fn gain(method: Method, jacobian: &Jacobian, sei: &Covariance, retrieval_cov: &Covariance) -> InvResult<Gain> {
    match method {
        Method::Newton | Method::NewtonSe => left_pseudo_inverse(jacobian),
        Method::OptimalEstimation => Ok(retrieval_cov.dot(&jacobian.t()).dot(sei)),
    }
}

/// Averaging kernel of `method`.
pub fn averaging_kernel(method: Method, gain: &Gain, jacobian: &Jacobian) -> Covariance {
    match method {
        Method::Newton | Method::NewtonSe => identity(jacobian.ncols()),
        Method::OptimalEstimation => gain.dot(jacobian),
    }
}

/// Retrieval-error covariance `Ŝ` of `method` at the given Jacobian.
///
/// # Errors
/// `SingularMatrix` when the method's precision matrix is not invertible.
pub fn retrieval_covariance(
    method: Method, jacobian: &Jacobian, sei: &Covariance, sai: &Covariance,
) -> InvResult<Covariance> {
    match method {
        Method::Newton => invert(&jacobian.t().dot(jacobian), "JᵗJ"),
        Method::NewtonSe => invert(&weighted_normal(jacobian, sei), "JᵗSe⁻¹J"),
        Method::OptimalEstimation => invert(&(sai + &weighted_normal(jacobian, sei)), "Sa⁻¹ + JᵗSe⁻¹J"),
    }
}

/// diagnose — assemble [`Diagnostics`] at the terminal state.
///
/// Parameters
/// ----------
/// - `method`: inversion method.
/// - `jacobian`, `residual`: terminal Jacobian and `f(x) − y`.
/// - `sei`, `sai`, `state`, `prior`: as passed to [`cost`].
/// - `retrieval_cov`: `Ŝ` at the terminal state (last step byproduct or
///   [`retrieval_covariance`]).
///
/// Errors
/// ------
/// - `SingularMatrix` from [`gain`].
#[allow(clippy::too_many_arguments)]
pub fn diagnose(
    method: Method, jacobian: &Jacobian, residual: &MeasVec, sei: &Covariance, sai: &Covariance, state: &StateVec,
    prior: &StateVec, retrieval_cov: &Covariance,
) -> InvResult<Diagnostics> {
    let gain = gain(method, jacobian, sei, retrieval_cov)?;
    let averaging_kernel = averaging_kernel(method, &gain, jacobian);
    let cost = cost(method, residual, sei, sai, state, prior);
    let dof_signal = averaging_kernel.diag().sum();
    let retrieval_std = retrieval_cov.diag().mapv(|v| v.max(0.0).sqrt());
    let cost_p_value = match method {
        Method::Newton => None,
        Method::NewtonSe | Method::OptimalEstimation => chi_squared_p_value(cost, residual.len()),
    };
    Ok(Diagnostics { gain, averaging_kernel, cost, dof_signal, retrieval_std, cost_p_value })
}

// ---- Helper methods ----

/// `P(χ²_dof > stat)`, `None` when the distribution is undefined.
fn chi_squared_p_value(stat: f64, dof: usize) -> Option<f64> {
    let dist = ChiSquared::new(dof as f64).ok()?;
    stat.is_finite().then(|| 1.0 - dist.cdf(stat.max(0.0)))
}
