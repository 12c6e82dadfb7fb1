//! inversion::step — one Gauss-Newton-family update of the state.
//!
//! Purpose
//! -------
//! Compute the next (clipped) state, the increment, and the retrieval-error
//! covariance pair for one iteration, for each of the three methods:
//!
//! | Method      | increment                         | Ŝ⁻¹               |
//! |-------------|-----------------------------------|-------------------|
//! | `Newton`    | `pinv(J)·r`                       | `0`               |
//! | `NewtonSe`  | `pinv(J)·r`                       | `JᵗSe⁻¹J`         |
//! | `OE`        | `Ŝ·(JᵗSe⁻¹·r + Sa⁻¹·(x − xa))`    | `Sa⁻¹ + JᵗSe⁻¹J`  |
//!
//! with `r = f(x) − y`, `pinv(J) = (JᵗJ)⁻¹Jᵗ`, and the new state
//! `clip(x − increment)` in every case.
//!
//! Key behaviors
//! -------------
//! - Each operator is a pure function of its [`StepInputs`]; nothing is
//!   carried between calls.
//! - `NewtonSe` takes the same state step as `Newton`. `Se⁻¹` only enters
//!   the convergence metric and the reported covariance.
//! - `OE` is the MAP update: the prior term pulls the state toward `xa`
//!   through `Sa⁻¹`, so a vanishing `Sa` pins the state at the prior.
//!
//! Invariants & assumptions
//! ------------------------
//! - Shapes were validated by the engine: `state`, `prior` length `n`,
//!   `residual` length `m`, `jacobian` `m × n`, `sei` `m × m`, `sai` `n × n`.
//! - The returned state is always inside the bounds.
//!
//! Testing notes
//! -------------
//! - Unit tests cover exact recovery for a linear model, the covariance pair
//!   of `NewtonSe`, shrinkage to the prior under `Sa → 0`, and clipping of
//!   an overshooting step.
use crate::inversion::{
    bounds::Bounds,
    errors::InvResult,
    linalg::{invert, left_pseudo_inverse, weighted_normal},
    options::Method,
    types::{Covariance, Jacobian, MeasVec, StateVec},
};

/// Inputs of one step. `sei` / `sai` are zero matrices when the method does
/// not use them.
#[derive(Debug, Clone, Copy)]
pub struct StepInputs<'a> {
    pub bounds: &'a Bounds,
    pub state: &'a StateVec,
    pub residual: &'a MeasVec,
    pub jacobian: &'a Jacobian,
    pub sei: &'a Covariance,
    pub sai: &'a Covariance,
    pub prior: &'a StateVec,
}

/// Result of one step.
///
/// - `state`: `clip(x − increment)`.
/// - `increment`: the unclipped correction subtracted from `x`.
/// - `inv_retrieval_cov`: `Ŝ⁻¹`; the zero matrix for `Newton`.
/// - `retrieval_cov`: `Ŝ` when the step produced it as a byproduct.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutcome {
    pub state: StateVec,
    pub increment: StateVec,
    pub inv_retrieval_cov: Covariance,
    pub retrieval_cov: Option<Covariance>,
}

/// Dispatch to the operator of `method`.
pub fn step(method: Method, inputs: &StepInputs<'_>) -> InvResult<StepOutcome> {
    match method {
        Method::Newton => newton_step(inputs),
        Method::NewtonSe => newton_se_step(inputs),
        Method::OptimalEstimation => optimal_estimation_step(inputs),
    }
}

/// Plain Gauss-Newton step.
///
/// # Errors
/// `SingularMatrix` (`"JᵗJ"`) for a rank-deficient Jacobian.
pub fn newton_step(inputs: &StepInputs<'_>) -> InvResult<StepOutcome> {
    let increment = left_pseudo_inverse(inputs.jacobian)?.dot(inputs.residual);
    let state = inputs.bounds.clip(&(inputs.state - &increment))?;
    let n = inputs.state.len();
    Ok(StepOutcome { state, increment, inv_retrieval_cov: Covariance::zeros((n, n)), retrieval_cov: None })
}

/// Gauss-Newton step with an `Se`-weighted retrieval-error covariance.
///
/// # Errors
/// `SingularMatrix` for `JᵗJ` (the step) or `JᵗSe⁻¹J` (the covariance).
pub fn newton_se_step(inputs: &StepInputs<'_>) -> InvResult<StepOutcome> {
    let increment = left_pseudo_inverse(inputs.jacobian)?.dot(inputs.residual);
    let state = inputs.bounds.clip(&(inputs.state - &increment))?;
    let inv_retrieval_cov = weighted_normal(inputs.jacobian, inputs.sei);
    let retrieval_cov = invert(&inv_retrieval_cov, "JᵗSe⁻¹J")?;
    Ok(StepOutcome { state, increment, inv_retrieval_cov, retrieval_cov: Some(retrieval_cov) })
}

/// Bayesian optimal-estimation (MAP Gauss-Newton) step.
///
/// # Errors
/// `SingularMatrix` (`"Sa⁻¹ + JᵗSe⁻¹J"`) when the posterior precision is
/// not invertible.
pub fn optimal_estimation_step(inputs: &StepInputs<'_>) -> InvResult<StepOutcome> {
    let inv_retrieval_cov = inputs.sai + &weighted_normal(inputs.jacobian, inputs.sei);
    let retrieval_cov = invert(&inv_retrieval_cov, "Sa⁻¹ + JᵗSe⁻¹J")?;

    let data_term = inputs.jacobian.t().dot(&inputs.sei.dot(inputs.residual));
    let prior_term = inputs.sai.dot(&(inputs.state - inputs.prior));
    let increment = retrieval_cov.dot(&(data_term + prior_term));

    let state = inputs.bounds.clip(&(inputs.state - &increment))?;
    Ok(StepOutcome { state, increment, inv_retrieval_cov, retrieval_cov: Some(retrieval_cov) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inversion::{errors::InversionError, linalg::identity};
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Exact one-step recovery for a linear model (Newton).
    // - The covariance pair returned by NewtonSe.
    // - Shrinkage of the OE step toward the prior as Sa → 0.
    // - Clipping of overshooting steps and singular Jacobians.
    // -------------------------------------------------------------------------

    fn linear_setup() -> (Bounds, Jacobian) {
        (Bounds::new(array![0.0], array![100.0]).unwrap(), array![[1.0], [2.0]])
    }

    #[test]
    // Purpose
    // -------
    // Verify that a Newton step recovers the true state of a linear model.
    //
    // Given
    // -----
    // - `f(x) = [x, 2x]`, x = 50, y = [4, 8] → r = [46, 92].
    //
    // Expect
    // ------
    // - increment = 46, new state = 4, zero inverse covariance, no covariance.
    fn newton_step_recovers_linear_state() {
        // Arrange
        let (bounds, jac) = linear_setup();
        let state = array![50.0];
        let residual = array![46.0, 92.0];
        let zeros_m = Covariance::zeros((2, 2));
        let zeros_n = Covariance::zeros((1, 1));
        let inputs = StepInputs {
            bounds: &bounds,
            state: &state,
            residual: &residual,
            jacobian: &jac,
            sei: &zeros_m,
            sai: &zeros_n,
            prior: &state,
        };

        // Act
        let out = step(Method::Newton, &inputs).unwrap();

        // Assert
        assert_abs_diff_eq!(out.increment[0], 46.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.state[0], 4.0, epsilon = 1e-12);
        assert_eq!(out.inv_retrieval_cov, zeros_n);
        assert!(out.retrieval_cov.is_none());
    }

    #[test]
    // Purpose
    // -------
    // Check that NewtonSe keeps the Newton state step and reports the
    // `JᵗSe⁻¹J` covariance pair.
    //
    // Given
    // -----
    // - The linear setup with Se = diag(0.01, 0.01) → Se⁻¹ = 100·I.
    //
    // Expect
    // ------
    // - Same state as Newton; Ŝ⁻¹ = [[500]], Ŝ = [[0.002]].
    fn newton_se_step_reports_weighted_covariance() {
        // Arrange
        let (bounds, jac) = linear_setup();
        let state = array![50.0];
        let residual = array![46.0, 92.0];
        let sei = array![[100.0, 0.0], [0.0, 100.0]];
        let sai = Covariance::zeros((1, 1));
        let inputs =
            StepInputs { bounds: &bounds, state: &state, residual: &residual, jacobian: &jac, sei: &sei, sai: &sai, prior: &state };

        // Act
        let out = step(Method::NewtonSe, &inputs).unwrap();

        // Assert
        assert_abs_diff_eq!(out.state[0], 4.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.inv_retrieval_cov, array![[500.0]], epsilon = 1e-9);
        assert_abs_diff_eq!(out.retrieval_cov.unwrap(), array![[0.002]], epsilon = 1e-12);
    }

    #[test]
    // Purpose
    // -------
    // Verify shrinkage toward the prior as Sa → 0.
    //
    // Given
    // -----
    // - Two-state problem with an arbitrary Jacobian and residual.
    // - Sa = 1e-12·I (Sa⁻¹ = 1e12·I), prior (3, 7), state (5, 5).
    //
    // Expect
    // ------
    // - Starting at the prior, the increment is ≈ 0.
    // - Starting elsewhere, the new state lands on the prior.
    fn oe_step_shrinks_to_prior_as_sa_vanishes() {
        // Arrange
        let bounds = Bounds::new(array![0.0, 0.0], array![10.0, 10.0]).unwrap();
        let jac = array![[1.0, 0.3], [-0.5, 2.0], [0.8, 0.1]];
        let residual = array![1.5, -2.0, 0.7];
        let sei = identity(3) * 4.0;
        let sai = identity(2) * 1e12;
        let prior = array![3.0, 7.0];
        let away = array![5.0, 5.0];

        // Act
        let at_prior = optimal_estimation_step(&StepInputs {
            bounds: &bounds,
            state: &prior,
            residual: &residual,
            jacobian: &jac,
            sei: &sei,
            sai: &sai,
            prior: &prior,
        })
        .unwrap();
        let from_away = optimal_estimation_step(&StepInputs {
            bounds: &bounds,
            state: &away,
            residual: &residual,
            jacobian: &jac,
            sei: &sei,
            sai: &sai,
            prior: &prior,
        })
        .unwrap();

        // Assert
        assert_abs_diff_eq!(at_prior.increment, array![0.0, 0.0], epsilon = 1e-9);
        assert_abs_diff_eq!(from_away.state, prior, epsilon = 1e-9);
        assert!(from_away.retrieval_cov.is_some());
    }

    #[test]
    // Purpose
    // -------
    // An overshooting step is clipped, and a flat Jacobian is singular.
    //
    // Given
    // -----
    // - The linear setup at x = 50 with y far above the range → r = [-950, -1900].
    // - A zero Jacobian.
    //
    // Expect
    // ------
    // - New state is the upper bound 100; the zero Jacobian yields
    //   `SingularMatrix`.
    fn step_clips_overshoot_and_rejects_flat_jacobian() {
        // Arrange
        let (bounds, jac) = linear_setup();
        let state = array![50.0];
        let residual = array![-950.0, -1900.0];
        let flat = Jacobian::zeros((2, 1));
        let zeros_m = Covariance::zeros((2, 2));
        let zeros_n = Covariance::zeros((1, 1));
        let mut inputs = StepInputs {
            bounds: &bounds,
            state: &state,
            residual: &residual,
            jacobian: &jac,
            sei: &zeros_m,
            sai: &zeros_n,
            prior: &state,
        };

        // Act
        let clipped = newton_step(&inputs).unwrap();
        inputs.jacobian = &flat;
        let err = newton_step(&inputs).unwrap_err();

        // Assert
        assert_eq!(clipped.state, array![100.0]);
        assert!(matches!(err, InversionError::SingularMatrix { .. }));
    }
}
