//! inversion::engine — the iterative bounded Gauss-Newton / OE solver.
//!
//! Purpose
//! -------
//! Orchestrate the residual function, the Jacobian provider, the step
//! operators, the convergence test, and the diagnostics into one `invert`
//! call that turns an observed measurement vector into a retrieved state.
//!
//! Key behaviors
//! -------------
//! - [`Inverter`] holds the read-only configuration of one retrieval setup:
//!   forward model, bounds, [`InversionConfig`], and the Jacobian provider.
//!   It is `Sync` and can serve many pixels concurrently.
//! - [`Inverter::invert`] runs the state machine
//!   `INITIALIZED → ITERATING → {CONVERGED, MAX_ITER_REACHED}`:
//!   1. validate the request against `n` and `m`;
//!   2. invert `Se` / `Sa` once, as the method requires;
//!   3. start from the midpoint of the bounds;
//!   4. per iteration: Jacobian at `x`, step, residual at the new state,
//!      convergence test;
//!   5. recompute the Jacobian at the terminal state;
//!   6. assemble the outcome for the requested [`OutputMode`].
//!
//! Invariants & assumptions
//! ------------------------
//! - `Se` / `Sa` inversion failures are fatal (`SingularMatrix`) and happen
//!   before the first forward-model call.
//! - Non-convergence is a normal outcome with `converged == false` and
//!   `iterations == max_iter`; a converged outcome may have any count in
//!   `1..=max_iter`.
//! - Every reported state lies inside the bounds.
//! - The loop-carried [`IterationState`] is rebuilt each iteration and never
//!   escapes the call.
//!
//! Conventions
//! -----------
//! - One `debug` span named `invert` per call with `method`, `n`, `m`;
//!   `trace` events per iteration and one `debug` event on termination.
//!
//! Testing notes
//! -------------
//! - Unit tests cover the two-measurement linear scenario, the singular
//!   `Se` failure before any iteration, output modes, and the
//!   convergence-flag consistency. `tests/` exercises the full pipeline.
use crate::inversion::{
    bounds::Bounds,
    convergence::{ConvergenceStatus, check},
    diagnostics::{Diagnostics, cost, diagnose, retrieval_covariance},
    errors::InvResult,
    forward::{ForwardModel, JacobianModel, ResidualFunction},
    jacobian::{JacobianProvider, NumericalJacobian},
    linalg::invert,
    options::{InversionConfig, Method, OutputMode},
    step::{StepInputs, step},
    types::{Covariance, Jacobian, MeasVec, ParamVec, StateVec},
    validation::{validate_finite_covariance, validate_finite_input, validate_len, validate_square},
};
use tracing::{debug, debug_span, trace};

/// Per-pixel inputs of one inversion.
///
/// - `observed`: measurement vector `y`, length `m`.
/// - `params`: forward-model parameters, passed through unchanged.
/// - `prior`: a priori state `xa`, length `n`.
/// - `se`: measurement error covariance, `m × m`.
/// - `sa`: prior error covariance, `n × n`.
/// - `method`, `output`: inversion method and output mode.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalRequest {
    pub observed: MeasVec,
    pub params: ParamVec,
    pub prior: StateVec,
    pub se: Covariance,
    pub sa: Covariance,
    pub method: Method,
    pub output: OutputMode,
}

impl RetrievalRequest {
    /// Build an optimal-estimation request with basic output.
    pub fn new(observed: MeasVec, params: ParamVec, prior: StateVec, se: Covariance, sa: Covariance) -> Self {
        Self { observed, params, prior, se, sa, method: Method::OptimalEstimation, output: OutputMode::Basic }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }
}

/// Loop-carried values of one iteration.
///
/// `simulated` is `f(state)`; `jacobian`, `increment`, and
/// `inv_retrieval_cov` are those of the step that produced `state` (empty
/// before the first step).
#[derive(Debug, Clone, PartialEq)]
pub struct IterationState {
    pub state: StateVec,
    pub simulated: MeasVec,
    pub jacobian: Jacobian,
    pub increment: StateVec,
    pub inv_retrieval_cov: Covariance,
    pub retrieval_cov: Option<Covariance>,
}

/// One entry of the optional per-iteration history.
///
/// `metric` is the convergence metric of the step and `cost` the method's
/// cost evaluated at the state the step produced.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationRecord {
    pub iteration: usize,
    pub state: StateVec,
    pub increment: StateVec,
    pub metric: f64,
    pub cost: f64,
}

/// Result of one inversion. Immutable once returned.
///
/// - `state`, `jacobian`, `simulated`: terminal state, `K` and `f` there.
/// - `converged`, `iterations`: stopping status and number of steps taken.
/// - `retrieval_cov`, `diagnostics`: filled according to the output mode.
/// - `history`: one record per step when `record_history` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct InversionOutcome {
    pub state: StateVec,
    pub jacobian: Jacobian,
    pub simulated: MeasVec,
    pub converged: bool,
    pub iterations: usize,
    pub retrieval_cov: Option<Covariance>,
    pub diagnostics: Option<Diagnostics>,
    pub history: Vec<IterationRecord>,
}

/// Inverter — shared, read-only setup of one retrieval configuration.
pub struct Inverter<'a, F: ForwardModel + ?Sized> {
    model: &'a F,
    bounds: Bounds,
    config: InversionConfig,
    jacobian: JacobianProvider<'a>,
}

impl<'a, F: ForwardModel + ?Sized> Inverter<'a, F> {
    /// Construct an inverter using the numerical Jacobian.
    ///
    /// # Errors
    /// Any configuration error from [`InversionConfig::validate`].
    pub fn new(model: &'a F, bounds: Bounds, config: InversionConfig) -> InvResult<Self> {
        config.validate()?;
        let numerical = NumericalJacobian::new(config.delta_fraction)?;
        Ok(Self { model, bounds, config, jacobian: JacobianProvider::Numerical(numerical) })
    }

    /// Replace the numerical Jacobian by an analytic one.
    pub fn with_analytic_jacobian(mut self, jacobian: &'a dyn JacobianModel) -> Self {
        self.jacobian = JacobianProvider::Analytic(jacobian);
        self
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    pub fn config(&self) -> &InversionConfig {
        &self.config
    }

    /// invert — retrieve the state that explains `request.observed`.
    ///
    /// Parameters
    /// ----------
    /// - `request`: `&RetrievalRequest`
    ///   Observation, parameters, prior, covariances, method, output mode.
    ///
    /// Returns
    /// -------
    /// `InvResult<InversionOutcome>`
    ///   The terminal state and Jacobian, the convergence status, and
    ///   whatever the output mode asks for.
    ///
    /// Errors
    /// ------
    /// - `DimensionMismatch` / `NonSquareMatrix` / `NonFiniteInput` when the
    ///   request does not match the bounds or is not finite.
    /// - `SingularMatrix` for `Se`, `Sa`, `JᵗJ`, `JᵗSe⁻¹J`, or
    ///   `Sa⁻¹ + JᵗSe⁻¹J`.
    /// - Forward-model and Jacobian failures.
    ///
    /// Notes
    /// -----
    /// - The first guess is the midpoint of the bounds, not the prior.
    /// - `Full` output carries a covariance and diagnostics only when the
    ///   last step produced a covariance (`NewtonSe`, `OE`); `Extended`
    ///   always recomputes them at the terminal state.
    pub fn invert(&self, request: &RetrievalRequest) -> InvResult<InversionOutcome> {
        let n = self.bounds.dim();
        let m = request.observed.len();
        let method = request.method;
        let span = debug_span!("invert", method = method.name(), n, m);
        let _guard = span.enter();

        self.validate_request(request)?;
        let (sei, sai) = inverse_covariances(method, request, n, m)?;

        let residual_fn = ResidualFunction::new(self.model, &self.bounds, &request.params, m);
        let start = self.bounds.midpoint();
        let mut current = IterationState {
            simulated: residual_fn.evaluate(&start)?,
            state: start,
            jacobian: Jacobian::zeros((m, n)),
            increment: StateVec::zeros(n),
            inv_retrieval_cov: Covariance::zeros((n, n)),
            retrieval_cov: None,
        };

        let mut history = Vec::new();
        let mut converged = false;
        let mut iterations = 0;
        while iterations < self.config.max_iter {
            iterations += 1;
            let (next, status) = self.iterate(&residual_fn, request, &current, &sei, &sai)?;
            trace!(iteration = iterations, metric = status.metric, state = ?next.state, "step");
            if self.config.record_history {
                let residual = &next.simulated - &request.observed;
                history.push(IterationRecord {
                    iteration: iterations,
                    state: next.state.clone(),
                    increment: next.increment.clone(),
                    metric: status.metric,
                    cost: cost(method, &residual, &sei, &sai, &next.state, &request.prior),
                });
            }
            current = next;
            if status.converged {
                converged = true;
                break;
            }
        }
        debug!(converged, iterations, "inversion finished");

        let jacobian = self.jacobian.evaluate(&residual_fn, &current.state)?;
        let residual = &current.simulated - &request.observed;
        let (retrieval_cov, diagnostics) = match request.output {
            OutputMode::Basic => (None, None),
            OutputMode::Full => match current.retrieval_cov.take() {
                Some(cov) => {
                    let diag = diagnose(method, &jacobian, &residual, &sei, &sai, &current.state, &request.prior, &cov)?;
                    (Some(cov), Some(diag))
                }
                None => (None, None),
            },
            OutputMode::Extended => {
                let cov = retrieval_covariance(method, &jacobian, &sei, &sai)?;
                let diag = diagnose(method, &jacobian, &residual, &sei, &sai, &current.state, &request.prior, &cov)?;
                (Some(cov), Some(diag))
            }
        };

        Ok(InversionOutcome {
            state: current.state,
            jacobian,
            simulated: current.simulated,
            converged,
            iterations,
            retrieval_cov,
            diagnostics,
            history,
        })
    }

    // ---- Helper methods ----

    /// One pass of the loop: `K(x)`, the step, `f(x')`, and the stopping rule.
    fn iterate(
        &self, residual_fn: &ResidualFunction<'_, F>, request: &RetrievalRequest, current: &IterationState,
        sei: &Covariance, sai: &Covariance,
    ) -> InvResult<(IterationState, ConvergenceStatus)> {
        let jacobian = self.jacobian.evaluate(residual_fn, &current.state)?;
        let residual = &current.simulated - &request.observed;
        let inputs = StepInputs {
            bounds: &self.bounds,
            state: &current.state,
            residual: &residual,
            jacobian: &jacobian,
            sei,
            sai,
            prior: &request.prior,
        };
        let outcome = step(request.method, &inputs)?;

        let simulated = residual_fn.evaluate(&outcome.state)?;
        let next_residual = &simulated - &request.observed;
        let status =
            check(request.method, &self.config, &outcome.increment, &outcome.inv_retrieval_cov, &next_residual);

        let next = IterationState {
            state: outcome.state,
            simulated,
            jacobian,
            increment: outcome.increment,
            inv_retrieval_cov: outcome.inv_retrieval_cov,
            retrieval_cov: outcome.retrieval_cov,
        };
        Ok((next, status))
    }

    fn validate_request(&self, request: &RetrievalRequest) -> InvResult<()> {
        let n = self.bounds.dim();
        let m = request.observed.len();
        validate_finite_input("observed measurement", request.observed.view())?;
        validate_len("prior", request.prior.len(), n)?;
        validate_finite_input("prior", request.prior.view())?;
        validate_square("Se", &request.se, m)?;
        validate_finite_covariance("Se", &request.se)?;
        validate_square("Sa", &request.sa, n)?;
        validate_finite_covariance("Sa", &request.sa)
    }
}

/// `(Se⁻¹, Sa⁻¹)` as required by `method`; unused ones are zero matrices.
fn inverse_covariances(
    method: Method, request: &RetrievalRequest, n: usize, m: usize,
) -> InvResult<(Covariance, Covariance)> {
    let sei =
        if method.uses_measurement_covariance() { invert(&request.se, "Se")? } else { Covariance::zeros((m, m)) };
    let sai = if method.uses_prior() { invert(&request.sa, "Sa")? } else { Covariance::zeros((n, n)) };
    Ok((sei, sai))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inversion::{errors::InversionError, forward::LinearModel, linalg::identity};
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - The two-measurement linear scenario under Newton.
    // - Fatal singular Se before any forward-model call.
    // - Output modes and the convergence-flag consistency.
    //
    // They intentionally DO NOT cover:
    // - Batch execution (see `batch`) or property-based bounds checks
    //   (see `tests/`).
    // -------------------------------------------------------------------------

    fn scenario_request(method: Method) -> RetrievalRequest {
        RetrievalRequest::new(
            array![4.0, 8.0],
            ParamVec::zeros(0),
            array![10.0],
            array![[0.01, 0.0], [0.0, 0.01]],
            array![[1.0]],
        )
        .with_method(method)
    }

    #[test]
    // Purpose
    // -------
    // Reproduce the two-measurement linear scenario with Newton.
    //
    // Given
    // -----
    // - `f(x) = [x, 2x]`, bounds [0, 100], y = [4, 8], extended output.
    //
    // Expect
    // ------
    // - Converged in 1 iteration, x ≈ 4, cost ≈ 0, identity kernel.
    fn newton_recovers_linear_scenario_in_one_iteration() {
        // Arrange
        let model = LinearModel::through_origin(array![[1.0], [2.0]]);
        let bounds = Bounds::new(array![0.0], array![100.0]).unwrap();
        let inverter = Inverter::new(&model, bounds, InversionConfig::default()).unwrap();
        let request = scenario_request(Method::Newton).with_output(OutputMode::Extended);

        // Act
        let out = inverter.invert(&request).unwrap();

        // Assert
        assert!(out.converged);
        assert_eq!(out.iterations, 1);
        assert_abs_diff_eq!(out.state[0], 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(out.jacobian, array![[1.0], [2.0]], epsilon = 1e-6);
        let diag = out.diagnostics.unwrap();
        assert_abs_diff_eq!(diag.cost, 0.0, epsilon = 1e-10);
        assert_eq!(diag.averaging_kernel, identity(1));
        assert_abs_diff_eq!(out.retrieval_cov.unwrap(), array![[0.2]], epsilon = 1e-6);
    }

    #[test]
    // Purpose
    // -------
    // A singular Se under NewtonSe fails before any iteration.
    //
    // Given
    // -----
    // - An all-zero Se and a forward model that counts its calls.
    //
    // Expect
    // ------
    // - `SingularMatrix { what: "Se" }` and zero forward-model calls.
    fn singular_se_fails_before_iterating() {
        // Arrange
        let calls = AtomicUsize::new(0);
        let model = |x: &StateVec, _: &ParamVec| -> InvResult<MeasVec> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(array![x[0], 2.0 * x[0]])
        };
        let bounds = Bounds::new(array![0.0], array![100.0]).unwrap();
        let inverter = Inverter::new(&model, bounds, InversionConfig::default()).unwrap();
        let mut request = scenario_request(Method::NewtonSe);
        request.se = Covariance::zeros((2, 2));

        // Act
        let err = inverter.invert(&request).unwrap_err();

        // Assert
        assert!(matches!(err, InversionError::SingularMatrix { what: "Se" }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    // Purpose
    // -------
    // Check the Full output mode per method and request validation.
    //
    // Given
    // -----
    // - The linear scenario `f(x) = [x, 2x]`, Se = 0.01·I, under Newton,
    //   NewtonSe, and OE with `Full` output, then a prior of the wrong length.
    //
    // Expect
    // ------
    // - Newton: no covariance, no diagnostics. OE: both present.
    // - NewtonSe: covariance `(JᵗSe⁻¹J)⁻¹ = 1/500`, gain `pinv(J)`, identity
    //   averaging kernel, and a p-value.
    // - Wrong prior length: `DimensionMismatch`.
    fn full_output_depends_on_step_byproduct() {
        // Arrange
        let model = LinearModel::through_origin(array![[1.0], [2.0]]);
        let bounds = Bounds::new(array![0.0], array![100.0]).unwrap();
        let inverter = Inverter::new(&model, bounds, InversionConfig::default()).unwrap();

        // Act
        let newton = inverter.invert(&scenario_request(Method::Newton).with_output(OutputMode::Full)).unwrap();
        let newton_se = inverter.invert(&scenario_request(Method::NewtonSe).with_output(OutputMode::Full)).unwrap();
        let oe = inverter.invert(&scenario_request(Method::OptimalEstimation).with_output(OutputMode::Full)).unwrap();
        let mut bad = scenario_request(Method::Newton);
        bad.prior = array![1.0, 2.0];
        let err = inverter.invert(&bad);

        // Assert
        assert!(newton.retrieval_cov.is_none() && newton.diagnostics.is_none());
        assert!(newton_se.converged);
        assert_abs_diff_eq!(newton_se.state[0], 4.0, epsilon = 1e-9);
        assert_abs_diff_eq!(newton_se.retrieval_cov.unwrap(), array![[0.002]], epsilon = 1e-9);
        let se_diag = newton_se.diagnostics.unwrap();
        assert_abs_diff_eq!(se_diag.gain, array![[0.2, 0.4]], epsilon = 1e-9);
        assert_abs_diff_eq!(se_diag.averaging_kernel, identity(1), epsilon = 1e-12);
        assert_abs_diff_eq!(se_diag.retrieval_std[0], 0.002_f64.sqrt(), epsilon = 1e-9);
        assert!(se_diag.cost_p_value.is_some());
        assert!(oe.converged);
        assert!(oe.retrieval_cov.is_some());
        assert!(oe.diagnostics.unwrap().cost_p_value.is_some());
        assert!(matches!(err, Err(InversionError::DimensionMismatch { what: "prior", .. })));
    }

    #[test]
    // Purpose
    // -------
    // Verify the convergence-flag consistency when the cap is hit.
    //
    // Given
    // -----
    // - `f(x) = [exp(x)]` with y outside the reachable range, so the state
    //   sticks at the bound and the residual never vanishes; max_iter = 3.
    //
    // Expect
    // ------
    // - `converged == false`, `iterations == 3`, state on the upper bound,
    //   and three history records when history is on.
    fn non_convergence_reports_max_iterations() {
        // Arrange
        let model = |x: &StateVec, _: &ParamVec| -> InvResult<MeasVec> { Ok(x.mapv(f64::exp)) };
        let bounds = Bounds::new(array![0.0], array![1.0]).unwrap();
        let config = InversionConfig::default().with_max_iter(3).unwrap().with_history(true);
        let inverter = Inverter::new(&model, bounds, config).unwrap();
        let request =
            RetrievalRequest::new(array![100.0], ParamVec::zeros(0), array![0.5], array![[1.0]], array![[1.0]])
                .with_method(Method::Newton);

        // Act
        let out = inverter.invert(&request).unwrap();

        // Assert
        assert!(!out.converged);
        assert_eq!(out.iterations, 3);
        assert_eq!(out.history.len(), 3);
        assert_abs_diff_eq!(out.state[0], 1.0);
        assert_abs_diff_eq!(out.simulated[0], 1.0_f64.exp(), epsilon = 1e-12);
    }
}
