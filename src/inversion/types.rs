//! inversion::types — shared numeric aliases and default constants.
//!
//! Purpose
//! -------
//! Centralize the vector/matrix aliases and the numeric defaults used by
//! the inversion engine so the rest of the code stays agnostic to the
//! concrete `ndarray` containers.
//!
//! Invariants & assumptions
//! ------------------------
//! - `n` denotes the state dimension, `m` the measurement dimension.
//! - Jacobians are `m × n` (row = measurement, column = state component).
//! - Covariances are dense, symmetric, and square.
//!
//! Testing notes
//! -------------
//! - This module only defines aliases and constants; correctness is
//!   exercised by the modules that use them.
use ndarray::{Array1, Array2};

/// State vector `x` (length `n`): the unknowns being retrieved.
pub type StateVec = Array1<f64>;

/// Measurement vector `y` (length `m`): observed or simulated.
pub type MeasVec = Array1<f64>;

/// Fixed auxiliary inputs passed through unchanged to the forward model
/// (geometry, auxiliary atmospheric state).
pub type ParamVec = Array1<f64>;

/// Sensitivity matrix `K = ∂y/∂x`, shape `m × n`.
pub type Jacobian = Array2<f64>;

/// Dense covariance (or inverse covariance) matrix.
pub type Covariance = Array2<f64>;

/// Gain matrix mapping a measurement residual to a state correction,
/// shape `n × m`.
pub type Gain = Array2<f64>;

/// Default threshold on the weighted increment norm `δxᵗ Ŝ⁻¹ δx`.
pub const DEFAULT_EPS_X: f64 = 1e-6;

/// Default threshold on the mean squared residual.
pub const DEFAULT_EPS_Y: f64 = 1e-6;

/// Default hard cap on iterations.
pub const DEFAULT_MAX_ITER: usize = 20;

/// Default finite-difference step as a fraction of the bound span.
pub const DEFAULT_DELTA_FRACTION: f64 = 1e-3;
