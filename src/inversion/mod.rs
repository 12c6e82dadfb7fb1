//! inversion — bounded Gauss-Newton / Optimal-Estimation inversion engine.
//!
//! Purpose
//! -------
//! Retrieve a state vector (e.g. total column water vapour plus nuisance
//! terms such as albedo, aerosol, or wind speed) from an observed
//! measurement vector by iteratively inverting a non-linear forward model
//! supplied by the caller.
//!
//! Key behaviors
//! -------------
//! - Keep every evaluated state inside per-component bounds ([`bounds`]).
//! - Wrap the caller's forward model into a bounded residual function and
//!   derive its Jacobian numerically or from an analytic provider
//!   ([`forward`], [`jacobian`]).
//! - Apply one of three Gauss-Newton-family updates (`NEWTON`, `NEWTON_SE`,
//!   `OE`) until a method-specific convergence test passes or the iteration
//!   cap is reached ([`step`], [`convergence`], [`engine`]).
//! - Report gain, averaging kernel, cost, and retrieval-error covariance on
//!   request ([`diagnostics`]).
//! - Run many independent pixels over one shared setup in parallel
//!   ([`batch`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - `n` is the state dimension, `m` the measurement dimension; shapes are
//!   checked before iterating.
//! - `Se` and `Sa` are inverted once per call; any required inverse that
//!   does not exist is a fatal `SingularMatrix` error, never substituted.
//! - Non-convergence is a normal result, not an error.
//! - The forward model, bounds, and configuration are shared read-only; all
//!   loop state lives inside one `invert` call.
//!
//! Conventions
//! -----------
//! - Vectors and matrices use the aliases in [`types`] (`ndarray` over `f64`).
//! - Residuals are `r = f(x) − y`; states are updated as `x ← clip(x − δx)`.
//! - Errors bubble up as [`InvResult<T>`] / [`InversionError`]; this module
//!   and its children never intentionally panic or use `unsafe`.
//!
//! Downstream usage
//! ----------------
//! - A retrieval orchestration layer builds one [`Inverter`] per sensor and
//!   surface setup, then calls [`Inverter::invert`] (or [`invert_batch`])
//!   per pixel and maps [`ErrorKind`] / `converged` onto quality flags.
//! - One-off callers can use [`invert`].
//!
//! Testing notes
//! -------------
//! - Unit tests live next to each submodule.
//! - Integration tests in `tests/` cover the end-to-end scenarios and a
//!   property test of the bounds invariant.

pub mod api;
pub mod batch;
pub mod bounds;
pub mod convergence;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod forward;
pub mod jacobian;
pub mod linalg;
pub mod options;
pub mod step;
pub mod types;
pub mod validation;

// ---- Re-exports (primary public surface) ----------------------------------

pub use self::api::invert;
pub use self::batch::{BatchSummary, PixelQuality, invert_batch};
pub use self::bounds::Bounds;
pub use self::diagnostics::Diagnostics;
pub use self::engine::{InversionOutcome, Inverter, IterationRecord, IterationState, RetrievalRequest};
pub use self::errors::{ErrorKind, InvResult, InversionError};
pub use self::forward::{ForwardModel, JacobianModel, LinearModel, ResidualFunction};
pub use self::jacobian::{JacobianProvider, NumericalJacobian};
pub use self::options::{InversionConfig, Method, OutputMode};
pub use self::types::{Covariance, Gain, Jacobian, MeasVec, ParamVec, StateVec};

// ---- Optional convenience prelude for downstream crates -------------------
//
// Downstream crates can write
//
//     use oe_retrieval::inversion::prelude::*;
//
// to import the main inversion surface in a single line.

pub mod prelude {
    pub use super::api::invert;
    pub use super::batch::{BatchSummary, PixelQuality, invert_batch};
    pub use super::bounds::Bounds;
    pub use super::engine::{InversionOutcome, Inverter, RetrievalRequest};
    pub use super::errors::{ErrorKind, InvResult, InversionError};
    pub use super::forward::{ForwardModel, JacobianModel, LinearModel};
    pub use super::options::{InversionConfig, Method, OutputMode};
    pub use super::types::{Covariance, Jacobian, MeasVec, ParamVec, StateVec};
}
