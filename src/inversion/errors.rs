//! inversion::errors — unified error surface for the inversion engine.
//!
//! Purpose
//! -------
//! Provide a single error enum, [`InversionError`], and result alias,
//! [`InvResult`], for every fallible operation of the engine: input
//! validation, matrix inversion, and failures raised by the external
//! forward / Jacobian collaborators.
//!
//! Key behaviors
//! -------------
//! - Carry the offending payload (dimension, index, value, matrix name) in
//!   each variant so per-pixel diagnostics are readable without context.
//! - Map every variant onto the coarse taxonomy callers act on through
//!   [`InversionError::kind`]: configuration problems, singular matrices,
//!   and collaborator (model) failures.
//!
//! Invariants & assumptions
//! ------------------------
//! - Non-convergence is **not** an error; it is reported through
//!   `InversionOutcome::converged == false`.
//! - Every variant is fatal to the `invert` call that produced it. The
//!   engine never retries and never substitutes defaults.
//!
//! Conventions
//! -----------
//! - Indices are 0-based.
//! - `what` fields name the matrix or vector involved (`"Se"`, `"Sa"`,
//!   `"JᵗJ"`, `"prior"`, ...).
//!
//! Downstream usage
//! ----------------
//! - Orchestration layers match on [`ErrorKind`] to turn
//!   `InvalidConfiguration` / `SingularMatrix` into a per-pixel "invalid"
//!   quality flag rather than aborting an image.
//!
//! Testing notes
//! -------------
//! - Unit tests check that `Display` embeds the payload and that `kind()`
//!   routes each variant into the expected category.

/// Crate-wide result alias for inversion operations.
pub type InvResult<T> = Result<T, InversionError>;

/// Coarse error category, as seen by an orchestration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Mismatched dimensions, invalid bounds or tolerances, non-finite
    /// caller input, unknown enum names. Detected before iterating.
    InvalidConfiguration,
    /// A required matrix inverse does not exist.
    SingularMatrix,
    /// The forward model or analytic Jacobian failed or returned garbage.
    ModelFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InversionError {
    // ---- Dimensions ----
    /// A vector or matrix dimension does not match what the call requires.
    DimensionMismatch { what: &'static str, expected: usize, found: usize },

    /// A matrix that must be square is not.
    NonSquareMatrix { what: &'static str, rows: usize, cols: usize },

    // ---- Configuration ----
    /// Bounds must be finite with `lower < upper` for every component.
    InvalidBounds { index: usize, lower: f64, upper: f64, reason: &'static str },

    /// Maximum iterations needs to be positive.
    InvalidMaxIter { max_iter: usize, reason: &'static str },

    /// A convergence tolerance needs to be positive and finite.
    InvalidTolerance { name: &'static str, tol: f64, reason: &'static str },

    /// Finite-difference step fraction out of range.
    InvalidDeltaFraction { value: f64, reason: &'static str },

    /// Unknown inversion method name.
    InvalidMethod { name: String, reason: &'static str },

    /// Unknown output mode name.
    InvalidOutputMode { name: String, reason: &'static str },

    /// A caller-supplied vector or covariance entry is NaN or infinite.
    NonFiniteInput { what: &'static str, index: usize, value: f64 },

    // ---- Numerics ----
    /// A required matrix inverse does not exist (or is not finite).
    SingularMatrix { what: &'static str },

    /// A forward-model or Jacobian output entry is NaN or infinite.
    NonFiniteValue { what: &'static str, index: usize, value: f64 },

    // ---- Collaborators ----
    /// Error raised by a forward model or analytic Jacobian.
    ForwardModel { text: String },
}

impl InversionError {
    /// Coarse category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            InversionError::SingularMatrix { .. } => ErrorKind::SingularMatrix,
            InversionError::ForwardModel { .. } | InversionError::NonFiniteValue { .. } => {
                ErrorKind::ModelFailure
            }
            _ => ErrorKind::InvalidConfiguration,
        }
    }

    /// Convenience constructor for collaborator failures.
    pub fn model(text: impl Into<String>) -> Self {
        InversionError::ForwardModel { text: text.into() }
    }
}

impl std::error::Error for InversionError {}

impl std::fmt::Display for InversionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            // ---- Dimensions ----
            InversionError::DimensionMismatch { what, expected, found } => {
                write!(f, "Dimension mismatch for {what}: expected {expected}, found {found}")
            }
            InversionError::NonSquareMatrix { what, rows, cols } => {
                write!(f, "Matrix {what} must be square, found {rows}x{cols}")
            }

            // ---- Configuration ----
            InversionError::InvalidBounds { index, lower, upper, reason } => {
                write!(f, "Invalid bounds at index {index}: [{lower}, {upper}]: {reason}")
            }
            InversionError::InvalidMaxIter { max_iter, reason } => {
                write!(f, "Invalid maximum iterations {max_iter}: {reason}")
            }
            InversionError::InvalidTolerance { name, tol, reason } => {
                write!(f, "Invalid tolerance {name} = {tol}: {reason}")
            }
            InversionError::InvalidDeltaFraction { value, reason } => {
                write!(f, "Invalid finite-difference fraction {value}: {reason}")
            }
            InversionError::InvalidMethod { name, reason } => {
                write!(f, "Invalid inversion method '{name}': {reason}")
            }
            InversionError::InvalidOutputMode { name, reason } => {
                write!(f, "Invalid output mode '{name}': {reason}")
            }
            InversionError::NonFiniteInput { what, index, value } => {
                write!(f, "Non-finite input in {what} at index {index}: {value}")
            }

            // ---- Numerics ----
            InversionError::SingularMatrix { what } => {
                write!(f, "Matrix {what} is singular and cannot be inverted")
            }
            InversionError::NonFiniteValue { what, index, value } => {
                write!(f, "Non-finite value in {what} at index {index}: {value}")
            }

            // ---- Collaborators ----
            InversionError::ForwardModel { text } => {
                write!(f, "Forward model failure: {text}")
            }
        }
    }
}
