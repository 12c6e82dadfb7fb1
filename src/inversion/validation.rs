//! Validation helpers for the inversion engine.
//!
//! This module centralizes the consistency checks used before and during
//! an inversion:
//!
//! - **Tolerance checks**: [`verify_tolerance`], [`verify_max_iter`],
//!   [`verify_delta_fraction`] guard the numeric configuration.
//! - **Shape checks**: [`validate_len`] and [`validate_square`] enforce
//!   vector lengths and square covariances of the expected dimension.
//! - **Caller input**: [`validate_finite_input`] and
//!   [`validate_finite_covariance`] reject NaN / ±∞ in observations, priors,
//!   and covariances before any matrix is inverted.
//! - **Collaborator output**: [`validate_measurement`] and
//!   [`validate_jacobian`] reject wrongly-sized or non-finite forward-model
//!   and Jacobian outputs.
//!
//! All helpers return domain-specific [`InversionError`] variants so that
//! higher-level code reports failures uniformly.
use crate::inversion::{
    errors::{InvResult, InversionError},
    types::{Covariance, Jacobian, MeasVec},
};
use ndarray::{ArrayView1, ArrayView2};

/// Validate a convergence tolerance.
///
/// # Errors
/// Returns [`InversionError::InvalidTolerance`] if `tol` is non-finite or ≤ 0.0.
pub fn verify_tolerance(name: &'static str, tol: f64) -> InvResult<()> {
    if !tol.is_finite() {
        return Err(InversionError::InvalidTolerance { name, tol, reason: "Tolerance must be finite." });
    }
    if tol <= 0.0 {
        return Err(InversionError::InvalidTolerance {
            name,
            tol,
            reason: "Tolerance must be positive.",
        });
    }
    Ok(())
}

/// Validate the iteration cap.
///
/// # Errors
/// Returns [`InversionError::InvalidMaxIter`] if `max_iter == 0`.
pub fn verify_max_iter(max_iter: usize) -> InvResult<()> {
    if max_iter == 0 {
        return Err(InversionError::InvalidMaxIter {
            max_iter,
            reason: "Maximum iterations must be greater than zero.",
        });
    }
    Ok(())
}

/// Validate the finite-difference step fraction.
///
/// The probe offset is `fraction · (upper − lower)`, so the fraction must be
/// finite, strictly positive, and at most `0.5` (beyond that both probes are
/// clipped onto the bounds for every state).
///
/// # Errors
/// Returns [`InversionError::InvalidDeltaFraction`] otherwise.
pub fn verify_delta_fraction(value: f64) -> InvResult<()> {
    if !value.is_finite() {
        return Err(InversionError::InvalidDeltaFraction { value, reason: "Fraction must be finite." });
    }
    if value <= 0.0 {
        return Err(InversionError::InvalidDeltaFraction {
            value,
            reason: "Fraction must be positive.",
        });
    }
    if value > 0.5 {
        return Err(InversionError::InvalidDeltaFraction {
            value,
            reason: "Fraction must not exceed half the bound span.",
        });
    }
    Ok(())
}

/// Validate a vector length.
///
/// # Errors
/// Returns [`InversionError::DimensionMismatch`] if `found != expected`.
pub fn validate_len(what: &'static str, found: usize, expected: usize) -> InvResult<()> {
    if found != expected {
        return Err(InversionError::DimensionMismatch { what, expected, found });
    }
    Ok(())
}

/// Validate that `matrix` is square with side `dim`.
///
/// # Errors
/// - [`InversionError::NonSquareMatrix`] if rows ≠ cols.
/// - [`InversionError::DimensionMismatch`] if the side is not `dim`.
pub fn validate_square(what: &'static str, matrix: &Covariance, dim: usize) -> InvResult<()> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(InversionError::NonSquareMatrix { what, rows, cols });
    }
    validate_len(what, rows, dim)
}

/// Validate that every entry of a forward-model output vector is finite.
///
/// # Errors
/// Returns [`InversionError::NonFiniteValue`] for the first offending entry.
pub fn validate_finite(what: &'static str, values: ArrayView1<'_, f64>) -> InvResult<()> {
    match first_non_finite(values.iter()) {
        Some((index, value)) => Err(InversionError::NonFiniteValue { what, index, value }),
        None => Ok(()),
    }
}

/// Validate that every entry of a caller-supplied vector is finite.
///
/// # Errors
/// Returns [`InversionError::NonFiniteInput`] for the first offending entry.
pub fn validate_finite_input(what: &'static str, values: ArrayView1<'_, f64>) -> InvResult<()> {
    match first_non_finite(values.iter()) {
        Some((index, value)) => Err(InversionError::NonFiniteInput { what, index, value }),
        None => Ok(()),
    }
}

/// Validate that every entry of a caller-supplied covariance is finite.
///
/// # Errors
/// Returns [`InversionError::NonFiniteInput`] with the row-major flat index
/// of the first offending entry.
pub fn validate_finite_covariance(what: &'static str, matrix: &Covariance) -> InvResult<()> {
    match first_non_finite(matrix.iter()) {
        Some((index, value)) => Err(InversionError::NonFiniteInput { what, index, value }),
        None => Ok(()),
    }
}

/// Validate a simulated measurement vector returned by a forward model.
///
/// # Checks
/// 1. Length equals `m`.
/// 2. All entries are finite.
pub fn validate_measurement(simulated: &MeasVec, m: usize) -> InvResult<()> {
    validate_len("simulated measurement", simulated.len(), m)?;
    validate_finite("simulated measurement", simulated.view())
}

/// Validate the shape and entries of a Jacobian.
///
/// # Checks
/// 1. Shape equals `m × n`.
/// 2. All entries are finite (no NaN or ±∞).
///
/// # Errors
/// - [`InversionError::DimensionMismatch`] on a wrong row or column count.
/// - [`InversionError::NonFiniteValue`] with the row-major flat index of the
///   first non-finite entry.
pub fn validate_jacobian(jacobian: &Jacobian, m: usize, n: usize) -> InvResult<()> {
    validate_len("Jacobian rows", jacobian.nrows(), m)?;
    validate_len("Jacobian columns", jacobian.ncols(), n)?;
    validate_finite_matrix("Jacobian", jacobian.view())
}

fn validate_finite_matrix(what: &'static str, matrix: ArrayView2<'_, f64>) -> InvResult<()> {
    match first_non_finite(matrix.iter()) {
        Some((index, value)) => Err(InversionError::NonFiniteValue { what, index, value }),
        None => Ok(()),
    }
}

/// `(flat index, value)` of the first NaN / ±∞ in logical (row-major) order.
fn first_non_finite<'a>(values: impl Iterator<Item = &'a f64>) -> Option<(usize, f64)> {
    values.enumerate().find(|(_, value)| !value.is_finite()).map(|(index, &value)| (index, value))
}
