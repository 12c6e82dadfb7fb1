//! inversion::linalg — dense linear-algebra helpers.
//!
//! Purpose
//! -------
//! Bridge the `ndarray` containers used throughout the engine to
//! `nalgebra::DMatrix` for matrix inversion, and collect the small matrix
//! expressions shared by the step operators and the diagnostics.
//!
//! Conventions
//! -----------
//! - Every inverse goes through [`invert`]: a missing inverse, or an inverse
//!   with non-finite entries, is `InversionError::SingularMatrix`. Callers
//!   never substitute an identity or a pseudo-inverse on failure.
//! - `what` arguments name the matrix in error messages (`"Se"`, `"JᵗJ"`).
use crate::inversion::{
    errors::{InvResult, InversionError},
    types::{Covariance, Gain, Jacobian},
};
use nalgebra::DMatrix;
use ndarray::{Array1, Array2};

/// invert — dense inverse of a square matrix.
///
/// Parameters
/// ----------
/// - `matrix`: `&Array2<f64>`
///   Square matrix to invert.
/// - `what`: `&'static str`
///   Name used in the error.
///
/// Returns
/// -------
/// `InvResult<Array2<f64>>`
///   The inverse, with every entry finite.
///
/// Errors
/// ------
/// - `InversionError::NonSquareMatrix` if `matrix` is not square.
/// - `InversionError::SingularMatrix` if no inverse exists or it is not
///   finite.
///
/// Notes
/// -----
/// - Uses `nalgebra`'s LU-based `try_inverse` (closed forms up to 4×4).
pub fn invert(matrix: &Array2<f64>, what: &'static str) -> InvResult<Array2<f64>> {
    let (rows, cols) = matrix.dim();
    if rows != cols {
        return Err(InversionError::NonSquareMatrix { what, rows, cols });
    }
    let inverse = to_dmatrix(matrix).try_inverse().ok_or(InversionError::SingularMatrix { what })?;
    if inverse.iter().any(|v| !v.is_finite()) {
        return Err(InversionError::SingularMatrix { what });
    }
    Ok(from_dmatrix(&inverse))
}

/// left_pseudo_inverse — `pinv(J) = (JᵗJ)⁻¹ Jᵗ`, shape `n × m`.
///
/// # Errors
/// `InversionError::SingularMatrix` (`"JᵗJ"`) when `JᵗJ` is not invertible,
/// e.g. for a flat Jacobian.
pub fn left_pseudo_inverse(jacobian: &Jacobian) -> InvResult<Gain> {
    let normal = jacobian.t().dot(jacobian);
    Ok(invert(&normal, "JᵗJ")?.dot(&jacobian.t()))
}

/// `Jᵗ W J`, shape `n × n`.
///
/// # Panics
/// If `weight` is not `m × m` for an `m × n` Jacobian.
pub fn weighted_normal(jacobian: &Jacobian, weight: &Covariance) -> Covariance {
    jacobian.t().dot(&weight.dot(jacobian))
}

/// `vᵗ M v`.
///
/// # Panics
/// If the dimensions of `v` and `matrix` disagree.
pub fn quadratic_form(v: &Array1<f64>, matrix: &Array2<f64>) -> f64 {
    v.dot(&matrix.dot(v))
}

/// `n × n` identity.
pub fn identity(n: usize) -> Array2<f64> {
    Array2::eye(n)
}

// ---- Helper methods ----

/// Copy an `ndarray` matrix into a column-major `DMatrix`.
fn to_dmatrix(matrix: &Array2<f64>) -> DMatrix<f64> {
    let (rows, cols) = matrix.dim();
    DMatrix::from_fn(rows, cols, |i, j| matrix[[i, j]])
}

fn from_dmatrix(matrix: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((matrix.nrows(), matrix.ncols()), |(i, j)| matrix[(i, j)])
}
