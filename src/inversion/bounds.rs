//! State bounds — enforce per-component `[lower, upper]` limits on the state.
//!
//! Purpose
//! -------
//! Provide a validated container for the lower/upper state bounds of a
//! retrieval setup (sensor + surface type) together with the clipping
//! primitive that keeps every evaluated state inside the valid domain of
//! the forward model.
//!
//! Key behaviors
//! -------------
//! - Construct [`Bounds`] values whose components are finite with
//!   `lower[i] < upper[i]`.
//! - Clamp a state vector component-wise with [`clip`] / [`Bounds::clip`].
//! - Provide the first guess of the iteration ([`Bounds::midpoint`]) and the
//!   span used to scale finite-difference probes ([`Bounds::span`]).
//!
//! Invariants & assumptions
//! ------------------------
//! - Bounds are never mutated after construction; one [`Bounds`] value is
//!   shared read-only by every retrieval of a configuration.
//! - After `clip`, every component lies in `[lower[i], upper[i]]` inclusive.
//!
//! Conventions
//! -----------
//! - Length mismatches are reported as `InversionError::DimensionMismatch`;
//!   invalid bound pairs as `InversionError::InvalidBounds`.
//!
//! Downstream usage
//! ----------------
//! - The residual function clips every state before calling the forward
//!   model; every step operator clips the updated state.
//!
//! Testing notes
//! -------------
//! - Unit tests cover construction failures, clipping on both sides, the
//!   midpoint, and length mismatches. A property test in `tests/` checks the
//!   bounds invariant on random inputs.
use crate::inversion::{
    errors::{InvResult, InversionError},
    types::StateVec,
    validation::validate_len,
};
use ndarray::{ArrayView1, Zip};

/// clip — clamp `x` component-wise into `[lower, upper]`.
///
/// Parameters
/// ----------
/// - `lower`, `upper`: `ArrayView1<f64>`
///   Per-component bounds of the same length as `x`.
/// - `x`: `ArrayView1<f64>`
///   Vector to clamp.
///
/// Returns
/// -------
/// `InvResult<StateVec>`
///   A new vector with `x'[i] = min(max(x[i], lower[i]), upper[i])`.
///
/// Errors
/// ------
/// - `InversionError::DimensionMismatch` when the three lengths differ.
///
/// Notes
/// -----
/// - `f64::max`/`f64::min` ignore a NaN operand, so a NaN component comes
///   out as `lower[i]`; callers reject non-finite states upstream.
///
/// Examples
/// --------
/// ```rust
/// # use ndarray::array;
/// # use oe_retrieval::inversion::bounds::clip;
/// let x = clip(array![0.0, 0.0].view(), array![1.0, 1.0].view(), array![-2.0, 0.5].view()).unwrap();
/// assert_eq!(x, array![0.0, 0.5]);
/// ```
pub fn clip(
    lower: ArrayView1<'_, f64>, upper: ArrayView1<'_, f64>, x: ArrayView1<'_, f64>,
) -> InvResult<StateVec> {
    validate_len("upper bound", upper.len(), lower.len())?;
    validate_len("state", x.len(), lower.len())?;
    Ok(Zip::from(&x).and(&lower).and(&upper).map_collect(|&xi, &lo, &hi| xi.max(lo).min(hi)))
}

/// Bounds — validated lower/upper limits of the state vector.
///
/// Fields
/// ------
/// - `lower`: `StateVec`, finite lower limits.
/// - `upper`: `StateVec`, finite upper limits, `upper[i] > lower[i]`.
///
/// Invariants
/// ----------
/// - `lower.len() == upper.len() > 0`.
/// - Both vectors are finite and `lower[i] < upper[i]` for every `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bounds {
    lower: StateVec,
    upper: StateVec,
}

impl Bounds {
    /// Construct validated bounds.
    ///
    /// Errors
    /// ------
    /// - `InversionError::DimensionMismatch` when the lengths differ.
    /// - `InversionError::InvalidBounds` when the state dimension is zero,
    ///   a bound is not finite, or `lower[i] >= upper[i]`.
    pub fn new(lower: StateVec, upper: StateVec) -> InvResult<Self> {
        validate_len("upper bound", upper.len(), lower.len())?;
        if lower.is_empty() {
            return Err(InversionError::InvalidBounds {
                index: 0,
                lower: f64::NAN,
                upper: f64::NAN,
                reason: "State dimension must be at least one.",
            });
        }
        for (index, (&lo, &hi)) in lower.iter().zip(upper.iter()).enumerate() {
            if !lo.is_finite() || !hi.is_finite() {
                return Err(InversionError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                    reason: "Bounds must be finite.",
                });
            }
            if lo >= hi {
                return Err(InversionError::InvalidBounds {
                    index,
                    lower: lo,
                    upper: hi,
                    reason: "Bounds must have lower < upper.",
                });
            }
        }
        Ok(Self { lower, upper })
    }

    pub fn lower(&self) -> &StateVec {
        &self.lower
    }

    pub fn upper(&self) -> &StateVec {
        &self.upper
    }

    /// State dimension `n`.
    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    /// Clamp `x` into these bounds. See [`clip`].
    pub fn clip(&self, x: &StateVec) -> InvResult<StateVec> {
        clip(self.lower.view(), self.upper.view(), x.view())
    }

    /// `0.5 · (lower + upper)`, the first guess of every inversion.
    pub fn midpoint(&self) -> StateVec {
        (&self.lower + &self.upper) * 0.5
    }

    /// `upper − lower`.
    pub fn span(&self) -> StateVec {
        &self.upper - &self.lower
    }

    /// `true` when `x` has the right length and lies inside the bounds.
    pub fn contains(&self, x: &StateVec) -> bool {
        x.len() == self.dim()
            && Zip::from(x).and(&self.lower).and(&self.upper).all(|&xi, &lo, &hi| lo <= xi && xi <= hi)
    }
}
