//! Configuration surface for the inversion engine.
//!
//! - [`Method`]: which Gauss-Newton family member drives the update.
//! - [`OutputMode`]: how much is reported back (basic / full / extended).
//! - [`InversionConfig`]: tolerances, iteration cap, and finite-difference
//!   step, consolidated in one validated structure.
//!
//! Both enums parse case-insensitively from the names used by retrieval
//! configuration files (`"NEWTON"`, `"NEWTON_SE"`, `"OE"`, `"BASIC"`,
//! `"FULL"`, `"EXTENDED"`).
use crate::inversion::{
    errors::{InvResult, InversionError},
    types::{DEFAULT_DELTA_FRACTION, DEFAULT_EPS_X, DEFAULT_EPS_Y, DEFAULT_MAX_ITER},
    validation::{verify_delta_fraction, verify_max_iter, verify_tolerance},
};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Inversion method.
///
/// Variants:
/// - `Newton`: plain Gauss-Newton with the left pseudo-inverse; no
///   covariances are used.
/// - `NewtonSe`: same state update as `Newton`, but the measurement error
///   covariance weights the convergence metric and the retrieval-error
///   covariance.
/// - `OptimalEstimation`: Bayesian (MAP) update regularized toward the prior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Method {
    Newton,
    NewtonSe,
    OptimalEstimation,
}

impl Method {
    /// `true` when the method needs `Se⁻¹`.
    pub fn uses_measurement_covariance(self) -> bool {
        !matches!(self, Method::Newton)
    }

    /// `true` when the method needs `Sa⁻¹` and the prior.
    pub fn uses_prior(self) -> bool {
        matches!(self, Method::OptimalEstimation)
    }

    pub fn name(self) -> &'static str {
        match self {
            Method::Newton => "NEWTON",
            Method::NewtonSe => "NEWTON_SE",
            Method::OptimalEstimation => "OE",
        }
    }
}

impl FromStr for Method {
    type Err = InversionError;

    /// Parse a method name (case-insensitive).
    ///
    /// Accepts `"NEWTON"`, `"NEWTON_SE"`, `"OE"` and the long form
    /// `"OPTIMAL_ESTIMATION"`. Anything else is
    /// `InversionError::InvalidMethod`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "newton" => Ok(Method::Newton),
            "newton_se" => Ok(Method::NewtonSe),
            "oe" | "optimal_estimation" => Ok(Method::OptimalEstimation),
            _ => Err(InversionError::InvalidMethod {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'NEWTON', 'NEWTON_SE' or 'OE'.",
            }),
        }
    }
}

/// How much of the solution is reported.
///
/// - `Basic`: state, Jacobian, convergence flag, iteration count.
/// - `Full`: additionally the retrieval-error covariance and diagnostics,
///   but only when the last step produced a covariance as a byproduct.
/// - `Extended`: always recomputes covariance and diagnostics at the
///   terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OutputMode {
    #[default]
    Basic,
    Full,
    Extended,
}

impl FromStr for OutputMode {
    type Err = InversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "basic" => Ok(OutputMode::Basic),
            "full" => Ok(OutputMode::Full),
            "extended" => Ok(OutputMode::Extended),
            _ => Err(InversionError::InvalidOutputMode {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'BASIC', 'FULL' or 'EXTENDED'.",
            }),
        }
    }
}

/// Numeric configuration shared by every retrieval of one setup.
///
/// - `eps_x`: converge when `δxᵗ Ŝ⁻¹ δx < eps_x` (`NEWTON_SE`, `OE`).
/// - `eps_y`: converge when `mean(r²) < eps_y` (`NEWTON`).
/// - `max_iter`: hard cap on iterations; exhausting it is a normal,
///   non-converged outcome.
/// - `delta_fraction`: finite-difference offset as a fraction of each
///   component's bound span.
/// - `record_history`: keep one record per iteration in the outcome.
///
/// Default:
/// - `eps_x = 1e-6`, `eps_y = 1e-6`, `max_iter = 20`,
///   `delta_fraction = 1e-3`, `record_history = false`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct InversionConfig {
    pub eps_x: f64,
    pub eps_y: f64,
    pub max_iter: usize,
    pub delta_fraction: f64,
    pub record_history: bool,
}

impl InversionConfig {
    /// Construct a validated configuration.
    ///
    /// # Rules
    /// - `eps_x`, `eps_y` finite and strictly positive.
    /// - `max_iter > 0`.
    /// - `delta_fraction` finite, in `(0, 0.5]`.
    ///
    /// # Errors
    /// - [`InversionError::InvalidTolerance`], [`InversionError::InvalidMaxIter`],
    ///   [`InversionError::InvalidDeltaFraction`].
    pub fn new(eps_x: f64, eps_y: f64, max_iter: usize, delta_fraction: f64) -> InvResult<Self> {
        let config = Self { eps_x, eps_y, max_iter, delta_fraction, record_history: false };
        config.validate()?;
        Ok(config)
    }

    /// Return a copy with a different iteration cap.
    pub fn with_max_iter(mut self, max_iter: usize) -> InvResult<Self> {
        verify_max_iter(max_iter)?;
        self.max_iter = max_iter;
        Ok(self)
    }

    /// Return a copy that records the per-iteration history.
    pub fn with_history(mut self, record_history: bool) -> Self {
        self.record_history = record_history;
        self
    }

    /// Re-check every field. Used on configurations built by struct literal
    /// or deserialized from a file.
    pub fn validate(&self) -> InvResult<()> {
        verify_tolerance("eps_x", self.eps_x)?;
        verify_tolerance("eps_y", self.eps_y)?;
        verify_max_iter(self.max_iter)?;
        verify_delta_fraction(self.delta_fraction)
    }
}

impl Default for InversionConfig {
    fn default() -> Self {
        Self {
            eps_x: DEFAULT_EPS_X,
            eps_y: DEFAULT_EPS_Y,
            max_iter: DEFAULT_MAX_ITER,
            delta_fraction: DEFAULT_DELTA_FRACTION,
            record_history: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -------------------------------------------------------------------------
    // Scope
    // -----
    // These tests cover:
    // - Name parsing for `Method` and `OutputMode`.
    // - Defaults and validation of `InversionConfig`.
    // -------------------------------------------------------------------------

    #[test]
    // Purpose
    // -------
    // Parse the configuration-file names case-insensitively.
    //
    // Given
    // -----
    // - Mixed-case method and output-mode names plus an unknown name.
    //
    // Expect
    // ------
    // - Known names map to their variants; unknown names are typed errors.
    fn method_and_output_mode_parse_case_insensitively() {
        assert_eq!("newton".parse::<Method>().unwrap(), Method::Newton);
        assert_eq!("NEWTON_SE".parse::<Method>().unwrap(), Method::NewtonSe);
        assert_eq!("Oe".parse::<Method>().unwrap(), Method::OptimalEstimation);
        assert!(matches!("lm".parse::<Method>(), Err(InversionError::InvalidMethod { .. })));

        assert_eq!("Extended".parse::<OutputMode>().unwrap(), OutputMode::Extended);
        assert!(matches!(
            "verbose".parse::<OutputMode>(),
            Err(InversionError::InvalidOutputMode { .. })
        ));
    }

    #[test]
    // Purpose
    // -------
    // Check the documented defaults and that `new` rejects bad values.
    //
    // Given
    // -----
    // - `InversionConfig::default()` and a few invalid constructions.
    //
    // Expect
    // ------
    // - Defaults match the documented constants and validate cleanly.
    // - Zero iterations / negative tolerance / zero fraction are rejected.
    fn config_defaults_and_validation() {
        // Arrange
        let config = InversionConfig::default();

        // Assert
        assert_eq!(config.eps_x, 1e-6);
        assert_eq!(config.eps_y, 1e-6);
        assert_eq!(config.max_iter, 20);
        assert_eq!(config.delta_fraction, 1e-3);
        assert!(!config.record_history);
        assert!(config.validate().is_ok());

        assert!(InversionConfig::new(1e-6, 1e-6, 0, 1e-3).is_err());
        assert!(InversionConfig::new(-1.0, 1e-6, 10, 1e-3).is_err());
        assert!(InversionConfig::new(1e-6, 1e-6, 10, 0.0).is_err());
        assert!(config.with_max_iter(0).is_err());
        assert_eq!(config.with_max_iter(5).unwrap().max_iter, 5);
    }

    #[test]
    // Purpose
    // -------
    // Confirm which covariances each method consumes.
    fn method_covariance_usage() {
        assert!(!Method::Newton.uses_measurement_covariance());
        assert!(Method::NewtonSe.uses_measurement_covariance());
        assert!(!Method::NewtonSe.uses_prior());
        assert!(Method::OptimalEstimation.uses_prior());
        assert_eq!(Method::OptimalEstimation.name(), "OE");
    }
}
