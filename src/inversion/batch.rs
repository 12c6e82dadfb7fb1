//! inversion::batch — many independent retrievals over one shared setup.
//!
//! Purpose
//! -------
//! Run one [`Inverter`] over a slice of per-pixel requests in parallel and
//! turn the per-pixel results into quality classes, the way a retrieval
//! orchestration layer consumes the engine.
//!
//! Key behaviors
//! -------------
//! - [`invert_batch`] maps requests to results with `rayon`; results keep
//!   the order of the requests and failures stay per pixel.
//! - [`PixelQuality::classify`] sorts a result into converged, not
//!   converged, or invalid (with the error category).
//! - [`BatchSummary`] counts the classes for reporting.
//!
//! Invariants & assumptions
//! ------------------------
//! - Each `invert` call owns its iteration state; the inverter, the model,
//!   and the bounds are only read. No locks are taken.
//!
//! Testing notes
//! -------------
//! - Unit tests mix valid, non-converging, and singular requests and check
//!   ordering, classification, and counts.
use crate::inversion::{
    engine::{InversionOutcome, Inverter, RetrievalRequest},
    errors::{ErrorKind, InvResult},
    forward::ForwardModel,
};
use rayon::prelude::*;
use tracing::debug;

/// Per-pixel quality class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelQuality {
    Converged,
    NotConverged,
    Invalid(ErrorKind),
}

impl PixelQuality {
    pub fn classify(result: &InvResult<InversionOutcome>) -> Self {
        match result {
            Ok(outcome) if outcome.converged => PixelQuality::Converged,
            Ok(_) => PixelQuality::NotConverged,
            Err(err) => PixelQuality::Invalid(err.kind()),
        }
    }
}

/// Counts of each quality class over a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchSummary {
    pub total: usize,
    pub converged: usize,
    pub not_converged: usize,
    pub invalid_configuration: usize,
    pub singular: usize,
    pub model_failure: usize,
}

impl BatchSummary {
    pub fn from_results(results: &[InvResult<InversionOutcome>]) -> Self {
        results.iter().map(PixelQuality::classify).fold(Self::default(), |mut acc, quality| {
            acc.total += 1;
            match quality {
                PixelQuality::Converged => acc.converged += 1,
                PixelQuality::NotConverged => acc.not_converged += 1,
                PixelQuality::Invalid(ErrorKind::InvalidConfiguration) => acc.invalid_configuration += 1,
                PixelQuality::Invalid(ErrorKind::SingularMatrix) => acc.singular += 1,
                PixelQuality::Invalid(ErrorKind::ModelFailure) => acc.model_failure += 1,
            }
            acc
        })
    }

    pub fn invalid(&self) -> usize {
        self.invalid_configuration + self.singular + self.model_failure
    }
}

/// Invert every request in parallel, preserving order.
pub fn invert_batch<F: ForwardModel + ?Sized>(
    inverter: &Inverter<'_, F>, requests: &[RetrievalRequest],
) -> Vec<InvResult<InversionOutcome>> {
    let results: Vec<_> = requests.par_iter().map(|request| inverter.invert(request)).collect();
    if tracing::enabled!(tracing::Level::DEBUG) {
        let summary = BatchSummary::from_results(&results);
        debug!(
            total = summary.total,
            converged = summary.converged,
            not_converged = summary.not_converged,
            invalid = summary.invalid(),
            "batch finished"
        );
    }
    results
}
