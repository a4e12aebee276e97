//! Measurement reconciliation
//!
//! Fields measured twice (lab measurement and self report) are merged into a
//! single value per subject. The lab value wins; gaps are backfilled from the
//! self-reported value.

use crate::error::{CohortError, Result};
use crate::normalizer::ValueNormalizer;

/// Reconciler for redundant measurement sources
pub struct MeasurementReconciler;

impl MeasurementReconciler {
    /// Merge a comma-decimal primary source with a numeric secondary source
    pub fn reconcile<S: AsRef<str>>(
        primary: &[S],
        secondary: &[Option<f64>],
    ) -> Result<Vec<Option<f64>>> {
        if primary.len() != secondary.len() {
            return Err(CohortError::DataError(format!(
                "cannot reconcile sources of different length ({} vs {})",
                primary.len(),
                secondary.len()
            )));
        }

        let reconciled = ValueNormalizer::to_float(primary)
            .into_iter()
            .zip(secondary)
            .map(|(measured, reported)| measured.or(*reported))
            .collect();

        Ok(reconciled)
    }
}
