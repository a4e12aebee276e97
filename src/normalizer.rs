//! Value normalization
//!
//! This module turns raw field values into `Option<f64>` measurements.
//! - Sentinel codes become the missing marker
//! - Bounded ordinal scales can be reflected about their maximum
//! - Comma-decimal strings are parsed coercively

use crate::error::{CohortError, Result};

/// Source code for "not recorded"
pub const MISSING_SENTINEL: f64 = -1.0;

/// Normalizer for raw survey columns
pub struct ValueNormalizer;

impl ValueNormalizer {
    /// Normalize a column using the default sentinel
    pub fn normalize(values: &[Option<f64>], reverse_scale: bool) -> Result<Vec<Option<f64>>> {
        Self::normalize_with_sentinel(values, MISSING_SENTINEL, reverse_scale)
    }

    /// Normalize a column, mapping `sentinel` to missing.
    ///
    /// With `reverse_scale`, every present value `v` becomes `max - v`, where
    /// `max` is the largest present value of the column.
    pub fn normalize_with_sentinel(
        values: &[Option<f64>],
        sentinel: f64,
        reverse_scale: bool,
    ) -> Result<Vec<Option<f64>>> {
        let present: Vec<Option<f64>> = values
            .iter()
            .map(|value| value.filter(|v| *v != sentinel && !v.is_nan()))
            .collect();

        if !reverse_scale {
            return Ok(present);
        }

        let max = present
            .iter()
            .flatten()
            .copied()
            .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |m| m.max(v))))
            .ok_or_else(|| {
                CohortError::DataError(
                    "cannot reverse a scale whose values are all missing".to_string(),
                )
            })?;

        Ok(present
            .into_iter()
            .map(|value| value.map(|v| max - v))
            .collect())
    }

    /// Parse comma-decimal strings; unparsable entries become missing
    pub fn to_float<S: AsRef<str>>(values: &[S]) -> Vec<Option<f64>> {
        values
            .iter()
            .map(|value| parse_locale_float(value.as_ref()))
            .collect()
    }
}

/// Parse a single comma-decimal string
pub fn parse_locale_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}
