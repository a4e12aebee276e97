//! Derived metrics
//!
//! This module derives composite quantities from reconciled measurements:
//! - Body-mass index and its inverse-squared-height denominator
//! - Daily income rate
//! - Exercise rescaled to a minutes-per-day range

use crate::error::{CohortError, Result};

/// Days in one income period
pub const DAYS_PER_INCOME_PERIOD: f64 = 365.0;

/// Exercise value assigned to the cohort maximum (minutes per day)
pub const EXERCISE_SCALE_MINUTES: f64 = 960.0;

/// Calculate 1 / length² with length in centimeters (result in 1/m²)
pub fn inverse_squared_length(length_cm: Option<f64>) -> Option<f64> {
    length_cm
        .filter(|l| *l > 0.0)
        .map(|l| 1.0 / (0.01 * l).powi(2))
}

/// Calculate BMI from weight (kg) and length (cm)
pub fn body_mass_index(weight_kg: Option<f64>, length_cm: Option<f64>) -> Option<f64> {
    match (weight_kg, inverse_squared_length(length_cm)) {
        (Some(weight), Some(inverse)) => Some(weight * inverse),
        _ => None,
    }
}

/// Convert a per-period income to a daily rate
pub fn daily_income(income: Option<f64>, period_days: f64) -> Option<f64> {
    income.map(|i| i / period_days)
}

/// Scale exercise totals so the cohort maximum maps to `scale`
pub fn normalize_exercise(values: &[Option<f64>], scale: f64) -> Result<Vec<Option<f64>>> {
    let max = values
        .iter()
        .flatten()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);

    if !max.is_finite() {
        return Err(CohortError::DataError(
            "cannot normalize exercise without any recorded value".to_string(),
        ));
    }
    if max == 0.0 {
        return Err(CohortError::DataError(
            "cannot normalize exercise: cohort maximum is zero".to_string(),
        ));
    }

    Ok(values.iter().map(|v| v.map(|x| x * scale / max)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bmi() {
        let bmi = body_mass_index(Some(70.0), Some(175.0)).unwrap();
        assert!((bmi - 70.0 / (1.75 * 1.75)).abs() < 1e-9);
        assert!((bmi - 22.857).abs() < 1e-3);
    }

    #[test]
    fn test_bmi_missing_input() {
        assert_eq!(body_mass_index(None, Some(175.0)), None);
        assert_eq!(body_mass_index(Some(70.0), None), None);
        assert_eq!(body_mass_index(Some(70.0), Some(0.0)), None);
    }

    #[test]
    fn test_inverse_squared_length() {
        let inv = inverse_squared_length(Some(200.0)).unwrap();
        assert!((inv - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_daily_income() {
        let daily = daily_income(Some(36500.0), DAYS_PER_INCOME_PERIOD).unwrap();
        assert!((daily - 100.0).abs() < 1e-9);
        assert_eq!(daily_income(None, DAYS_PER_INCOME_PERIOD), None);
    }

    #[test]
    fn test_normalize_exercise() {
        let values = [Some(120.0), None, Some(480.0), Some(0.0)];
        let scaled = normalize_exercise(&values, EXERCISE_SCALE_MINUTES).unwrap();
        assert_eq!(scaled, vec![Some(240.0), None, Some(960.0), Some(0.0)]);
    }

    #[test]
    fn test_normalize_exercise_zero_max() {
        let values = [Some(0.0), None, Some(0.0)];
        let result = normalize_exercise(&values, EXERCISE_SCALE_MINUTES);
        assert!(matches!(result, Err(CohortError::DataError(_))));

        let result = normalize_exercise(&[None, None], EXERCISE_SCALE_MINUTES);
        assert!(matches!(result, Err(CohortError::DataError(_))));
    }
}
