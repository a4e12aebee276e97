//! Energy expenditure model
//!
//! Resting energy expenditure follows the Schofield equations, as tabulated in
//! "Human energy requirements", Report of a Joint FAO/WHO/UNU Expert
//! Consultation, Rome, 17-24 October 2001. Activity energy is a single
//! kcal-per-minute constant estimated from an independent calibration sample.

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{CohortError, Result};
use crate::normalizer::parse_locale_float;
use crate::source::ActivitySession;
use crate::types::Sex;

/// Weight gain per kilocalorie of surplus (kg/kcal), Katan & Ludwig (2010)
pub const THERMOGENESIS_KG_PER_KCAL: f64 = 1.0 / 7700.0;

/// Age brackets of the Schofield equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeBracket {
    /// Up to and including 30 years
    UpTo30 = 0,
    /// Above 30, up to and including 60 years
    From30To60 = 1,
    /// Above 60 years
    Over60 = 2,
}

impl AgeBracket {
    pub fn from_age(age: f64) -> Self {
        if age <= 30.0 {
            AgeBracket::UpTo30
        } else if age <= 60.0 {
            AgeBracket::From30To60
        } else {
            AgeBracket::Over60
        }
    }
}

/// Resting energy expenditure `constant + slope * weight` (kcal/day)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RestingEnergy {
    pub constant: f64,
    pub slope: f64,
}

const fn coefficients(constant: f64, slope: f64) -> RestingEnergy {
    RestingEnergy { constant, slope }
}

/// Schofield coefficients, indexed by `[sex][age bracket]`
pub const SCHOFIELD_TABLE: [[RestingEnergy; 3]; 2] = [
    // Male
    [
        coefficients(692.2, 15.057),
        coefficients(873.1, 11.472),
        coefficients(587.7, 11.711),
    ],
    // Female
    [
        coefficients(486.6, 14.818),
        coefficients(845.6, 8.126),
        coefficients(658.5, 9.082),
    ],
];

/// Look up the Schofield coefficients for a subject
pub fn resting_energy(sex: Sex, age: f64) -> RestingEnergy {
    let row = match sex {
        Sex::Male => 0,
        Sex::Female => 1,
    };
    SCHOFIELD_TABLE[row][AgeBracket::from_age(age) as usize]
}

/// Whether a recorded session duration means "no activity recorded"
fn is_empty_duration(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed == "0"
}

/// Mean activity energy expenditure per minute over the calibration sample.
///
/// Sessions with a blank or zero duration carry no activity and are skipped,
/// as are sessions without an energy value. Returns the mean and the number of
/// sessions it was computed from.
pub fn calories_per_minute(sessions: &[ActivitySession]) -> Result<(f64, usize)> {
    let mut total = 0.0;
    let mut used = 0usize;
    let mut unusable = 0usize;

    for session in sessions {
        if is_empty_duration(&session.duration) {
            continue;
        }
        let duration = parse_locale_float(&session.duration);
        if duration == Some(0.0) {
            continue;
        }
        match (duration, session.energy_expenditure) {
            (Some(minutes), Some(kcal)) => {
                total += kcal / minutes;
                used += 1;
            }
            _ => unusable += 1,
        }
    }

    if unusable > 0 {
        warn!("Skipped {unusable} activity sessions with unreadable duration or energy value");
    }
    if used == 0 {
        return Err(CohortError::DataError(
            "activity calibration sample has no usable sessions".to_string(),
        ));
    }

    let mean = total / used as f64;
    debug!("Activity energy: {mean:.5} kcal/min from {used} sessions");
    Ok((mean, used))
}
