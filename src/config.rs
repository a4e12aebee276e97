//! Pipeline configuration
//!
//! Defaults reproduce the cohort's reference constants. The configuration can
//! be stored and restored as JSON.

use serde::{Deserialize, Serialize};

use crate::calibration::OdrConfig;
use crate::error::Result;
use crate::features::{DAYS_PER_INCOME_PERIOD, EXERCISE_SCALE_MINUTES};
use crate::normalizer::MISSING_SENTINEL;

/// Which bounded scales are reflected about their maximum during normalization
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReverseScales {
    pub stress: bool,
    pub sleep: bool,
    pub discrimination: bool,
    pub body_image_picture: bool,
    pub ideal_body_image: bool,
}

/// Input file names and format
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceFiles {
    pub survey: String,
    pub intake: String,
    pub activity: String,
    pub delimiter: u8,
}

impl Default for SourceFiles {
    fn default() -> Self {
        Self {
            survey: "data.csv".to_string(),
            intake: "energy_intake.csv".to_string(),
            activity: "squash_data.csv".to_string(),
            delimiter: b';',
        }
    }
}

/// Settings for one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Raw code for "not recorded"
    pub missing_sentinel: f64,
    pub reverse_scales: ReverseScales,
    /// Value the cohort's maximum exercise total is scaled to
    pub exercise_scale_minutes: f64,
    /// Length of the income period in days
    pub income_period_days: f64,
    pub odr: OdrConfig,
    pub sources: SourceFiles,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            missing_sentinel: MISSING_SENTINEL,
            reverse_scales: ReverseScales::default(),
            exercise_scale_minutes: EXERCISE_SCALE_MINUTES,
            income_period_days: DAYS_PER_INCOME_PERIOD,
            odr: OdrConfig::default(),
            sources: SourceFiles::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from JSON; absent fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize configuration to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
