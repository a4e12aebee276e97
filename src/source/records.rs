//! Source record definitions
//!
//! One struct per input file. Column names follow the cohort's export format;
//! numeric columns use a comma as decimal separator.

use serde::{Deserialize, Serialize};

/// Anthropometric and psychosocial survey row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyRecord {
    #[serde(rename = "Heliusnr")]
    pub subject_id: String,

    /// Raw ethnicity code
    #[serde(rename = "H1_EtnTotaal", default, with = "locale_float")]
    pub ethnicity_code: Option<f64>,

    #[serde(rename = "H1_PsychStress", default, with = "locale_float")]
    pub stress: Option<f64>,

    /// Lab-measured weight (kg), kept as text
    #[serde(rename = "H1_LO_GemGewicht", default)]
    pub measured_weight: String,

    /// Self-reported weight (kg)
    #[serde(rename = "H1_Gewicht", default, with = "locale_float")]
    pub reported_weight: Option<f64>,

    #[serde(rename = "H1_SlaapInUren", default, with = "locale_float")]
    pub sleep_hours: Option<f64>,

    /// Income per period
    #[serde(rename = "inkomen", default, with = "locale_float")]
    pub income: Option<f64>,

    /// Weekly exercise total
    #[serde(rename = "H1_Squash_totmwk", default, with = "locale_float")]
    pub exercise_total: Option<f64>,

    #[serde(rename = "H1_Discr_meanscore", default, with = "locale_float")]
    pub discrimination: Option<f64>,

    #[serde(rename = "H1_geslacht", default, with = "locale_float")]
    pub sex_code: Option<f64>,

    #[serde(rename = "H1_lft", default, with = "locale_float")]
    pub age: Option<f64>,

    /// Lab-measured length (cm), kept as text
    #[serde(rename = "H1_LO_GemLengte", default)]
    pub measured_length: String,

    /// Self-reported length (cm)
    #[serde(rename = "H1_Lengte", default, with = "locale_float")]
    pub reported_length: Option<f64>,

    #[serde(rename = "H1_LichGelijk_unjumbled", default, with = "locale_float")]
    pub body_image_picture: Option<f64>,

    #[serde(rename = "H1_LichWens_unjumbled", default, with = "locale_float")]
    pub ideal_body_image: Option<f64>,
}

/// Caloric intake row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IntakeRecord {
    #[serde(rename = "Heliusnr")]
    pub subject_id: String,

    /// Total energy intake (kcal)
    #[serde(rename = "ENKcal_Sum", default, with = "locale_float")]
    pub energy_intake: Option<f64>,
}

/// Activity calibration row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivitySession {
    #[serde(rename = "Heliusnr")]
    pub subject_id: String,

    /// Recorded activity minutes, kept as text since blank and "0" mean no activity
    #[serde(rename = "H1_Squash_totmwk", default)]
    pub duration: String,

    /// Mean activity energy expenditure (kcal)
    #[serde(rename = "AEE_mean", default, with = "locale_float")]
    pub energy_expenditure: Option<f64>,
}

/// Serde adapter for comma-decimal numeric cells
mod locale_float {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::normalizer::parse_locale_float;

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(v),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(parse_locale_float))
    }
}
