//! Core types for the cohort pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: partially observed subject records, complete subjects, and the
//! aligned output rows exposed to modeling code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::CohortError;

/// Raw ethnicity code for the Dutch group
pub const ETHNICITY_CODE_DUTCH: i64 = 1;
/// Raw ethnicity code for the Hindustani Surinamese group
pub const ETHNICITY_CODE_HINDUSTANI: i64 = 2;
/// Raw ethnicity code for the Moroccan group
pub const ETHNICITY_CODE_MOROCCAN: i64 = 8;

/// Raw sex code for male subjects
pub const SEX_CODE_MALE: f64 = 1.0;
/// Raw sex code for female subjects
pub const SEX_CODE_FEMALE: f64 = 2.0;

/// Number of rows in the state-variable table
pub const STATE_VARIABLE_COUNT: usize = 8;
/// Number of rows in the weight-model table
pub const WEIGHT_COEFFICIENT_COUNT: usize = 6;

/// Row names of the state-variable table, in output order
pub const STATE_VARIABLE_NAMES: [&str; STATE_VARIABLE_COUNT] = [
    "perceived_fatness",
    "stress",
    "weight",
    "sleep",
    "energy_intake",
    "income",
    "exercise",
    "discrimination",
];

/// Row names of the weight-model table, in output order
pub const WEIGHT_COEFFICIENT_NAMES: [&str; WEIGHT_COEFFICIENT_COUNT] = [
    "resting_energy_constant",
    "objective_ideal_bmi",
    "resting_energy_slope",
    "inverse_squared_length",
    "activity_kcal_per_minute",
    "thermogenesis",
];

/// Ethnic group of a subject
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Ethnicity {
    Dutch,
    Hindustani,
    Moroccan,
    /// A recorded code outside the groups used downstream
    Other(i64),
    Unrecorded,
}

impl Ethnicity {
    /// Groups that can be selected by label
    pub const SELECTABLE: [Ethnicity; 3] =
        [Ethnicity::Dutch, Ethnicity::Hindustani, Ethnicity::Moroccan];

    /// Map a normalized ethnicity code to a group; non-integral codes are unrecorded
    pub fn from_code(code: Option<f64>) -> Self {
        match code {
            Some(c) if c.is_finite() && c.fract() == 0.0 => match c as i64 {
                ETHNICITY_CODE_DUTCH => Ethnicity::Dutch,
                ETHNICITY_CODE_HINDUSTANI => Ethnicity::Hindustani,
                ETHNICITY_CODE_MOROCCAN => Ethnicity::Moroccan,
                other => Ethnicity::Other(other),
            },
            _ => Ethnicity::Unrecorded,
        }
    }

    /// Raw source code, if one was recorded
    pub fn code(&self) -> Option<i64> {
        match self {
            Ethnicity::Dutch => Some(ETHNICITY_CODE_DUTCH),
            Ethnicity::Hindustani => Some(ETHNICITY_CODE_HINDUSTANI),
            Ethnicity::Moroccan => Some(ETHNICITY_CODE_MOROCCAN),
            Ethnicity::Other(code) => Some(*code),
            Ethnicity::Unrecorded => None,
        }
    }

    /// Selection label for the groups used downstream
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Ethnicity::Dutch => Some("NL"),
            Ethnicity::Hindustani => Some("HIND"),
            Ethnicity::Moroccan => Some("MAROK"),
            _ => None,
        }
    }
}

impl fmt::Display for Ethnicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ethnicity::Other(code) => write!(f, "other:{code}"),
            Ethnicity::Unrecorded => write!(f, "unrecorded"),
            group => write!(f, "{}", group.label().unwrap_or_default()),
        }
    }
}

impl FromStr for Ethnicity {
    type Err = CohortError;

    fn from_str(label: &str) -> Result<Self, Self::Err> {
        Ethnicity::SELECTABLE
            .into_iter()
            .find(|group| {
                group
                    .label()
                    .is_some_and(|l| l.eq_ignore_ascii_case(label.trim()))
            })
            .ok_or_else(|| {
                CohortError::LookupError(format!(
                    "unrecognized ethnicity label '{label}', expected one of NL, HIND, MAROK"
                ))
            })
    }
}

/// Biological sex as used by the Schofield equations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    /// Map a raw sex code; unrecognized codes yield `None`
    pub fn from_code(code: f64) -> Option<Self> {
        if code == SEX_CODE_MALE {
            Some(Sex::Male)
        } else if code == SEX_CODE_FEMALE {
            Some(Sex::Female)
        } else {
            None
        }
    }

    pub fn code(self) -> f64 {
        match self {
            Sex::Male => SEX_CODE_MALE,
            Sex::Female => SEX_CODE_FEMALE,
        }
    }
}

/// Normalized state variables of one subject, possibly incomplete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateMeasurements {
    /// Psychological stress score
    pub stress: Option<f64>,
    /// Reconciled body weight (kg)
    pub weight: Option<f64>,
    /// Sleep duration (hours)
    pub sleep: Option<f64>,
    /// Caloric intake (kcal)
    pub energy_intake: Option<f64>,
    /// Income per day
    pub income: Option<f64>,
    /// Body-mass index (kg/m²)
    pub bmi: Option<f64>,
    /// Exercise (minutes per day scale)
    pub exercise: Option<f64>,
    /// Mean discrimination score
    pub discrimination: Option<f64>,
}

impl StateMeasurements {
    pub fn columns(&self) -> [Option<f64>; STATE_VARIABLE_COUNT] {
        [
            self.stress,
            self.weight,
            self.sleep,
            self.energy_intake,
            self.income,
            self.bmi,
            self.exercise,
            self.discrimination,
        ]
    }
}

/// Normalized weight-model variables of one subject, possibly incomplete
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeightModelMeasurements {
    /// Sex; `None` when absent or unrecognized
    pub sex: Option<Sex>,
    /// Age (years)
    pub age: Option<f64>,
    /// Reconciled length (cm)
    pub length: Option<f64>,
    /// 1 / length² (1/m²)
    pub inverse_squared_length: Option<f64>,
    /// Selected body-image picture (self-perception)
    pub body_image_picture: Option<f64>,
    /// Selected ideal body-image picture
    pub ideal_body_image: Option<f64>,
}

impl WeightModelMeasurements {
    pub fn columns(&self) -> [Option<f64>; WEIGHT_COEFFICIENT_COUNT] {
        [
            self.sex.map(Sex::code),
            self.age,
            self.length,
            self.inverse_squared_length,
            self.body_image_picture,
            self.ideal_body_image,
        ]
    }
}

/// A subject after normalization, reconciliation and derivation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectRecord {
    pub subject_id: String,
    pub ethnicity: Ethnicity,
    pub state: StateMeasurements,
    pub weight_model: WeightModelMeasurements,
}

impl SubjectRecord {
    /// All state and weight-model columns, state first
    pub fn columns(&self) -> impl Iterator<Item = Option<f64>> {
        self.state
            .columns()
            .into_iter()
            .chain(self.weight_model.columns())
    }

    pub fn is_complete(&self) -> bool {
        self.columns().all(|value| value.is_some())
    }

    /// Convert into a complete subject, or `None` if any field is missing
    pub fn into_complete(self) -> Option<CompleteSubject> {
        let s = self.state;
        let w = self.weight_model;
        Some(CompleteSubject {
            subject_id: self.subject_id,
            ethnicity: self.ethnicity,
            stress: s.stress?,
            weight: s.weight?,
            sleep: s.sleep?,
            energy_intake: s.energy_intake?,
            income: s.income?,
            bmi: s.bmi?,
            exercise: s.exercise?,
            discrimination: s.discrimination?,
            sex: w.sex?,
            age: w.age?,
            length: w.length?,
            inverse_squared_length: w.inverse_squared_length?,
            body_image_picture: w.body_image_picture?,
            ideal_body_image: w.ideal_body_image?,
        })
    }
}

/// A subject with every state and weight-model variable present
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteSubject {
    pub subject_id: String,
    pub ethnicity: Ethnicity,
    pub stress: f64,
    pub weight: f64,
    pub sleep: f64,
    pub energy_intake: f64,
    pub income: f64,
    pub bmi: f64,
    pub exercise: f64,
    pub discrimination: f64,
    pub sex: Sex,
    pub age: f64,
    pub length: f64,
    pub inverse_squared_length: f64,
    pub body_image_picture: f64,
    pub ideal_body_image: f64,
}

/// Output state variables of one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StateVariables {
    /// BMI minus the calibrated ideal BMI
    pub perceived_fatness: f64,
    pub stress: f64,
    pub weight: f64,
    pub sleep: f64,
    pub energy_intake: f64,
    pub income: f64,
    pub exercise: f64,
    pub discrimination: f64,
}

impl StateVariables {
    /// Values in `STATE_VARIABLE_NAMES` order
    pub fn to_row(&self) -> [f64; STATE_VARIABLE_COUNT] {
        [
            self.perceived_fatness,
            self.stress,
            self.weight,
            self.sleep,
            self.energy_intake,
            self.income,
            self.exercise,
            self.discrimination,
        ]
    }
}

/// Output weight-model coefficients of one subject
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightCoefficients {
    /// Schofield constant term (kcal/day)
    pub resting_energy_constant: f64,
    /// Ideal body image projected onto the BMI scale
    pub objective_ideal_bmi: f64,
    /// Schofield slope term (kcal/day per kg)
    pub resting_energy_slope: f64,
    /// 1 / length² (1/m²)
    pub inverse_squared_length: f64,
    /// Activity energy expenditure (kcal per minute)
    pub activity_kcal_per_minute: f64,
    /// Weight gain per kilocalorie (kg/kcal)
    pub thermogenesis: f64,
}

impl WeightCoefficients {
    /// Values in `WEIGHT_COEFFICIENT_NAMES` order
    pub fn to_row(&self) -> [f64; WEIGHT_COEFFICIENT_COUNT] {
        [
            self.resting_energy_constant,
            self.objective_ideal_bmi,
            self.resting_energy_slope,
            self.inverse_squared_length,
            self.activity_kcal_per_minute,
            self.thermogenesis,
        ]
    }
}

/// One aligned output row: label, state variables and weight coefficients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohortRow {
    pub subject_id: String,
    pub ethnicity: Ethnicity,
    pub variables: StateVariables,
    pub weights: WeightCoefficients,
}

/// Subject-major slice of the output tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CohortSlice {
    pub subject_ids: Vec<String>,
    pub variables: Vec<[f64; STATE_VARIABLE_COUNT]>,
    pub weights: Vec<[f64; WEIGHT_COEFFICIENT_COUNT]>,
}

impl CohortSlice {
    pub(crate) fn from_rows<'a>(rows: impl IntoIterator<Item = &'a CohortRow>) -> Self {
        let mut slice = CohortSlice::default();
        for row in rows {
            slice.subject_ids.push(row.subject_id.clone());
            slice.variables.push(row.variables.to_row());
            slice.weights.push(row.weights.to_row());
        }
        slice
    }

    pub fn len(&self) -> usize {
        self.subject_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subject_ids.is_empty()
    }
}

/// Provenance and counts for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortSummary {
    pub run_id: Uuid,
    /// Crate version that produced the tables
    pub version: String,
    pub computed_at: DateTime<Utc>,
    pub subjects_read: usize,
    pub subjects_retained: usize,
    pub subjects_excluded: usize,
    pub activity_sessions_used: usize,
    /// Retained subjects per ethnicity label
    pub ethnicity_counts: BTreeMap<String, usize>,
}

/// The cleaned, aligned output of one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohortTables {
    rows: Vec<CohortRow>,
    summary: CohortSummary,
}

impl CohortTables {
    pub(crate) fn new(rows: Vec<CohortRow>, summary: CohortSummary) -> Self {
        Self { rows, summary }
    }

    pub fn rows(&self) -> &[CohortRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn summary(&self) -> &CohortSummary {
        &self.summary
    }

    /// Ethnicity label per retained subject
    pub fn ethnicities(&self) -> Vec<Ethnicity> {
        self.rows.iter().map(|row| row.ethnicity).collect()
    }

    /// Variable-major state table: one row per entry of `STATE_VARIABLE_NAMES`
    pub fn variables_table(&self) -> Vec<Vec<f64>> {
        (0..STATE_VARIABLE_COUNT)
            .map(|i| self.rows.iter().map(|row| row.variables.to_row()[i]).collect())
            .collect()
    }

    /// Variable-major weight table: one row per entry of `WEIGHT_COEFFICIENT_NAMES`
    pub fn weights_table(&self) -> Vec<Vec<f64>> {
        (0..WEIGHT_COEFFICIENT_COUNT)
            .map(|i| self.rows.iter().map(|row| row.weights.to_row()[i]).collect())
            .collect()
    }

    /// State table rows paired with their variable names
    pub fn named_variables_table(&self) -> Vec<(&'static str, Vec<f64>)> {
        STATE_VARIABLE_NAMES
            .into_iter()
            .zip(self.variables_table())
            .collect()
    }

    /// Weight table rows paired with their coefficient names
    pub fn named_weights_table(&self) -> Vec<(&'static str, Vec<f64>)> {
        WEIGHT_COEFFICIENT_NAMES
            .into_iter()
            .zip(self.weights_table())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_record() -> SubjectRecord {
        SubjectRecord {
            subject_id: "1001".to_string(),
            ethnicity: Ethnicity::Dutch,
            state: StateMeasurements {
                stress: Some(2.0),
                weight: Some(70.0),
                sleep: Some(7.5),
                energy_intake: Some(2100.0),
                income: Some(80.0),
                bmi: Some(22.9),
                exercise: Some(45.0),
                discrimination: Some(1.2),
            },
            weight_model: WeightModelMeasurements {
                sex: Some(Sex::Female),
                age: Some(41.0),
                length: Some(175.0),
                inverse_squared_length: Some(1.0 / (1.75 * 1.75)),
                body_image_picture: Some(4.0),
                ideal_body_image: Some(3.0),
            },
        }
    }

    #[test]
    fn test_ethnicity_codes() {
        assert_eq!(Ethnicity::from_code(Some(1.0)), Ethnicity::Dutch);
        assert_eq!(Ethnicity::from_code(Some(2.0)), Ethnicity::Hindustani);
        assert_eq!(Ethnicity::from_code(Some(8.0)), Ethnicity::Moroccan);
        assert_eq!(Ethnicity::from_code(Some(5.0)), Ethnicity::Other(5));
        assert_eq!(Ethnicity::from_code(None), Ethnicity::Unrecorded);
        assert_eq!(Ethnicity::Moroccan.code(), Some(8));
    }

    #[test]
    fn test_non_integral_ethnicity_code() {
        assert_eq!(Ethnicity::from_code(Some(1.5)), Ethnicity::Unrecorded);
        assert_eq!(Ethnicity::from_code(Some(8.01)), Ethnicity::Unrecorded);
        assert_eq!(Ethnicity::from_code(Some(f64::NAN)), Ethnicity::Unrecorded);
        assert_eq!(Ethnicity::from_code(Some(1.0)), Ethnicity::Dutch);
    }

    #[test]
    fn test_named_tables() {
        let row = CohortRow {
            subject_id: "1001".to_string(),
            ethnicity: Ethnicity::Dutch,
            variables: StateVariables {
                perceived_fatness: 1.5,
                stress: 2.0,
                weight: 70.0,
                sleep: 7.5,
                energy_intake: 2100.0,
                income: 80.0,
                exercise: 45.0,
                discrimination: 1.2,
            },
            weights: WeightCoefficients {
                resting_energy_constant: 845.6,
                objective_ideal_bmi: 21.4,
                resting_energy_slope: 8.126,
                inverse_squared_length: 1.0 / (1.75 * 1.75),
                activity_kcal_per_minute: 6.5,
                thermogenesis: 1.0 / 7700.0,
            },
        };
        let summary = CohortSummary {
            run_id: Uuid::new_v4(),
            version: crate::VERSION.to_string(),
            computed_at: Utc::now(),
            subjects_read: 1,
            subjects_retained: 1,
            subjects_excluded: 0,
            activity_sessions_used: 1,
            ethnicity_counts: BTreeMap::new(),
        };
        let tables = CohortTables::new(vec![row], summary);

        let variables = tables.named_variables_table();
        assert_eq!(variables.len(), STATE_VARIABLE_COUNT);
        assert_eq!(variables[2], ("weight", vec![70.0]));
        assert_eq!(variables[7], ("discrimination", vec![1.2]));

        let weights = tables.named_weights_table();
        assert_eq!(weights.len(), WEIGHT_COEFFICIENT_COUNT);
        assert_eq!(weights[1], ("objective_ideal_bmi", vec![21.4]));
        assert_eq!(weights[4], ("activity_kcal_per_minute", vec![6.5]));
    }

    #[test]
    fn test_ethnicity_labels() {
        assert_eq!("NL".parse::<Ethnicity>().unwrap(), Ethnicity::Dutch);
        assert_eq!("hind".parse::<Ethnicity>().unwrap(), Ethnicity::Hindustani);
        assert_eq!("MAROK".parse::<Ethnicity>().unwrap(), Ethnicity::Moroccan);
        assert!(matches!(
            "TURK".parse::<Ethnicity>(),
            Err(CohortError::LookupError(_))
        ));
        assert_eq!(Ethnicity::Other(4).to_string(), "other:4");
    }

    #[test]
    fn test_sex_codes() {
        assert_eq!(Sex::from_code(1.0), Some(Sex::Male));
        assert_eq!(Sex::from_code(2.0), Some(Sex::Female));
        assert_eq!(Sex::from_code(3.0), None);
    }

    #[test]
    fn test_into_complete() {
        let record = complete_record();
        assert!(record.is_complete());
        let subject = record.into_complete().unwrap();
        assert_eq!(subject.sex, Sex::Female);
        assert_eq!(subject.length, 175.0);

        let mut partial = complete_record();
        partial.weight_model.sex = None;
        assert!(!partial.is_complete());
        assert!(partial.into_complete().is_none());
    }
}
