//! Cohort input sources
//!
//! The pipeline consumes three sources keyed by subject id: the survey, the
//! caloric-intake export and the activity calibration sample. They can be
//! built in memory or loaded from semicolon-delimited files.

mod loader;
mod records;

pub use loader::{load_records, read_records};
pub use records::{ActivitySession, IntakeRecord, SurveyRecord};

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use crate::config::SourceFiles;
use crate::error::{CohortError, Result};

/// The three input sources of one pipeline run
#[derive(Debug, Clone, Default)]
pub struct CohortSources {
    /// Survey rows in file order
    survey: Vec<SurveyRecord>,
    /// Intake rows by subject id
    intake: HashMap<String, IntakeRecord>,
    /// Independent activity calibration sample
    activity: Vec<ActivitySession>,
}

impl CohortSources {
    /// Build sources, rejecting duplicate subject ids in the survey or intake
    pub fn new(
        survey: Vec<SurveyRecord>,
        intake: Vec<IntakeRecord>,
        activity: Vec<ActivitySession>,
    ) -> Result<Self> {
        {
            let mut seen = HashSet::with_capacity(survey.len());
            if let Some(dup) = survey.iter().find(|r| !seen.insert(r.subject_id.as_str())) {
                return Err(CohortError::DataError(format!(
                    "duplicate subject id {} in survey source",
                    dup.subject_id
                )));
            }
        }

        let mut by_id = HashMap::with_capacity(intake.len());
        for record in intake {
            if by_id.contains_key(&record.subject_id) {
                return Err(CohortError::DataError(format!(
                    "duplicate subject id {} in intake source",
                    record.subject_id
                )));
            }
            by_id.insert(record.subject_id.clone(), record);
        }

        Ok(Self {
            survey,
            intake: by_id,
            activity,
        })
    }

    /// Load the configured files from a directory
    pub fn from_dir(dir: impl AsRef<Path>, files: &SourceFiles) -> Result<Self> {
        let dir = dir.as_ref();
        Self::new(
            load_records(&dir.join(&files.survey), files.delimiter)?,
            load_records(&dir.join(&files.intake), files.delimiter)?,
            load_records(&dir.join(&files.activity), files.delimiter)?,
        )
    }

    /// Load the three sources from arbitrary readers
    pub fn from_readers<S: Read, I: Read, A: Read>(
        survey: S,
        intake: I,
        activity: A,
        delimiter: u8,
    ) -> Result<Self> {
        Self::new(
            read_records(survey, delimiter)?,
            read_records(intake, delimiter)?,
            read_records(activity, delimiter)?,
        )
    }

    pub fn survey(&self) -> &[SurveyRecord] {
        &self.survey
    }

    pub fn activity(&self) -> &[ActivitySession] {
        &self.activity
    }

    /// Caloric intake joined onto a survey subject; missing when not exported
    pub fn energy_intake(&self, subject_id: &str) -> Option<f64> {
        self.intake
            .get(subject_id)
            .and_then(|record| record.energy_intake)
    }
}
