//! Pipeline orchestration
//!
//! This module provides the public API for building the cohort tables.
//! It runs every stage once per call, from raw source records to the aligned
//! output rows.

use chrono::Utc;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::path::Path;
use uuid::Uuid;

use crate::calibration::BodyImageCalibrator;
use crate::completeness::CompletenessFilter;
use crate::config::PipelineConfig;
use crate::energy::{calories_per_minute, resting_energy, THERMOGENESIS_KG_PER_KCAL};
use crate::error::{CohortError, Result};
use crate::features::{body_mass_index, daily_income, inverse_squared_length, normalize_exercise};
use crate::normalizer::ValueNormalizer;
use crate::reconcile::MeasurementReconciler;
use crate::source::{CohortSources, SurveyRecord};
use crate::types::{
    CohortRow, CohortSummary, CohortTables, CompleteSubject, Ethnicity, Sex, StateMeasurements,
    StateVariables, SubjectRecord, WeightCoefficients, WeightModelMeasurements,
};
use crate::VERSION;

/// Build the cohort tables with the default configuration.
///
/// # Example
/// ```ignore
/// let sources = CohortSources::from_dir("data", &SourceFiles::default())?;
/// let tables = build_cohort(&sources)?;
/// let dutch = tables.selector().by_ethnicity("NL")?;
/// ```
pub fn build_cohort(sources: &CohortSources) -> Result<CohortTables> {
    CohortPipeline::default().run(sources)
}

/// Load the configured source files from `dir` and build the cohort tables
pub fn build_cohort_from_dir(dir: impl AsRef<Path>, config: PipelineConfig) -> Result<CohortTables> {
    let sources = CohortSources::from_dir(dir, &config.sources)?;
    CohortPipeline::new(config).run(&sources)
}

/// One configured pipeline run.
///
/// Pipeline stages:
/// 1. ValueNormalizer - Sentinel codes to missing, optional scale reversal
/// 2. MeasurementReconciler - Lab values backfilled with self reports
/// 3. DerivedMetrics - BMI, inverse squared length, income and exercise rates
/// 4. CompletenessFilter - Drop subjects with any missing variable
/// 5. BodyImageCalibrator - Ideal body image onto the BMI scale
/// 6. EnergyExpenditureModel - Schofield coefficients and activity energy
#[derive(Debug, Clone, Default)]
pub struct CohortPipeline {
    config: PipelineConfig,
}

impl CohortPipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all stages over the given sources
    pub fn run(&self, sources: &CohortSources) -> Result<CohortTables> {
        let subjects_read = sources.survey().len();
        info!("Building cohort tables from {subjects_read} survey subjects");

        // Stages 1-3: per-subject records with explicit missingness
        let records = self.build_records(sources)?;

        // Stage 4: whole-record completeness filter
        let (complete, mask) = CompletenessFilter::retain_complete(records)?;
        let excluded = mask.iter().filter(|excluded| **excluded).count();
        info!(
            "Retained {} of {subjects_read} subjects ({excluded} incomplete)",
            complete.len()
        );
        if complete.is_empty() {
            return Err(CohortError::DataError(
                "no subject has a complete record".to_string(),
            ));
        }

        // Stage 5: body-image calibration on the filtered cohort
        let objective_ideal_bmi = self.calibrate_ideal_bmi(&complete)?;

        // Stage 6: activity energy from the calibration sample
        let (kcal_per_minute, sessions_used) = calories_per_minute(sources.activity())?;

        let rows: Vec<CohortRow> = complete
            .into_iter()
            .zip(objective_ideal_bmi)
            .map(|(subject, ideal_bmi)| assemble_row(subject, ideal_bmi, kcal_per_minute))
            .collect();

        let mut ethnicity_counts = BTreeMap::new();
        for row in &rows {
            *ethnicity_counts.entry(row.ethnicity.to_string()).or_insert(0) += 1;
        }

        let summary = CohortSummary {
            run_id: Uuid::new_v4(),
            version: VERSION.to_string(),
            computed_at: Utc::now(),
            subjects_read,
            subjects_retained: rows.len(),
            subjects_excluded: excluded,
            activity_sessions_used: sessions_used,
            ethnicity_counts,
        };
        debug!("Cohort summary: {summary:?}");

        Ok(CohortTables::new(rows, summary))
    }

    fn build_records(&self, sources: &CohortSources) -> Result<Vec<SubjectRecord>> {
        let survey = sources.survey();
        if survey.is_empty() {
            return Err(CohortError::DataError("survey source is empty".to_string()));
        }

        let sentinel = self.config.missing_sentinel;
        let reverse = self.config.reverse_scales;
        let normalize = |values: &[Option<f64>], reverse_scale: bool| {
            ValueNormalizer::normalize_with_sentinel(values, sentinel, reverse_scale)
        };

        let ethnicity = normalize(&survey_column(survey, |r| r.ethnicity_code), false)?;
        let stress = normalize(&survey_column(survey, |r| r.stress), reverse.stress)?;
        let sleep = normalize(&survey_column(survey, |r| r.sleep_hours), reverse.sleep)?;
        let discrimination = normalize(
            &survey_column(survey, |r| r.discrimination),
            reverse.discrimination,
        )?;
        let energy_intake = normalize(
            &survey_column(survey, |r| sources.energy_intake(&r.subject_id)),
            false,
        )?;
        let income: Vec<Option<f64>> = normalize(&survey_column(survey, |r| r.income), false)?
            .into_iter()
            .map(|v| daily_income(v, self.config.income_period_days))
            .collect();
        let exercise = normalize_exercise(
            &normalize(&survey_column(survey, |r| r.exercise_total), false)?,
            self.config.exercise_scale_minutes,
        )?;

        let age = normalize(&survey_column(survey, |r| r.age), false)?;
        let sex = self.normalize_sex(&normalize(&survey_column(survey, |r| r.sex_code), false)?);
        let body_image_picture = normalize(
            &survey_column(survey, |r| r.body_image_picture),
            reverse.body_image_picture,
        )?;
        let ideal_body_image = normalize(
            &survey_column(survey, |r| r.ideal_body_image),
            reverse.ideal_body_image,
        )?;

        let measured_weight: Vec<&str> = survey.iter().map(|r| r.measured_weight.as_str()).collect();
        let weight = normalize(
            &MeasurementReconciler::reconcile(
                &measured_weight,
                &survey_column(survey, |r| r.reported_weight),
            )?,
            false,
        )?;
        let measured_length: Vec<&str> = survey.iter().map(|r| r.measured_length.as_str()).collect();
        let length = normalize(
            &MeasurementReconciler::reconcile(
                &measured_length,
                &survey_column(survey, |r| r.reported_length),
            )?,
            false,
        )?;

        let records = survey
            .iter()
            .enumerate()
            .map(|(i, record)| SubjectRecord {
                subject_id: record.subject_id.clone(),
                ethnicity: Ethnicity::from_code(ethnicity[i]),
                state: StateMeasurements {
                    stress: stress[i],
                    weight: weight[i],
                    sleep: sleep[i],
                    energy_intake: energy_intake[i],
                    income: income[i],
                    bmi: body_mass_index(weight[i], length[i]),
                    exercise: exercise[i],
                    discrimination: discrimination[i],
                },
                weight_model: WeightModelMeasurements {
                    sex: sex[i],
                    age: age[i],
                    length: length[i],
                    inverse_squared_length: inverse_squared_length(length[i]),
                    body_image_picture: body_image_picture[i],
                    ideal_body_image: ideal_body_image[i],
                },
            })
            .collect();

        Ok(records)
    }

    /// Map sex codes; unrecognized codes become missing so the subject is excluded
    fn normalize_sex(&self, codes: &[Option<f64>]) -> Vec<Option<Sex>> {
        let mut unrecognized = 0usize;
        let sex = codes
            .iter()
            .map(|code| {
                code.and_then(|c| {
                    let sex = Sex::from_code(c);
                    if sex.is_none() {
                        unrecognized += 1;
                    }
                    sex
                })
            })
            .collect();
        if unrecognized > 0 {
            warn!("{unrecognized} subjects have an unrecognized sex code and are treated as missing");
        }
        sex
    }

    /// Fit BMI on the picture scale and project the ideal body image
    fn calibrate_ideal_bmi(&self, complete: &[CompleteSubject]) -> Result<Vec<f64>> {
        let picture: Vec<f64> = complete.iter().map(|s| s.body_image_picture).collect();
        let bmi: Vec<f64> = complete.iter().map(|s| s.bmi).collect();
        let params = BodyImageCalibrator::new(self.config.odr).fit(&picture, &bmi)?;
        info!(
            "Body-image calibration: BMI = {:.4} + {:.4} * picture",
            params.intercept, params.slope
        );

        let ideal: Vec<f64> = complete.iter().map(|s| s.ideal_body_image).collect();
        Ok(BodyImageCalibrator::project(&params, &ideal))
    }
}

fn survey_column(
    survey: &[SurveyRecord],
    field: impl Fn(&SurveyRecord) -> Option<f64>,
) -> Vec<Option<f64>> {
    survey.iter().map(field).collect()
}

fn assemble_row(subject: CompleteSubject, objective_ideal_bmi: f64, kcal_per_minute: f64) -> CohortRow {
    let resting = resting_energy(subject.sex, subject.age);
    CohortRow {
        variables: StateVariables {
            perceived_fatness: subject.bmi - objective_ideal_bmi,
            stress: subject.stress,
            weight: subject.weight,
            sleep: subject.sleep,
            energy_intake: subject.energy_intake,
            income: subject.income,
            exercise: subject.exercise,
            discrimination: subject.discrimination,
        },
        weights: WeightCoefficients {
            resting_energy_constant: resting.constant,
            objective_ideal_bmi,
            resting_energy_slope: resting.slope,
            inverse_squared_length: subject.inverse_squared_length,
            activity_kcal_per_minute: kcal_per_minute,
            thermogenesis: THERMOGENESIS_KG_PER_KCAL,
        },
        subject_id: subject.subject_id,
        ethnicity: subject.ethnicity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{ActivitySession, IntakeRecord};
    use crate::types::{STATE_VARIABLE_COUNT, WEIGHT_COEFFICIENT_COUNT};
    use pretty_assertions::assert_eq;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[allow(clippy::too_many_arguments)]
    fn subject(
        id: &str,
        ethnicity: f64,
        sex: f64,
        age: f64,
        weight: (&str, f64),
        length: (&str, f64),
        picture: f64,
        ideal: f64,
    ) -> SurveyRecord {
        SurveyRecord {
            subject_id: id.to_string(),
            ethnicity_code: Some(ethnicity),
            stress: id.parse().ok(),
            measured_weight: weight.0.to_string(),
            reported_weight: Some(weight.1),
            sleep_hours: Some(7.0),
            income: Some(36500.0),
            exercise_total: Some(480.0),
            discrimination: Some(1.5),
            sex_code: Some(sex),
            age: Some(age),
            measured_length: length.0.to_string(),
            reported_length: Some(length.1),
            body_image_picture: Some(picture),
            ideal_body_image: Some(ideal),
        }
    }

    fn intake(id: &str, kcal: f64) -> IntakeRecord {
        IntakeRecord {
            subject_id: id.to_string(),
            energy_intake: Some(kcal),
        }
    }

    fn session(duration: &str, kcal: f64) -> ActivitySession {
        ActivitySession {
            subject_id: "a".to_string(),
            duration: duration.to_string(),
            energy_expenditure: Some(kcal),
        }
    }

    fn sample_sources() -> CohortSources {
        let mut heavy_exerciser = subject("4", 1.0, 1.0, 52.0, ("90", 88.0), ("175", 176.0), 7.0, 5.0);
        heavy_exerciser.exercise_total = Some(960.0);

        let survey = vec![
            subject("1", 1.0, 1.0, 25.0, ("80,0", 79.0), ("180", 181.0), 5.0, 4.0),
            subject("2", 2.0, 2.0, 45.0, ("", 62.0), ("165,5", 166.0), 3.0, 3.0),
            subject("3", 8.0, 2.0, 65.0, ("70", 71.0), ("", 160.0), 6.0, 4.0),
            heavy_exerciser,
            // Unrecognized sex code
            subject("5", 1.0, 3.0, 40.0, ("75", 75.0), ("170", 170.0), 5.0, 4.0),
            // Weight missing in both sources
            subject("6", 8.0, 1.0, 33.0, ("", -1.0), ("172", 172.0), 4.0, 4.0),
            // No intake record
            subject("7", 2.0, 2.0, 28.0, ("60", 60.0), ("160", 160.0), 3.0, 2.0),
            subject("8", 5.0, 2.0, 38.0, ("58", 58.0), ("168", 168.0), 4.0, 3.0),
        ];
        let intake = ["1", "2", "3", "4", "5", "6", "8"]
            .iter()
            .map(|id| intake(id, 2000.0))
            .collect();
        let activity = vec![
            session("60", 300.0),
            session("", 10.0),
            session("0", 5.0),
            session("30", 240.0),
        ];

        CohortSources::new(survey, intake, activity).unwrap()
    }

    #[test]
    fn test_excludes_incomplete_subjects() {
        init_logging();
        let tables = build_cohort(&sample_sources()).unwrap();

        let ids: Vec<_> = tables.rows().iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3", "4", "8"]);
        assert_eq!(
            tables.ethnicities(),
            vec![
                Ethnicity::Dutch,
                Ethnicity::Hindustani,
                Ethnicity::Moroccan,
                Ethnicity::Dutch,
                Ethnicity::Other(5),
            ]
        );

        let summary = tables.summary();
        assert_eq!(summary.subjects_read, 8);
        assert_eq!(summary.subjects_retained, 5);
        assert_eq!(summary.subjects_excluded, 3);
        assert_eq!(summary.activity_sessions_used, 2);
        assert_eq!(summary.ethnicity_counts.get("NL"), Some(&2));
        assert_eq!(summary.ethnicity_counts.get("other:5"), Some(&1));
    }

    #[test]
    fn test_tables_are_aligned_and_complete() {
        let tables = build_cohort(&sample_sources()).unwrap();
        let variables = tables.variables_table();
        let weights = tables.weights_table();

        assert_eq!(variables.len(), STATE_VARIABLE_COUNT);
        assert_eq!(weights.len(), WEIGHT_COEFFICIENT_COUNT);
        for row in variables.iter().chain(&weights) {
            assert_eq!(row.len(), tables.ethnicities().len());
            assert!(row.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn test_reconciled_and_derived_values() {
        let tables = build_cohort(&sample_sources()).unwrap();
        let rows = tables.rows();

        // Lab weight preferred, self report backfills a blank lab value
        assert_eq!(rows[0].variables.weight, 80.0);
        assert_eq!(rows[1].variables.weight, 62.0);
        // Blank lab length backfilled with the self report
        assert!((rows[2].weights.inverse_squared_length - 1.0 / (1.6 * 1.6)).abs() < 1e-9);

        assert!((rows[0].variables.income - 100.0).abs() < 1e-9);
        assert!((rows[0].variables.exercise - 480.0).abs() < 1e-9);
        assert!((rows[3].variables.exercise - 960.0).abs() < 1e-9);
    }

    #[test]
    fn test_perceived_fatness_residual() {
        let tables = build_cohort(&sample_sources()).unwrap();
        for row in tables.rows() {
            let bmi = row.variables.weight * row.weights.inverse_squared_length;
            let reconstructed = row.variables.perceived_fatness + row.weights.objective_ideal_bmi;
            assert!((reconstructed - bmi).abs() < 1e-9);
        }
    }

    #[test]
    fn test_energy_coefficients() {
        let tables = build_cohort(&sample_sources()).unwrap();
        let rows = tables.rows();

        assert_eq!(rows[0].weights.resting_energy_constant, 692.2);
        assert_eq!(rows[0].weights.resting_energy_slope, 15.057);
        assert_eq!(rows[1].weights.resting_energy_constant, 845.6);
        assert_eq!(rows[2].weights.resting_energy_slope, 9.082);
        for row in rows {
            // (300 / 60 + 240 / 30) / 2
            assert!((row.weights.activity_kcal_per_minute - 6.5).abs() < 1e-12);
            assert_eq!(row.weights.thermogenesis, 1.0 / 7700.0);
        }
    }

    #[test]
    fn test_reversed_scale() {
        let plain = build_cohort(&sample_sources()).unwrap();
        assert_eq!(plain.rows()[0].variables.stress, 1.0);

        let mut config = PipelineConfig::default();
        config.reverse_scales.stress = true;
        let pipeline = CohortPipeline::new(config);
        assert!(pipeline.config().reverse_scales.stress);
        assert!(!pipeline.config().reverse_scales.sleep);
        let reversed = pipeline.run(&sample_sources()).unwrap();
        // Stress codes 1..=8, reflected about 8
        assert_eq!(reversed.rows()[0].variables.stress, 7.0);
        assert_eq!(reversed.rows()[4].variables.stress, 0.0);
    }

    #[test]
    fn test_sentinels_removed_before_derivation() {
        let mut negative_income = subject("2", 1.0, 2.0, 44.0, ("64", 64.0), ("166", 166.0), 4.0, 3.0);
        negative_income.income = Some(-1.0);

        let survey = vec![
            subject("1", 1.0, 1.0, 30.0, ("80", 80.0), ("180", 180.0), 5.0, 4.0),
            negative_income,
            // Length coded missing in both sources
            subject("3", 2.0, 1.0, 50.0, ("75", 75.0), ("-1", -1.0), 5.0, 4.0),
            // Lab weight coded missing, self report not used
            subject("4", 8.0, 2.0, 36.0, ("-1", 70.0), ("170", 170.0), 6.0, 3.0),
            subject("5", 2.0, 2.0, 61.0, ("58", 58.0), ("158", 158.0), 3.0, 2.0),
            subject("6", 8.0, 1.0, 27.0, ("92", 92.0), ("183", 183.0), 6.0, 4.0),
        ];
        let intake = ["1", "2", "3", "4", "5", "6"]
            .iter()
            .map(|id| intake(id, 2000.0))
            .collect();
        let sources = CohortSources::new(survey, intake, vec![session("60", 300.0)]).unwrap();

        let tables = build_cohort(&sources).unwrap();
        let ids: Vec<_> = tables.rows().iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5", "6"]);
        assert_eq!(tables.summary().subjects_excluded, 3);
        for row in tables.rows() {
            assert!(row.variables.income > 0.0);
            assert!(row.variables.weight > 0.0);
            assert!(row.weights.inverse_squared_length < 1.0);
        }
    }

    #[test]
    fn test_empty_survey() {
        let sources = CohortSources::new(vec![], vec![], vec![]).unwrap();
        let result = build_cohort(&sources);
        assert!(matches!(result, Err(CohortError::DataError(_))));
    }

    #[test]
    fn test_no_complete_subject() {
        let survey = vec![subject("1", 1.0, 1.0, 30.0, ("80", 80.0), ("180", 180.0), 4.0, 3.0)];
        let sources = CohortSources::new(survey, vec![], vec![session("10", 50.0)]).unwrap();
        let result = build_cohort(&sources);
        assert!(matches!(result, Err(CohortError::DataError(_))));
    }

    #[test]
    fn test_build_from_csv_readers() {
        init_logging();
        let survey = "Heliusnr;H1_EtnTotaal;H1_PsychStress;H1_LO_GemGewicht;H1_Gewicht;H1_SlaapInUren;inkomen;H1_Squash_totmwk;H1_Discr_meanscore;H1_geslacht;H1_lft;H1_LO_GemLengte;H1_Lengte;H1_LichGelijk_unjumbled;H1_LichWens_unjumbled\n\
            1;1;2;81,5;80;7;36500;300;1,2;1;29;181;180;5;4\n\
            2;2;3;;64;6,5;29200;600;2;2;47;164,5;165;3;3\n\
            3;8;-1;70;71;8;18250;150;1,5;2;62;160;161;6;4\n\
            4;1;1;95;94;7,5;43800;450;1;1;55;178;178;7;5\n";
        let intake = "Heliusnr;ENKcal_Sum\n1;2400\n2;1900,5\n3;2100\n4;2600\n";
        let activity = "Heliusnr;H1_Squash_totmwk;AEE_mean\n1;60;420\n2; ;100\n3;0;10\n";

        let sources =
            CohortSources::from_readers(survey.as_bytes(), intake.as_bytes(), activity.as_bytes(), b';')
                .unwrap();
        let tables = build_cohort(&sources).unwrap();

        // Subject 3 has a sentinel stress score
        let ids: Vec<_> = tables.rows().iter().map(|r| r.subject_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "4"]);
        assert_eq!(tables.rows()[0].variables.weight, 81.5);
        assert_eq!(tables.rows()[1].variables.energy_intake, 1900.5);
        assert!((tables.rows()[0].weights.activity_kcal_per_minute - 7.0).abs() < 1e-12);
    }
}
