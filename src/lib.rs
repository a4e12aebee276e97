//! Cohort Energy - cleaning and derived-variable pipeline for cohort survey data
//!
//! The pipeline turns anthropometric, psychosocial and activity measurements
//! into three aligned tables for energy-balance modeling: source loading →
//! normalization → reconciliation → derived metrics → completeness filtering →
//! body-image calibration → energy expenditure coefficients.
//!
//! ## Modules
//!
//! - **Sources**: survey, caloric-intake and activity calibration records
//! - **Pipeline**: one explicit run producing immutable `CohortTables`
//! - **Selector**: slices by ethnic group or seeded random subsample

pub mod calibration;
pub mod completeness;
pub mod config;
pub mod energy;
pub mod error;
pub mod features;
pub mod normalizer;
pub mod pipeline;
pub mod reconcile;
pub mod selector;
pub mod source;
pub mod types;

pub use calibration::{BodyImageCalibrator, CalibrationParams, OdrConfig};
pub use completeness::CompletenessFilter;
pub use config::{PipelineConfig, ReverseScales, SourceFiles};
pub use energy::{resting_energy, AgeBracket, RestingEnergy, THERMOGENESIS_KG_PER_KCAL};
pub use error::CohortError;
pub use normalizer::{ValueNormalizer, MISSING_SENTINEL};
pub use pipeline::{build_cohort, build_cohort_from_dir, CohortPipeline};
pub use reconcile::MeasurementReconciler;
pub use selector::CohortSelector;
pub use source::CohortSources;
pub use types::{CohortRow, CohortSlice, CohortSummary, CohortTables, Ethnicity, Sex};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
