//! Error types for the cohort pipeline

use thiserror::Error;

/// Errors that can occur while building the cohort tables
#[derive(Debug, Error)]
pub enum CohortError {
    #[error("Data error: {0}")]
    DataError(String),

    #[error("Fit error: {0}")]
    FitError(String),

    #[error("Lookup error: {0}")]
    LookupError(String),

    #[error("Range error: requested {requested} subjects but only {available} are available")]
    RangeError { requested: usize, available: usize },

    #[error("Failed to read CSV source: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, CohortError>;
