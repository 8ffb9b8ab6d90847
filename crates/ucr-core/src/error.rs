//! Error types for the pipeline.

use std::path::PathBuf;

use thiserror::Error;

/// Pipeline error type.
///
/// Every variant is fatal to the category (and run) that raised it; callers
/// abort before the estimator runs or before any artifact is written.
#[derive(Error, Debug)]
pub enum Error {
    /// An input file does not exist.
    #[error("missing file: {}", .0.display())]
    MissingFile(PathBuf),

    /// An expected column is absent from an input table or panel.
    #[error("schema mismatch: column '{column}' not found in {context}")]
    SchemaMismatch {
        /// Column that was looked up.
        column: String,
        /// Where the lookup happened (file path or stage name).
        context: String,
    },

    /// A filtering stage removed every reporting unit.
    #[error("empty panel after {stage}: no reporting unit survived")]
    EmptyPanelAfterFilter {
        /// Stage that emptied the panel.
        stage: String,
    },

    /// The group-time ATT estimator rejected its input.
    #[error("estimator failure: {0}")]
    EstimatorFailure(String),

    /// A date key did not match the period index (and is not a missing onset).
    #[error("join miss: {which} key {key} for unit {unit} is not in the period index")]
    JoinMiss {
        /// Which date column missed (`date` or `onset`).
        which: &'static str,
        /// The month key that failed to match.
        key: String,
        /// Reporting unit of the offending row.
        unit: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV read/write error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Computation error
    #[error("Computation error: {0}")]
    Computation(String),
}

impl Error {
    /// Shorthand for [`Error::SchemaMismatch`].
    pub fn schema(column: impl Into<String>, context: impl Into<String>) -> Self {
        Error::SchemaMismatch { column: column.into(), context: context.into() }
    }

    /// Shorthand for [`Error::EmptyPanelAfterFilter`].
    pub fn empty_after(stage: impl Into<String>) -> Self {
        Error::EmptyPanelAfterFilter { stage: stage.into() }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
