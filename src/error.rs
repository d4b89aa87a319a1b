//! Error types for the segmentation pipeline.
//!
//! Soft skips (a segment too short to window, an activity missing from one
//! sensor) are not errors; they are reported as data by the stage that
//! skipped them. Everything here is a hard failure that propagates.

use crate::config::ConfigError;
use crate::io::archive::ArchiveError;
use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The activity schedule lacks a key the activity table refers to.
    #[error("Activity schedule is missing key '{0}'")]
    MissingScheduleKey(String),

    /// The schedule holds a time where a date is expected, or the other way round.
    #[error("Schedule key '{key}' holds a {found}, expected a {expected}")]
    ScheduleValueKind {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A schedule value could not be parsed as a date or a time of day.
    #[error("Schedule key '{key}' has unparseable value '{value}'")]
    ScheduleValueFormat { key: String, value: String },

    /// A date and time of day do not name a single instant in the configured zone.
    #[error("Local time {0} does not exist in the configured timezone")]
    InvalidLocalTime(String),

    /// A size or selector parameter is outside its valid domain.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Arrays with incompatible shapes were combined.
    #[error("Shape mismatch at '{label}': expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        label: String,
        expected: Vec<usize>,
        found: Vec<usize>,
    },

    /// A named array was expected to be a 2-D sample matrix.
    #[error("'{label}' is {ndim}-D, expected a 2-D matrix")]
    NotAMatrix { label: String, ndim: usize },

    /// An explicit channel index lies outside the matrix.
    #[error("Column {column} out of range for '{label}' with {columns} columns")]
    ColumnOutOfRange {
        label: String,
        column: usize,
        columns: usize,
    },

    /// A CSV sample matrix could not be read.
    #[error("CSV error in {path}: {message}")]
    Csv { path: String, message: String },

    /// Archive persistence failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The run configuration is unreadable or invalid.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An underlying file-system error occurred.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON input could not be decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// Create an invalid parameter error.
    #[must_use]
    pub fn invalid_parameter(msg: impl Into<String>) -> Self {
        Self::InvalidParameter(msg.into())
    }

    /// Create a shape mismatch error.
    #[must_use]
    pub fn shape_mismatch(label: impl Into<String>, expected: &[usize], found: &[usize]) -> Self {
        Self::ShapeMismatch {
            label: label.into(),
            expected: expected.to_vec(),
            found: found.to_vec(),
        }
    }
}
