//! Error taxonomy for the score pipeline.
//!
//! Malformed rows never surface here; validation drops them. These variants
//! cover the failures a caller has to report back to the user.

use chrono::NaiveDate;
use thiserror::Error;

/// Problems with the shape of the uploaded table as a whole.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// One or more required columns have no matching header.
    #[error("missing required column(s): {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Every row was rejected during validation.
    #[error("no valid rows left after validation ({dropped} dropped)")]
    NoValidRows { dropped: usize },
}

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("no records found for student '{student_id}'")]
    StudentNotFound { student_id: String },

    /// A series point has no matching exam aggregate. Aggregates are derived
    /// from the same dataset, so this means the two were mixed up.
    #[error("no aggregate entry for student '{student_id}' on {exam_date}")]
    AggregateMismatch {
        exam_date: NaiveDate,
        student_id: String,
    },

    #[error("input table has no header row")]
    EmptyTable,

    #[error("csv decode failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ScoreError>;
