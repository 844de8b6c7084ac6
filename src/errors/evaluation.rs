//! Evaluation error types

use thiserror::Error;

use super::DatasetError;

/// Ground truth and scoring errors
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// Query id outside the catalog
    #[error("Query Q{0} is not part of the catalog")]
    UnknownQuery(u32),

    /// Engine result file lacks the column the query is scored on
    #[error("Result file for Q{query} has no column '{column}'")]
    MissingResultColumn { query: u32, column: String },

    /// Engine result value could not be interpreted
    #[error("Invalid result value for Q{query}: {message}")]
    InvalidResult { query: u32, message: String },

    /// Scale-factor tables disagree with the full dataset
    #[error("Scale factor {scale_factor} is inconsistent with the full dataset: {message}")]
    InconsistentScale { scale_factor: usize, message: String },

    /// Loading tables failed
    #[error(transparent)]
    Dataset(#[from] DatasetError),
}

impl EvaluationError {
    pub fn is_client_error(&self) -> bool {
        match self {
            EvaluationError::UnknownQuery(_)
            | EvaluationError::MissingResultColumn { .. }
            | EvaluationError::InvalidResult { .. }
            | EvaluationError::InconsistentScale { .. } => true,
            EvaluationError::Dataset(err) => err.is_client_error(),
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            EvaluationError::UnknownQuery(_) => "NOT_FOUND",
            EvaluationError::MissingResultColumn { .. } | EvaluationError::InvalidResult { .. } => {
                "VALIDATION_FAILED"
            }
            EvaluationError::InconsistentScale { .. } => "INCONSISTENT_DATA",
            EvaluationError::Dataset(err) => err.error_code(),
        }
    }
}
