//! Dataset error types
//!
//! Errors raised while loading raw pools, linking, scaling down, or exporting
//! the four benchmark tables. Every variant here is fail-fast: a dataset that
//! produced one of these cannot be trusted to keep foreign-key integrity.

use thiserror::Error;

/// Dataset operation errors
#[derive(Error, Debug)]
pub enum DatasetError {
    /// A required column is absent from a table's header row
    #[error("Table '{table}' is missing required column '{column}'")]
    MissingColumn { table: String, column: String },

    /// A cell could not be parsed into the expected type
    #[error("Invalid value in table '{table}', row {row}: {message}")]
    InvalidValue {
        table: String,
        row: usize,
        message: String,
    },

    /// The same record id appears twice in one table
    #[error("Duplicate {column} {id} in table '{table}'")]
    DuplicateId {
        table: String,
        column: String,
        id: u64,
    },

    /// A raw pool record already carries a car assignment
    #[error("Record {id} in table '{table}' is already linked to car {car_id}")]
    AlreadyLinked { table: String, id: u64, car_id: u64 },

    /// A modality record references a car that is not in the car table
    #[error("Record {id} in table '{table}' references unknown car {car_id}")]
    DanglingForeignKey { table: String, id: u64, car_id: u64 },

    /// Scale factor below 1
    #[error("Scale factor must be at least 1, got {0}")]
    InvalidScaleFactor(usize),

    /// Expected input table does not exist
    #[error("Table file not found: {0}")]
    FileNotFound(String),

    /// IO operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or writing error
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Plan file could not be parsed
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl DatasetError {
    /// Input problems the caller can fix by correcting the data or configuration
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            DatasetError::MissingColumn { .. }
                | DatasetError::InvalidValue { .. }
                | DatasetError::DuplicateId { .. }
                | DatasetError::AlreadyLinked { .. }
                | DatasetError::DanglingForeignKey { .. }
                | DatasetError::InvalidScaleFactor(_)
                | DatasetError::FileNotFound(_)
                | DatasetError::YamlError(_)
        )
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            DatasetError::MissingColumn { .. }
            | DatasetError::InvalidValue { .. }
            | DatasetError::DuplicateId { .. }
            | DatasetError::AlreadyLinked { .. }
            | DatasetError::DanglingForeignKey { .. } => "VALIDATION_FAILED",
            DatasetError::InvalidScaleFactor(_) => "INVALID_CONFIGURATION",
            DatasetError::FileNotFound(_) => "NOT_FOUND",
            DatasetError::Io(_) => "IO_ERROR",
            DatasetError::CsvError(_) => "CSV_ERROR",
            DatasetError::YamlError(_) => "YAML_ERROR",
            DatasetError::JsonError(_) => "JSON_ERROR",
        }
    }
}
