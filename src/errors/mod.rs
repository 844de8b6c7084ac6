//! Domain-specific error types for carbench
//!
//! # Error Categories
//!
//! - **DatasetError**: table loading, linking, scale-down and export
//! - **EvaluationError**: ground truth generation and result scoring
//!
//! Capacity shortfalls while linking are not errors. They are reported through
//! [`crate::linker::LinkReport`] and logged as warnings.
//!
//! # Examples
//!
//! ```rust
//! use carbench::errors::{DatasetError, EvaluationError};
//!
//! let err = DatasetError::MissingColumn {
//!     table: "audio".to_string(),
//!     column: "generic_problem".to_string(),
//! };
//! assert!(err.is_client_error());
//!
//! let err = EvaluationError::UnknownQuery(42);
//! assert_eq!(err.error_code(), "NOT_FOUND");
//! ```

pub mod dataset;
pub mod evaluation;

pub use dataset::DatasetError;
pub use evaluation::EvaluationError;

/// Result type alias for dataset operations
pub type DatasetResult<T> = Result<T, DatasetError>;

/// Result type alias for evaluation operations
pub type EvaluationResult<T> = Result<T, EvaluationError>;
