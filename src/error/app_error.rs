use thiserror::Error;

use crate::config::ConfigError;
use crate::jobs::JobError;

/// Application-wide error type returned at the binary boundary.
///
/// Module errors convert into it with `?`, keeping their source chain for
/// the final report in `main`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation error with field-specific details
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Resource not found: {entity} with {field}={value}")]
    NotFound {
        entity: String,
        field: String,
        value: String,
    },

    /// Configuration loading or validation failure
    #[error("Configuration error")]
    Config(#[from] ConfigError),

    /// Job engine or runtime failure
    #[error("Job error")]
    Job(#[source] JobError),

    /// Internal error for unexpected failures
    #[error("Internal error")]
    Internal {
        #[source]
        source: anyhow::Error,
    },
}

impl From<JobError> for AppError {
    fn from(error: JobError) -> Self {
        match error {
            JobError::Validation { field, reason } => AppError::Validation { field, reason },
            JobError::NotFound { entity, id } => AppError::NotFound {
                entity: entity.to_string(),
                field: "id".to_string(),
                value: id,
            },
            other => AppError::Job(other),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::Internal { source: error }
    }
}

/// Type alias for Result with AppError to simplify function signatures
pub type AppResult<T> = Result<T, AppError>;
