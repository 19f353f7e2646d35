use thiserror::Error;
use validator::ValidationErrors;

use crate::jobs::types::{JobId, JobStatus};

#[derive(Debug, Error)]
pub enum JobError {
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Handler already registered for job type: {0}")]
    AlreadyRegistered(String),

    #[error("No handler registered for job type: {0}")]
    HandlerNotFound(String),

    #[error("Invalid transition for job {id}: {from} -> {to}")]
    InvalidTransition {
        id: JobId,
        from: JobStatus,
        to: JobStatus,
    },

    #[error("Job {job_id} ({job_type}) timed out after {timeout_ms}ms")]
    Timeout {
        job_id: JobId,
        job_type: String,
        timeout_ms: u64,
    },

    #[error("Job {job_id} ({job_type}) failed: {source}")]
    Handler {
        job_id: JobId,
        job_type: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    #[error("Job store error: {0}")]
    Store(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl JobError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        JobError::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn job_not_found(id: JobId) -> Self {
        JobError::NotFound {
            entity: "Job",
            id: id.to_string(),
        }
    }

    pub fn schedule_not_found(id: uuid::Uuid) -> Self {
        JobError::NotFound {
            entity: "RecurringSchedule",
            id: id.to_string(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, JobError::Timeout { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, JobError::NotFound { .. })
    }

    /// True when the handler marked the failure with [`PermanentError`]
    /// anywhere in its error chain.
    pub fn is_permanent(&self) -> bool {
        match self {
            JobError::Handler { source, .. } => {
                source.chain().any(|cause| cause.is::<PermanentError>())
            }
            _ => false,
        }
    }

    /// Classification used when a retry policy carries no custom predicate.
    pub fn is_retryable_by_default(&self) -> bool {
        match self {
            JobError::Timeout { .. } => true,
            JobError::Handler { .. } => !self.is_permanent(),
            _ => false,
        }
    }
}

impl From<ValidationErrors> for JobError {
    fn from(errors: ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by(|a, b| a.0.cmp(&b.0));

        match fields.first() {
            Some((field, errs)) => {
                let reason = errs
                    .iter()
                    .map(|e| {
                        e.message
                            .as_ref()
                            .map(|m| m.to_string())
                            .unwrap_or_else(|| e.code.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                JobError::validation(field.to_string(), reason)
            }
            None => JobError::validation("job", errors.to_string()),
        }
    }
}

/// Marks a handler failure as fatal: the job fails without retrying.
///
/// ```ignore
/// return Err(PermanentError::new("recipient address rejected").into());
/// ```
#[derive(Debug, Error)]
#[error("{0}")]
pub struct PermanentError(pub String);

impl PermanentError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

pub type JobResult<T> = Result<T, JobError>;
