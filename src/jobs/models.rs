use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::{JobId, JobPriority, JobStatus, Metadata};

// ============================================================================
// Job
// ============================================================================

/// A unit of deferred work.
///
/// `id`, `job_type`, `created_at`, `priority` and `payload` never change
/// after creation. Status changes go through [`Job::transition`], which
/// enforces the lifecycle table in [`JobStatus::can_transition_to`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub job_type: String,
    pub created_at: DateTime<Utc>,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub retry_count: u32,
    pub max_retries: u32,
    /// Due time for scheduled jobs, resume time for retrying ones
    pub scheduled_for: Option<DateTime<Utc>>,
    pub payload: JsonValue,
    #[serde(default)]
    pub metadata: Metadata,
    /// Schedule that materialized this job, if any
    pub recurring_id: Option<Uuid>,
    pub last_error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        job_type: impl Into<String>,
        payload: JsonValue,
        priority: JobPriority,
        max_retries: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            created_at: now,
            status: JobStatus::Pending,
            priority,
            retry_count: 0,
            max_retries,
            scheduled_for: None,
            payload,
            metadata: Metadata::new(),
            recurring_id: None,
            last_error: None,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn has_retries_remaining(&self) -> bool {
        self.retry_count < self.max_retries
    }

    /// Move to `to`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, to: JobStatus) -> JobResult<()> {
        if !self.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                from: self.status,
                to,
            });
        }

        let now = Utc::now();
        match to {
            JobStatus::Running => self.started_at = Some(now),
            JobStatus::Queued => self.scheduled_for = None,
            s if s.is_terminal() => self.completed_at = Some(now),
            _ => {}
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }
}

// ============================================================================
// NewJob
// ============================================================================

fn validate_job_type(job_type: &str) -> Result<(), ValidationError> {
    if job_type.trim().is_empty() || job_type.chars().any(char::is_whitespace) {
        let mut err = ValidationError::new("job_type");
        err.message = Some("Job type must not contain whitespace".into());
        return Err(err);
    }
    Ok(())
}

/// Caller input for creating a job
#[derive(Debug, Clone, Validate)]
pub struct NewJob {
    #[validate(
        length(min = 1, max = 128, message = "Job type must be between 1 and 128 characters"),
        custom(function = "validate_job_type")
    )]
    pub job_type: String,

    pub payload: JsonValue,

    pub priority: JobPriority,

    #[validate(range(max = 100, message = "Max retries cannot exceed 100"))]
    pub max_retries: Option<u32>,

    pub run_at: Option<DateTime<Utc>>,
}

impl NewJob {
    pub fn new(job_type: impl Into<String>, payload: JsonValue) -> Self {
        Self {
            job_type: job_type.into(),
            payload,
            priority: JobPriority::default(),
            max_retries: None,
            run_at: None,
        }
    }

    pub fn with_priority(mut self, priority: JobPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    pub fn run_at(mut self, run_at: DateTime<Utc>) -> Self {
        self.run_at = Some(run_at);
        self
    }
}

// ============================================================================
// RecurringSchedule
// ============================================================================

/// Cron-driven template that materializes one job per trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringSchedule {
    pub id: Uuid,
    pub job_type: String,
    pub payload: JsonValue,
    pub priority: JobPriority,
    pub cron_expression: String,
    pub enabled: bool,
    pub last_run: Option<DateTime<Utc>>,
    pub next_run: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl RecurringSchedule {
    pub fn new(
        job_type: impl Into<String>,
        payload: JsonValue,
        priority: JobPriority,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            payload,
            priority,
            cron_expression: cron_expression.into(),
            enabled: true,
            last_run: None,
            next_run: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run.is_some_and(|next| next <= now)
    }
}
