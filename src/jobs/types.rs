use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::error::JobError;
use crate::jobs::models::Job;

pub type JobId = Uuid;

/// Free-form diagnostics attached to a job.
pub type Metadata = serde_json::Map<String, JsonValue>;

/// Job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Scheduled,
    Queued,
    Running,
    Retrying,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 8] = [
        JobStatus::Pending,
        JobStatus::Scheduled,
        JobStatus::Queued,
        JobStatus::Running,
        JobStatus::Retrying,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Queued)
                | (Scheduled, Queued)
                | (Queued, Running)
                | (Running, Completed)
                | (Running, Retrying)
                | (Running, Failed)
                | (Retrying, Queued)
                | (Pending, Cancelled)
                | (Scheduled, Cancelled)
                | (Queued, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Scheduled => "scheduled",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Retrying => "retrying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job priority, ordered `Low < Normal < High < Urgent`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum JobPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl JobPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPriority::Low => "low",
            JobPriority::Normal => "normal",
            JobPriority::High => "high",
            JobPriority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for JobPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobPriority {
    type Err = JobError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(JobPriority::Low),
            "normal" => Ok(JobPriority::Normal),
            "high" => Ok(JobPriority::High),
            "urgent" => Ok(JobPriority::Urgent),
            other => Err(JobError::validation(
                "priority",
                format!(
                    "Invalid priority '{}'. Valid values are: low, normal, high, urgent",
                    other
                ),
            )),
        }
    }
}

/// Job execution context passed to handlers
///
/// Carries a snapshot of the job and the cancellation token the engine
/// triggers when the handler's timeout expires. Long-running handlers
/// should check [`JobContext::is_cancelled`] or await
/// [`JobContext::cancelled`] and return early.
#[derive(Clone)]
pub struct JobContext {
    pub job: Job,
    pub cancellation_token: CancellationToken,
    metadata: Arc<Mutex<Metadata>>,
}

impl JobContext {
    pub fn new(job: Job, cancellation_token: CancellationToken) -> Self {
        Self {
            job,
            cancellation_token,
            metadata: Arc::new(Mutex::new(Metadata::new())),
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job.id
    }

    pub fn job_type(&self) -> &str {
        &self.job.job_type
    }

    /// Zero-based attempt number; equals the job's retry count.
    pub fn attempt(&self) -> u32 {
        self.job.retry_count
    }

    pub fn payload(&self) -> &JsonValue {
        &self.job.payload
    }

    /// Deserialize the payload into a handler-specific type.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, JobError> {
        Ok(serde_json::from_value(self.job.payload.clone())?)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Resolves once the engine requests cancellation.
    pub async fn cancelled(&self) {
        self.cancellation_token.cancelled().await
    }

    /// Record a diagnostic value; merged into the job's metadata after the attempt.
    pub fn set_metadata(&self, key: impl Into<String>, value: impl Into<JsonValue>) {
        let mut metadata = self.metadata.lock().unwrap_or_else(|e| e.into_inner());
        metadata.insert(key.into(), value.into());
    }

    pub(crate) fn take_metadata(&self) -> Metadata {
        let mut metadata = self.metadata.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *metadata)
    }
}

impl fmt::Debug for JobContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job.id)
            .field("job_type", &self.job.job_type)
            .field("attempt", &self.job.retry_count)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Trait that all job handlers must implement
///
/// Handlers must tolerate at-least-once delivery: a timed out attempt may
/// be retried while the first attempt's side effects already happened.
#[async_trait]
pub trait JobHandler: Send + Sync + 'static {
    /// Job type this handler executes
    fn job_type(&self) -> &str;

    /// Execution timeout for one attempt. `Duration::ZERO` falls back to
    /// the engine's default timeout.
    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    /// Execute one attempt of the job
    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()>;

    /// Optional description
    fn description(&self) -> Option<String> {
        None
    }
}

/// Adapts an async closure into a [`JobHandler`].
pub struct FnHandler<F> {
    job_type: String,
    timeout: Duration,
    func: F,
}

impl<F, Fut> FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    pub fn new(job_type: impl Into<String>, timeout: Duration, func: F) -> Self {
        Self {
            job_type: job_type.into(),
            timeout,
            func,
        }
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        (self.func)(ctx).await
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler")
            .field("job_type", &self.job_type)
            .field("timeout", &self.timeout)
            .finish()
    }
}
