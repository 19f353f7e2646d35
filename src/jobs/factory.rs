use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use validator::Validate;

use crate::jobs::cron::CronEvaluator;
use crate::jobs::error::JobResult;
use crate::jobs::models::{Job, NewJob, RecurringSchedule};
use crate::jobs::types::{JobPriority, JobStatus};

/// Builds validated jobs and recurring schedules.
///
/// Jobs created without an explicit retry budget inherit the engine's
/// retry strategy default.
#[derive(Clone)]
pub struct JobFactory {
    default_max_retries: u32,
    cron: Arc<dyn CronEvaluator>,
}

impl JobFactory {
    pub fn new(default_max_retries: u32, cron: Arc<dyn CronEvaluator>) -> Self {
        Self {
            default_max_retries,
            cron,
        }
    }

    pub fn default_max_retries(&self) -> u32 {
        self.default_max_retries
    }

    /// Validate `input` and build a `Pending` job, or a `Scheduled` one
    /// when `run_at` is set.
    pub fn build(&self, input: NewJob) -> JobResult<Job> {
        input.validate()?;

        let mut job = Job::new(
            input.job_type,
            input.payload,
            input.priority,
            input.max_retries.unwrap_or(self.default_max_retries),
        );
        if let Some(run_at) = input.run_at {
            job.status = JobStatus::Scheduled;
            job.scheduled_for = Some(run_at);
        }
        Ok(job)
    }

    pub fn create_job(&self, job_type: &str, payload: JsonValue) -> JobResult<Job> {
        self.build(NewJob::new(job_type, payload))
    }

    pub fn create_scheduled_job(
        &self,
        job_type: &str,
        payload: JsonValue,
        run_at: DateTime<Utc>,
    ) -> JobResult<Job> {
        self.build(NewJob::new(job_type, payload).run_at(run_at))
    }

    pub fn create_recurring_job(
        &self,
        job_type: &str,
        payload: JsonValue,
        priority: JobPriority,
        cron_expression: &str,
    ) -> JobResult<RecurringSchedule> {
        NewJob::new(job_type, JsonValue::Null).validate()?;
        self.cron.validate(cron_expression)?;
        Ok(RecurringSchedule::new(
            job_type,
            payload,
            priority,
            cron_expression.trim(),
        ))
    }

    /// Fresh job instance for one trigger of `schedule`.
    pub fn materialize(&self, schedule: &RecurringSchedule) -> Job {
        let mut job = Job::new(
            schedule.job_type.clone(),
            schedule.payload.clone(),
            schedule.priority,
            self.default_max_retries,
        );
        job.recurring_id = Some(schedule.id);
        job
    }
}
