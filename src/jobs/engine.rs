//! Job engine
//!
//! [`JobEngine`] is the single entry point callers use: it owns the store,
//! handler registry, priority queues, scheduler and monitor, and drives
//! every job through its lifecycle.
//!
//! Each job record has its own async lock. Every read-modify-write of a
//! job's status happens under that lock, so a cancellation racing a
//! dequeue, promotion or result transition sees a consistent state.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::jobs::cron::{CronEvaluator, CronerEvaluator};
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::factory::JobFactory;
use crate::jobs::models::{Job, NewJob, RecurringSchedule};
use crate::jobs::monitor::{JobMetrics, Monitor};
use crate::jobs::queue::PriorityQueue;
use crate::jobs::registry::HandlerRegistry;
use crate::jobs::retry::{RetryPolicy, RetryStrategy};
use crate::jobs::scheduler::Scheduler;
use crate::jobs::store::{InMemoryJobStore, JobStore};
use crate::jobs::types::{JobContext, JobHandler, JobId, JobPriority, JobStatus};

/// Default per-attempt timeout for handlers that do not declare one
pub const DEFAULT_HANDLER_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub default_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_HANDLER_TIMEOUT,
        }
    }
}

/// Result of a [`JobEngine::process_next_job`] call that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// No queued job of the requested type
    Empty,
    Completed(JobId),
}

/// Jobs moved into the queues by one promotion pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionReport {
    /// Scheduled or retrying jobs that became due
    pub promoted: Vec<JobId>,
    /// Fresh jobs materialized from recurring schedules
    pub materialized: Vec<JobId>,
}

impl PromotionReport {
    pub fn is_empty(&self) -> bool {
        self.promoted.is_empty() && self.materialized.is_empty()
    }
}

// ============================================================================
// Builder
// ============================================================================

#[derive(Default)]
pub struct JobEngineBuilder {
    store: Option<Arc<dyn JobStore>>,
    retry: Option<Arc<dyn RetryStrategy>>,
    cron: Option<Arc<dyn CronEvaluator>>,
    monitor: Option<Arc<Monitor>>,
    options: EngineOptions,
}

impl JobEngineBuilder {
    pub fn store(mut self, store: Arc<dyn JobStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn retry_strategy(mut self, retry: Arc<dyn RetryStrategy>) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn cron_evaluator(mut self, cron: Arc<dyn CronEvaluator>) -> Self {
        self.cron = Some(cron);
        self
    }

    pub fn monitor(mut self, monitor: Arc<Monitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.options.default_timeout = timeout;
        self
    }

    pub fn build(self) -> JobEngine {
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(InMemoryJobStore::new()));
        let retry = self
            .retry
            .unwrap_or_else(|| Arc::new(RetryPolicy::default()));
        let cron = self
            .cron
            .unwrap_or_else(|| Arc::new(CronerEvaluator::new()));
        let monitor = self.monitor.unwrap_or_default();

        JobEngine {
            store,
            registry: HandlerRegistry::new(),
            queue: PriorityQueue::new(),
            scheduler: Scheduler::new(Arc::clone(&cron)),
            factory: JobFactory::new(retry.max_retries(), cron),
            monitor,
            retry,
            options: self.options,
            record_locks: DashMap::new(),
            unsaved: DashMap::new(),
        }
    }
}

// ============================================================================
// Engine
// ============================================================================

pub struct JobEngine {
    store: Arc<dyn JobStore>,
    registry: HandlerRegistry,
    queue: PriorityQueue,
    scheduler: Scheduler,
    factory: JobFactory,
    monitor: Arc<Monitor>,
    retry: Arc<dyn RetryStrategy>,
    options: EngineOptions,
    record_locks: DashMap<JobId, Arc<Mutex<()>>>,
    /// Finished attempts whose outcome the store rejected, retried on
    /// every promotion pass
    unsaved: DashMap<JobId, Job>,
}

impl Default for JobEngine {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl JobEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> JobEngineBuilder {
        JobEngineBuilder::default()
    }

    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    fn record_lock(&self, id: JobId) -> Arc<Mutex<()>> {
        Arc::clone(self.record_locks.entry(id).or_default().value())
    }

    fn release_record_lock(&self, id: JobId) {
        self.record_locks.remove(&id);
    }

    #[cfg(test)]
    fn holds_record_lock(&self, id: JobId) -> bool {
        self.record_locks.contains_key(&id)
    }

    async fn load(&self, id: JobId) -> JobResult<Job> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| JobError::job_not_found(id))
    }

    // ------------------------------------------------------------------------
    // Handlers
    // ------------------------------------------------------------------------

    pub fn register_handler(&self, handler: Arc<dyn JobHandler>) -> JobResult<()> {
        self.registry.register(handler)
    }

    pub fn register<H: JobHandler>(&self, handler: H) -> JobResult<()> {
        self.registry.register(Arc::new(handler))
    }

    /// Executions already in flight keep the handler they started with.
    pub fn unregister_handler(&self, job_type: &str) -> JobResult<()> {
        self.registry.unregister(job_type).map(|_| ())
    }

    pub fn registered_types(&self) -> Vec<String> {
        self.registry.registered_types()
    }

    // ------------------------------------------------------------------------
    // Creation and submission
    // ------------------------------------------------------------------------

    /// Validate and persist a job. It stays `Pending` until enqueued,
    /// unless `run_at` is set, in which case it is `Scheduled`.
    pub async fn create_job(&self, input: NewJob) -> JobResult<Job> {
        let job = self.factory.build(input)?;
        self.store.save(&job).await?;

        if let Some(due_at) = job.scheduled_for {
            self.scheduler.schedule_at(job.id, due_at);
        }

        tracing::debug!(
            job_id = %job.id,
            job_type = %job.job_type,
            status = %job.status,
            priority = %job.priority,
            "Job created"
        );
        Ok(job)
    }

    /// Move a `Pending` (or early-released `Scheduled`) job into its queue.
    pub async fn enqueue_job(&self, id: JobId) -> JobResult<Job> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().await;

        let mut job = self.load(id).await?;
        let was_scheduled = job.status == JobStatus::Scheduled;
        job.transition(JobStatus::Queued)?;
        self.store.update(&job).await?;
        if was_scheduled {
            self.scheduler.unschedule(id);
        }
        self.queue.enqueue(&job.job_type, job.id, job.priority);

        tracing::debug!(job_id = %job.id, job_type = %job.job_type, "Job enqueued");
        Ok(job)
    }

    /// Create and immediately enqueue a job, or schedule it when `run_at` is set.
    pub async fn submit_job(&self, input: NewJob) -> JobResult<Job> {
        let job = self.create_job(input).await?;
        if job.status == JobStatus::Scheduled {
            return Ok(job);
        }
        self.enqueue_job(job.id).await
    }

    pub async fn submit(
        &self,
        job_type: &str,
        payload: JsonValue,
        priority: JobPriority,
    ) -> JobResult<Job> {
        self.submit_job(NewJob::new(job_type, payload).with_priority(priority))
            .await
    }

    /// A `run_at` already in the past is accepted; the job is promoted on
    /// the next pass.
    pub async fn schedule_job(
        &self,
        job_type: &str,
        payload: JsonValue,
        run_at: DateTime<Utc>,
        priority: JobPriority,
    ) -> JobResult<Job> {
        self.create_job(
            NewJob::new(job_type, payload)
                .with_priority(priority)
                .run_at(run_at),
        )
        .await
    }

    pub async fn schedule_job_in(
        &self,
        job_type: &str,
        payload: JsonValue,
        delay: chrono::Duration,
        priority: JobPriority,
    ) -> JobResult<Job> {
        if delay < chrono::Duration::zero() {
            return Err(JobError::validation("delay", "Delay cannot be negative"));
        }
        let run_at = Utc::now()
            .checked_add_signed(delay)
            .ok_or_else(|| JobError::validation("delay", "Delay is out of range"))?;
        self.schedule_job(job_type, payload, run_at, priority).await
    }

    pub async fn schedule_recurring_job(
        &self,
        job_type: &str,
        payload: JsonValue,
        cron_expression: &str,
    ) -> JobResult<RecurringSchedule> {
        self.schedule_recurring_job_with_priority(
            job_type,
            payload,
            cron_expression,
            JobPriority::Normal,
        )
        .await
    }

    pub async fn schedule_recurring_job_with_priority(
        &self,
        job_type: &str,
        payload: JsonValue,
        cron_expression: &str,
        priority: JobPriority,
    ) -> JobResult<RecurringSchedule> {
        let schedule =
            self.factory
                .create_recurring_job(job_type, payload, priority, cron_expression)?;
        let schedule = self.scheduler.add_recurring(schedule, Utc::now())?;

        tracing::info!(
            schedule_id = %schedule.id,
            job_type = %schedule.job_type,
            cron = %schedule.cron_expression,
            next_run = ?schedule.next_run,
            "Recurring job scheduled"
        );
        Ok(schedule)
    }

    pub async fn disable_recurring_job(&self, id: Uuid) -> JobResult<RecurringSchedule> {
        let schedule = self.scheduler.set_enabled(id, false, Utc::now())?;
        tracing::info!(schedule_id = %id, "Recurring job disabled");
        Ok(schedule)
    }

    pub async fn enable_recurring_job(&self, id: Uuid) -> JobResult<RecurringSchedule> {
        let schedule = self.scheduler.set_enabled(id, true, Utc::now())?;
        tracing::info!(schedule_id = %id, next_run = ?schedule.next_run, "Recurring job enabled");
        Ok(schedule)
    }

    /// Jobs already materialized from the schedule are unaffected.
    pub async fn remove_recurring_job(&self, id: Uuid) -> JobResult<RecurringSchedule> {
        let schedule = self.scheduler.remove_recurring(id)?;
        tracing::info!(schedule_id = %id, "Recurring job removed");
        Ok(schedule)
    }

    // ------------------------------------------------------------------------
    // Cancellation
    // ------------------------------------------------------------------------

    /// Cancel a job that has not started.
    ///
    /// Only `Pending`, `Scheduled` and `Queued` jobs can be cancelled. A
    /// queued job that a worker already dequeued is treated as running.
    pub async fn cancel_job(&self, id: JobId) -> JobResult<Job> {
        let lock = self.record_lock(id);
        let guard = lock.lock().await;

        let mut job = self.load(id).await?;
        match job.status {
            JobStatus::Queued => {
                if !self.queue.remove(&job.job_type, id) {
                    return Err(JobError::InvalidTransition {
                        id,
                        from: JobStatus::Running,
                        to: JobStatus::Cancelled,
                    });
                }
            }
            JobStatus::Scheduled => {
                self.scheduler.unschedule(id);
            }
            _ => {}
        }

        job.transition(JobStatus::Cancelled)?;
        self.store.update(&job).await?;
        drop(guard);
        self.release_record_lock(id);

        tracing::info!(job_id = %id, job_type = %job.job_type, "Job cancelled");
        Ok(job)
    }

    /// Cancel every job waiting in `job_type`'s queue and return their ids.
    pub async fn clear_queue(&self, job_type: &str) -> JobResult<Vec<JobId>> {
        let drained = self.queue.clear(job_type);
        let mut cancelled = Vec::with_capacity(drained.len());

        for id in drained {
            let lock = self.record_lock(id);
            let guard = lock.lock().await;
            let Some(mut job) = self.store.get(id).await? else {
                drop(guard);
                self.release_record_lock(id);
                continue;
            };
            if job.status != JobStatus::Queued {
                continue;
            }
            job.transition(JobStatus::Cancelled)?;
            self.store.update(&job).await?;
            drop(guard);
            self.release_record_lock(id);
            cancelled.push(id);
        }

        tracing::info!(job_type = %job_type, count = cancelled.len(), "Queue cleared");
        Ok(cancelled)
    }

    // ------------------------------------------------------------------------
    // Processing
    // ------------------------------------------------------------------------

    /// Dequeue and execute the highest-priority queued job of `job_type`.
    ///
    /// Returns `Empty` when nothing is queued. A handler failure comes back
    /// as `Err` after the job has been moved to `Retrying` or `Failed`.
    ///
    /// If the store fails before the job is marked `Running`, the job goes
    /// back to its queue position and the store error is returned.
    pub async fn process_next_job(&self, job_type: &str) -> JobResult<ProcessOutcome> {
        loop {
            let Some(entry) = self.queue.take(job_type) else {
                return Ok(ProcessOutcome::Empty);
            };
            let id = entry.job_id;

            let lock = self.record_lock(id);
            let guard = lock.lock().await;

            let mut job = match self.store.get(id).await {
                Ok(Some(job)) => job,
                Ok(None) => {
                    tracing::warn!(job_id = %id, "Dequeued job no longer exists, skipping");
                    drop(guard);
                    self.release_record_lock(id);
                    continue;
                }
                Err(e) => {
                    self.queue.restore(job_type, entry);
                    tracing::error!(job_id = %id, error = %e, "Failed to load dequeued job, requeued");
                    return Err(e);
                }
            };
            if job.status != JobStatus::Queued {
                tracing::warn!(job_id = %id, status = %job.status, "Dequeued job is not queued, skipping");
                if job.is_terminal() {
                    drop(guard);
                    self.release_record_lock(id);
                }
                continue;
            }

            job.transition(JobStatus::Running)?;
            if let Err(e) = self.store.update(&job).await {
                self.queue.restore(job_type, entry);
                tracing::error!(job_id = %id, error = %e, "Failed to mark job running, requeued");
                return Err(e);
            }
            drop(guard);

            return self.execute(job).await;
        }
    }

    async fn execute(&self, mut job: Job) -> JobResult<ProcessOutcome> {
        let started = Instant::now();
        self.monitor.record_start(&job.job_type);

        let Some(handler) = self.registry.get(&job.job_type) else {
            let err = JobError::HandlerNotFound(job.job_type.clone());
            job.last_error = Some(err.to_string());
            let lock = self.record_lock(job.id);
            let _guard = lock.lock().await;
            self.finish_failed(job, &err, started.elapsed()).await?;
            return Err(err);
        };

        let timeout = match handler.timeout() {
            t if t.is_zero() => self.options.default_timeout,
            t => t,
        };

        tracing::info!(
            job_id = %job.id,
            job_type = %job.job_type,
            attempt = job.retry_count,
            timeout_ms = timeout.as_millis() as u64,
            "Executing job"
        );

        let token = CancellationToken::new();
        let ctx = JobContext::new(job.clone(), token.clone());
        let task_ctx = ctx.clone();
        let mut task = tokio::spawn(async move { handler.handle(task_ctx).await });

        let result = match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(source))) => Err(JobError::Handler {
                job_id: job.id,
                job_type: job.job_type.clone(),
                source,
            }),
            Ok(Err(join_err)) => Err(JobError::Handler {
                job_id: job.id,
                job_type: job.job_type.clone(),
                source: anyhow::anyhow!("Handler panicked: {}", join_err),
            }),
            Err(_) => {
                token.cancel();
                task.abort();
                Err(JobError::Timeout {
                    job_id: job.id,
                    job_type: job.job_type.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        let elapsed = started.elapsed();
        job.metadata.extend(ctx.take_metadata());

        let lock = self.record_lock(job.id);
        let _guard = lock.lock().await;

        match result {
            Ok(()) => {
                let id = job.id;
                job.transition(JobStatus::Completed)?;
                self.monitor.record_success(&job.job_type, elapsed);
                if let Err(store_err) = self.persist_outcome(&job).await {
                    tracing::error!(job_id = %id, error = %store_err, "Job completed but its state could not be stored");
                    return Err(store_err);
                }

                tracing::info!(
                    job_id = %id,
                    job_type = %job.job_type,
                    duration_ms = elapsed.as_millis() as u64,
                    "Job completed"
                );
                Ok(ProcessOutcome::Completed(id))
            }
            Err(err) => {
                job.last_error = Some(err.to_string());
                if self.retry.should_retry(&job, &err) {
                    self.finish_retrying(job, &err, elapsed).await?;
                } else {
                    self.finish_failed(job, &err, elapsed).await?;
                }
                Err(err)
            }
        }
    }

    /// Caller holds the record lock.
    async fn finish_retrying(
        &self,
        mut job: Job,
        err: &JobError,
        elapsed: Duration,
    ) -> JobResult<()> {
        let resume_at = self.retry.next_retry_time(&job);
        job.transition(JobStatus::Retrying)?;
        job.retry_count += 1;
        job.scheduled_for = Some(resume_at);
        self.monitor
            .record_retry(&job.job_type, job.retry_count, err, elapsed);

        if let Err(store_err) = self.persist_outcome(&job).await {
            tracing::error!(job_id = %job.id, error = %err, "Attempt failed and retry state could not be stored");
            return Err(store_err);
        }

        tracing::warn!(
            job_id = %job.id,
            job_type = %job.job_type,
            retry_count = job.retry_count,
            max_retries = job.max_retries,
            resume_at = %resume_at,
            error = %err,
            "Job failed, retry scheduled"
        );
        Ok(())
    }

    /// Caller holds the record lock.
    async fn finish_failed(
        &self,
        mut job: Job,
        err: &JobError,
        elapsed: Duration,
    ) -> JobResult<()> {
        job.transition(JobStatus::Failed)?;
        self.monitor.record_failure(&job.job_type, err, elapsed);

        if let Err(store_err) = self.persist_outcome(&job).await {
            tracing::error!(job_id = %job.id, error = %err, "Job failed and final state could not be stored");
            return Err(store_err);
        }

        tracing::error!(
            job_id = %job.id,
            job_type = %job.job_type,
            retry_count = job.retry_count,
            error = %err,
            "Job failed permanently"
        );
        Ok(())
    }

    /// Store the outcome of a finished attempt.
    ///
    /// On a store error the outcome is kept in memory and written again by
    /// each promotion pass until it sticks, so the record never stays
    /// `Running` after its attempt ended. Caller holds the record lock.
    async fn persist_outcome(&self, job: &Job) -> JobResult<()> {
        match self.store.update(job).await {
            Ok(()) => {
                self.unsaved.remove(&job.id);
                self.after_persist(job);
                Ok(())
            }
            Err(e) => {
                self.unsaved.insert(job.id, job.clone());
                Err(e)
            }
        }
    }

    fn after_persist(&self, job: &Job) {
        match job.status {
            JobStatus::Retrying => {
                if let Some(resume_at) = job.scheduled_for {
                    self.scheduler.schedule_at(job.id, resume_at);
                }
            }
            status if status.is_terminal() => self.release_record_lock(job.id),
            _ => {}
        }
    }

    /// Retry writes of attempt outcomes the store rejected earlier.
    async fn flush_unsaved(&self) -> usize {
        let pending: Vec<Job> = self
            .unsaved
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        let mut flushed = 0;

        for job in pending {
            let lock = self.record_lock(job.id);
            let _guard = lock.lock().await;
            match self.persist_outcome(&job).await {
                Ok(()) => {
                    flushed += 1;
                    tracing::info!(job_id = %job.id, status = %job.status, "Stored deferred job outcome");
                }
                Err(e) => {
                    tracing::warn!(job_id = %job.id, error = %e, "Job outcome still cannot be stored");
                }
            }
        }
        flushed
    }

    /// Attempt outcomes waiting to be written to the store.
    pub fn unsaved_count(&self) -> usize {
        self.unsaved.len()
    }

    // ------------------------------------------------------------------------
    // Promotion
    // ------------------------------------------------------------------------

    /// Promote scheduled and retrying jobs due at `now`, and materialize
    /// due recurring schedules. Each trigger produces exactly one job.
    pub async fn promote_due(&self, now: DateTime<Utc>) -> JobResult<PromotionReport> {
        let mut report = PromotionReport::default();

        if !self.unsaved.is_empty() {
            self.flush_unsaved().await;
        }

        for entry in self.scheduler.take_due(now) {
            match self.promote(entry.job_id).await {
                Ok(true) => report.promoted.push(entry.job_id),
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(job_id = %entry.job_id, error = %e, "Failed to promote job, will retry next pass");
                    self.scheduler.schedule_at(entry.job_id, entry.due_at);
                }
            }
        }

        for firing in self.scheduler.take_due_recurring(now) {
            let mut job = self.factory.materialize(&firing.schedule);
            job.transition(JobStatus::Queued)?;
            if let Err(e) = self.store.save(&job).await {
                let restored = self.scheduler.restore_recurring(&firing);
                tracing::error!(
                    schedule_id = %firing.schedule.id,
                    fired_at = %firing.fired_at,
                    restored,
                    error = %e,
                    "Failed to store materialized job"
                );
                continue;
            }
            self.queue.enqueue(&job.job_type, job.id, job.priority);

            tracing::debug!(
                schedule_id = %firing.schedule.id,
                job_id = %job.id,
                fired_at = %firing.fired_at,
                "Recurring job materialized"
            );
            report.materialized.push(job.id);
        }

        if !report.is_empty() {
            tracing::debug!(
                promoted = report.promoted.len(),
                materialized = report.materialized.len(),
                "Promotion pass finished"
            );
        }
        Ok(report)
    }

    /// Run one promotion pass against the current time.
    pub async fn tick(&self) -> JobResult<PromotionReport> {
        self.promote_due(Utc::now()).await
    }

    async fn promote(&self, id: JobId) -> JobResult<bool> {
        let lock = self.record_lock(id);
        let _guard = lock.lock().await;

        let Some(mut job) = self.store.get(id).await? else {
            return Ok(false);
        };
        if !matches!(job.status, JobStatus::Scheduled | JobStatus::Retrying) {
            return Ok(false);
        }
        job.transition(JobStatus::Queued)?;
        self.store.update(&job).await?;
        self.queue.enqueue(&job.job_type, job.id, job.priority);
        Ok(true)
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub async fn get_job(&self, id: JobId) -> JobResult<Job> {
        self.load(id).await
    }

    pub async fn get_jobs_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>> {
        self.store.find_by_status(status).await
    }

    pub async fn get_jobs_by_type(&self, job_type: &str) -> JobResult<Vec<Job>> {
        self.store.find_by_type(job_type).await
    }

    pub async fn get_scheduled_jobs(&self) -> JobResult<Vec<Job>> {
        self.store.find_by_status(JobStatus::Scheduled).await
    }

    pub fn get_recurring_jobs(&self) -> Vec<RecurringSchedule> {
        self.scheduler.recurring_schedules()
    }

    pub fn get_recurring_job(&self, id: Uuid) -> JobResult<RecurringSchedule> {
        self.scheduler
            .recurring(id)
            .ok_or_else(|| JobError::schedule_not_found(id))
    }

    pub fn get_job_metrics(&self, job_type: &str) -> JobMetrics {
        self.monitor.metrics(job_type)
    }

    pub fn get_all_metrics(&self) -> Vec<JobMetrics> {
        self.monitor.all_metrics()
    }

    pub fn queue_size(&self, job_type: &str) -> usize {
        self.queue.size(job_type)
    }

    /// Next job `process_next_job` would take, without removing it.
    pub async fn peek_job(&self, job_type: &str) -> JobResult<Option<Job>> {
        match self.queue.peek(job_type) {
            Some(id) => self.store.get(id).await,
            None => Ok(None),
        }
    }

    /// Job types with queued work, merged with registered handler types.
    pub fn active_types(&self) -> Vec<String> {
        let mut types = self.registry.registered_types();
        types.extend(self.queue.types());
        types.sort();
        types.dedup();
        types
    }

    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        self.scheduler.next_due()
    }
}
