//! Background runtime for a [`JobEngine`]
//!
//! A tokio-cron-scheduler job drives the engine's promotion pass on a fixed
//! interval, and one or more worker tasks per job type pull from the queues.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::signal;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler as TokioCronScheduler};
use tokio_util::sync::CancellationToken;

use crate::jobs::engine::{JobEngine, ProcessOutcome};
use crate::jobs::error::{JobError, JobResult};

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How often due scheduled, retrying and recurring jobs are promoted
    pub tick_interval: Duration,
    pub workers_per_type: usize,
    /// Sleep between polls when a worker's queue is empty
    pub idle_backoff: Duration,
    /// Types to run workers for; empty means every registered handler type
    /// plus every recurring schedule's type
    pub job_types: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(1),
            workers_per_type: 1,
            idle_backoff: Duration::from_millis(250),
            job_types: Vec::new(),
        }
    }
}

/// Drives promotion ticks and worker loops until stopped
pub struct Runtime {
    engine: Arc<JobEngine>,
    scheduler: Arc<Mutex<TokioCronScheduler>>,
    config: RuntimeConfig,
    shutdown: CancellationToken,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Runtime {
    pub async fn new(engine: Arc<JobEngine>, config: RuntimeConfig) -> JobResult<Self> {
        let scheduler = TokioCronScheduler::new()
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;

        Ok(Self {
            engine,
            scheduler: Arc::new(Mutex::new(scheduler)),
            config,
            shutdown: CancellationToken::new(),
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn engine(&self) -> &Arc<JobEngine> {
        &self.engine
    }

    /// Register the promotion tick, start the scheduler and spawn workers.
    pub async fn start(&self) -> JobResult<()> {
        if self.config.workers_per_type == 0 {
            return Err(JobError::validation(
                "workers_per_type",
                "At least one worker per job type is required",
            ));
        }

        let engine = Arc::clone(&self.engine);
        let tick = CronJob::new_repeated_async(self.config.tick_interval, move |_uuid, _lock| {
            let engine = Arc::clone(&engine);
            Box::pin(async move {
                if let Err(e) = engine.tick().await {
                    tracing::error!(error = %e, "Promotion pass failed");
                }
            })
        })
        .map_err(|e| JobError::Scheduler(e.to_string()))?;

        {
            let scheduler = self.scheduler.lock().await;
            scheduler
                .add(tick)
                .await
                .map_err(|e| JobError::Scheduler(e.to_string()))?;
            scheduler
                .start()
                .await
                .map_err(|e| JobError::Scheduler(e.to_string()))?;
        }

        let job_types = if self.config.job_types.is_empty() {
            self.default_job_types()
        } else {
            self.config.job_types.clone()
        };

        let mut workers = self.workers.lock().await;
        for job_type in &job_types {
            for worker_id in 0..self.config.workers_per_type {
                workers.push(tokio::spawn(worker_loop(
                    Arc::clone(&self.engine),
                    job_type.clone(),
                    worker_id,
                    self.config.idle_backoff,
                    self.shutdown.child_token(),
                )));
            }
        }

        tracing::info!(
            tick_interval_ms = self.config.tick_interval.as_millis() as u64,
            workers_per_type = self.config.workers_per_type,
            job_types = ?job_types,
            "Job runtime started"
        );
        Ok(())
    }

    /// Recurring types without a handler still get a worker, which fails
    /// their jobs with `HandlerNotFound` instead of leaving them queued.
    fn default_job_types(&self) -> Vec<String> {
        let mut types = self.engine.registered_types();
        types.extend(
            self.engine
                .get_recurring_jobs()
                .into_iter()
                .map(|schedule| schedule.job_type),
        );
        types.sort();
        types.dedup();
        types
    }

    /// Stop ticking and wait for workers to finish their current job.
    pub async fn stop(&self) -> JobResult<()> {
        self.shutdown.cancel();

        self.scheduler
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|e| JobError::Scheduler(e.to_string()))?;

        let workers = std::mem::take(&mut *self.workers.lock().await);
        for result in join_all(workers).await {
            if let Err(e) = result {
                tracing::warn!(error = %e, "Worker task ended abnormally");
            }
        }

        tracing::info!("Job runtime stopped");
        Ok(())
    }

    /// Run until Ctrl+C or SIGTERM, then stop gracefully.
    pub async fn run_until_shutdown(&self) -> JobResult<()> {
        self.start().await?;
        tokio::select! {
            _ = shutdown_signal() => {}
            _ = self.shutdown.cancelled() => {}
        }
        self.stop().await
    }

    /// Token that stops the runtime when cancelled.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }
}

async fn worker_loop(
    engine: Arc<JobEngine>,
    job_type: String,
    worker_id: usize,
    idle_backoff: Duration,
    shutdown: CancellationToken,
) {
    tracing::debug!(job_type = %job_type, worker_id, "Worker started");

    while !shutdown.is_cancelled() {
        match engine.process_next_job(&job_type).await {
            Ok(ProcessOutcome::Completed(_)) => {}
            Ok(ProcessOutcome::Empty) => {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(idle_backoff) => {}
                }
            }
            // Job was requeued or its outcome deferred; back off
            Err(e @ JobError::Store(_)) => {
                tracing::warn!(job_type = %job_type, worker_id, error = %e, "Store unavailable");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(idle_backoff) => {}
                }
            }
            // Outcome already recorded on the job
            Err(e) => {
                tracing::debug!(job_type = %job_type, worker_id, error = %e, "Job attempt failed");
            }
        }
    }

    tracing::debug!(job_type = %job_type, worker_id, "Worker stopped");
}

/// Waits for Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
