use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::jobs::error::JobError;

/// Point-in-time execution metrics for one job type
///
/// Every finished attempt lands in exactly one outcome bucket, so
/// `total_executed == total_succeeded + total_failed + total_retried`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JobMetrics {
    pub job_type: String,
    pub total_executed: u64,
    pub total_succeeded: u64,
    pub total_failed: u64,
    pub total_retried: u64,
    /// Attempts started but not yet finished
    pub running: u64,
    pub average_duration: Duration,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub last_succeeded_at: Option<DateTime<Utc>>,
    pub last_failed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct TypeMetrics {
    snapshot: JobMetrics,
    total_duration: Duration,
}

impl TypeMetrics {
    fn finish(&mut self, duration: Duration) -> DateTime<Utc> {
        let now = Utc::now();
        let m = &mut self.snapshot;
        m.running = m.running.saturating_sub(1);
        m.total_executed += 1;
        m.last_executed_at = Some(now);

        self.total_duration = self.total_duration.saturating_add(duration);
        let avg_nanos = self.total_duration.as_nanos() / u128::from(m.total_executed);
        m.average_duration = Duration::from_nanos(avg_nanos.min(u128::from(u64::MAX)) as u64);
        now
    }
}

/// Accumulates running aggregates per job type.
///
/// Updates take the map entry's lock, so concurrent workers never lose
/// an increment.
#[derive(Debug, Default)]
pub struct Monitor {
    metrics: DashMap<String, TypeMetrics>,
}

impl Monitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_type<F>(&self, job_type: &str, update: F)
    where
        F: FnOnce(&mut TypeMetrics),
    {
        let mut entry = self
            .metrics
            .entry(job_type.to_string())
            .or_insert_with(|| TypeMetrics {
                snapshot: JobMetrics {
                    job_type: job_type.to_string(),
                    ..Default::default()
                },
                total_duration: Duration::ZERO,
            });
        update(entry.value_mut());
    }

    pub fn record_start(&self, job_type: &str) {
        self.with_type(job_type, |m| m.snapshot.running += 1);
    }

    pub fn record_success(&self, job_type: &str, duration: Duration) {
        self.with_type(job_type, |m| {
            let now = m.finish(duration);
            m.snapshot.total_succeeded += 1;
            m.snapshot.last_succeeded_at = Some(now);
        });
    }

    pub fn record_failure(&self, job_type: &str, err: &JobError, duration: Duration) {
        self.with_type(job_type, |m| {
            let now = m.finish(duration);
            m.snapshot.total_failed += 1;
            m.snapshot.last_failed_at = Some(now);
            m.snapshot.last_error = Some(err.to_string());
        });
    }

    /// A failed attempt that will be retried; `attempt` is the new retry count.
    pub fn record_retry(&self, job_type: &str, attempt: u32, err: &JobError, duration: Duration) {
        self.with_type(job_type, |m| {
            m.finish(duration);
            m.snapshot.total_retried += 1;
            m.snapshot.last_error = Some(err.to_string());
        });
        tracing::debug!(job_type = %job_type, attempt, "Recorded retry");
    }

    /// Snapshot for `job_type`; zeroed when nothing was recorded yet.
    pub fn metrics(&self, job_type: &str) -> JobMetrics {
        self.metrics
            .get(job_type)
            .map(|entry| entry.snapshot.clone())
            .unwrap_or_else(|| JobMetrics {
                job_type: job_type.to_string(),
                ..Default::default()
            })
    }

    pub fn all_metrics(&self) -> Vec<JobMetrics> {
        let mut all: Vec<JobMetrics> = self
            .metrics
            .iter()
            .map(|entry| entry.snapshot.clone())
            .collect();
        all.sort_by(|a, b| a.job_type.cmp(&b.job_type));
        all
    }

    pub fn reset(&self) {
        self.metrics.clear();
    }
}
