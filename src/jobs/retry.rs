//! Retry strategies
//!
//! [`RetryStrategy`] is the extension point; [`RetryPolicy`] is the stock
//! implementation covering linear (including fixed) and exponential backoff.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::jobs::error::JobError;
use crate::jobs::models::Job;

/// Decides whether a failed attempt is retryable.
pub type RetryPredicate = Arc<dyn Fn(&JobError) -> bool + Send + Sync>;

pub trait RetryStrategy: Send + Sync {
    /// Retry budget given to jobs created without an explicit one
    fn max_retries(&self) -> u32;

    /// Must return `false` once `job.retry_count >= job.max_retries`.
    fn should_retry(&self, job: &Job, err: &JobError) -> bool;

    /// Delay before the retry that follows `retry_count` previous retries.
    fn next_delay(&self, retry_count: u32) -> Duration;

    fn next_retry_time(&self, job: &Job) -> DateTime<Utc> {
        let now = Utc::now();
        chrono::Duration::from_std(self.next_delay(job.retry_count))
            .ok()
            .and_then(|delay| now.checked_add_signed(delay))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// `initial_delay + step * retry_count`, capped at `max_delay`
    Linear {
        initial_delay: Duration,
        step: Duration,
        max_delay: Duration,
    },
    /// `initial_delay * multiplier^retry_count`, capped at `max_delay`
    Exponential {
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
        jitter: bool,
    },
}

impl Backoff {
    pub fn delay(&self, retry_count: u32) -> Duration {
        match *self {
            Backoff::Linear {
                initial_delay,
                step,
                max_delay,
            } => step
                .checked_mul(retry_count)
                .and_then(|extra| initial_delay.checked_add(extra))
                .unwrap_or(max_delay)
                .min(max_delay),
            Backoff::Exponential {
                initial_delay,
                multiplier,
                max_delay,
                jitter,
            } => {
                let exponent = retry_count.min(i32::MAX as u32) as i32;
                let secs = initial_delay.as_secs_f64() * multiplier.powi(exponent);
                let delay = if !secs.is_finite() || secs >= max_delay.as_secs_f64() {
                    max_delay
                } else {
                    Duration::from_secs_f64(secs.max(0.0))
                };

                if jitter {
                    delay.mul_f64(rand::rng().random_range(0.5..=1.0))
                } else {
                    delay
                }
            }
        }
    }
}

/// Stock retry strategy.
#[derive(Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    backoff: Backoff,
    retry_on_timeout: bool,
    predicate: Option<RetryPredicate>,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff: Backoff) -> Self {
        Self {
            max_retries,
            backoff,
            retry_on_timeout: true,
            predicate: None,
        }
    }

    pub fn linear(
        max_retries: u32,
        initial_delay: Duration,
        step: Duration,
        max_delay: Duration,
    ) -> Self {
        Self::new(
            max_retries,
            Backoff::Linear {
                initial_delay,
                step,
                max_delay,
            },
        )
    }

    pub fn fixed(max_retries: u32, delay: Duration) -> Self {
        Self::linear(max_retries, delay, Duration::ZERO, delay)
    }

    pub fn exponential(
        max_retries: u32,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self::new(
            max_retries,
            Backoff::Exponential {
                initial_delay,
                multiplier,
                max_delay,
                jitter: false,
            },
        )
    }

    /// Randomize exponential delays into `[delay / 2, delay]`.
    pub fn with_jitter(mut self) -> Self {
        if let Backoff::Exponential { ref mut jitter, .. } = self.backoff {
            *jitter = true;
        }
        self
    }

    /// Whether a timed out attempt may be retried (default `true`).
    pub fn with_retry_on_timeout(mut self, retry_on_timeout: bool) -> Self {
        self.retry_on_timeout = retry_on_timeout;
        self
    }

    /// Replace the default retryability check.
    pub fn with_predicate<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&JobError) -> bool + Send + Sync + 'static,
    {
        self.predicate = Some(Arc::new(predicate));
        self
    }

    pub fn backoff(&self) -> &Backoff {
        &self.backoff
    }

    pub fn retry_on_timeout(&self) -> bool {
        self.retry_on_timeout
    }

    fn is_retryable(&self, err: &JobError) -> bool {
        if err.is_timeout() && !self.retry_on_timeout {
            return false;
        }
        match &self.predicate {
            Some(predicate) => predicate(err),
            None => err.is_retryable_by_default(),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(
            3,
            Duration::from_secs(60),
            2.0,
            Duration::from_secs(60 * 60),
        )
    }
}

impl RetryStrategy for RetryPolicy {
    fn max_retries(&self) -> u32 {
        self.max_retries
    }

    fn should_retry(&self, job: &Job, err: &JobError) -> bool {
        job.has_retries_remaining() && self.is_retryable(err)
    }

    fn next_delay(&self, retry_count: u32) -> Duration {
        self.backoff.delay(retry_count)
    }
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("backoff", &self.backoff)
            .field("retry_on_timeout", &self.retry_on_timeout)
            .field("custom_predicate", &self.predicate.is_some())
            .finish()
    }
}
