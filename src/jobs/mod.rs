//! Background job engine
//!
//! Jobs are created through [`JobEngine`], wait in per-type priority
//! queues, and are executed by registered [`JobHandler`]s with a timeout,
//! retry policy and metrics. Delayed and recurring work is held by the
//! [`Scheduler`] until a promotion pass moves it into the queues.

pub mod cron;
pub mod engine;
pub mod error;
pub mod factory;
pub mod models;
pub mod monitor;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod runtime;
pub mod scheduler;
pub mod store;
pub mod tasks;
pub mod types;

pub use cron::{CronEvaluator, CronerEvaluator};
pub use engine::{EngineOptions, JobEngine, JobEngineBuilder, ProcessOutcome, PromotionReport};
pub use error::{JobError, JobResult, PermanentError};
pub use factory::JobFactory;
pub use models::{Job, NewJob, RecurringSchedule};
pub use monitor::{JobMetrics, Monitor};
pub use queue::PriorityQueue;
pub use registry::HandlerRegistry;
pub use retry::{Backoff, RetryPolicy, RetryStrategy};
pub use runtime::{Runtime, RuntimeConfig};
pub use scheduler::Scheduler;
pub use store::{InMemoryJobStore, JobStore};
pub use types::{FnHandler, JobContext, JobHandler, JobId, JobPriority, JobStatus, Metadata};
