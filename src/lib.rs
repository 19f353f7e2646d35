//! Jobforge library
//!
//! A background job engine: per-type priority queues, retries with backoff,
//! delayed and cron-driven recurring jobs, plus the configuration, logging
//! and CLI layers of the `jobforge` binary.

use shadow_rs::shadow;
shadow!(build);

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod logger;

pub fn pkg_version() -> &'static str {
    build::PKG_VERSION
}
