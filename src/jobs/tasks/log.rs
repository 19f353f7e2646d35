use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::jobs::types::{JobContext, JobHandler};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogPayload {
    pub message: String,
    #[serde(default = "default_level")]
    pub level: String,
}

fn default_level() -> String {
    "info".to_string()
}

/// Writes the payload's message to the application log.
///
/// Mostly useful for verifying a deployment end to end, for example with a
/// recurring `log` schedule in the configuration file.
#[derive(Debug, Clone, Default)]
pub struct LogHandler;

impl LogHandler {
    pub const JOB_TYPE: &'static str = "log";
}

#[async_trait]
impl JobHandler for LogHandler {
    fn job_type(&self) -> &str {
        Self::JOB_TYPE
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    async fn handle(&self, ctx: JobContext) -> anyhow::Result<()> {
        let payload: LogPayload = ctx.payload_as()?;

        match payload.level.to_lowercase().as_str() {
            "trace" => tracing::trace!(job_id = %ctx.job_id(), "{}", payload.message),
            "debug" => tracing::debug!(job_id = %ctx.job_id(), "{}", payload.message),
            "warn" => tracing::warn!(job_id = %ctx.job_id(), "{}", payload.message),
            "error" => tracing::error!(job_id = %ctx.job_id(), "{}", payload.message),
            _ => tracing::info!(job_id = %ctx.job_id(), "{}", payload.message),
        }

        ctx.set_metadata("logged_at", chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    fn description(&self) -> Option<String> {
        Some("Write a message to the application log".to_string())
    }
}
