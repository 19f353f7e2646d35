//! Run command handler
//!
//! Builds the job engine from settings and drives it until shutdown.

use std::sync::Arc;

use crate::config::Settings;
use crate::error::AppResult;
use crate::jobs::tasks::LogHandler;
use crate::jobs::{JobEngine, RecurringSchedule, Runtime};

/// Handler for the run command
pub struct RunCommandHandler {
    config: Settings,
}

impl RunCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Execute the run command with optional dry-run support
    ///
    /// # Errors
    /// - Retry policy or recurring schedule errors
    /// - Runtime startup or shutdown errors (if not dry-run)
    pub async fn execute(&self, dry_run: bool) -> AppResult<()> {
        let engine = Arc::new(self.build_engine()?);
        let schedules = self.register_recurring(&engine).await?;

        if dry_run {
            return self.report_dry_run(&engine, &schedules);
        }

        let runtime = Runtime::new(Arc::clone(&engine), self.config.engine.runtime_config()).await?;
        runtime.run_until_shutdown().await?;
        Ok(())
    }

    /// Engine configured from the `engine` and `retry` sections with the
    /// built-in handlers registered
    pub fn build_engine(&self) -> AppResult<JobEngine> {
        let policy = self.config.retry.build_policy()?;
        let engine = JobEngine::builder()
            .retry_strategy(Arc::new(policy))
            .default_timeout(self.config.engine.handler_timeout())
            .build();

        engine.register(LogHandler)?;
        Ok(engine)
    }

    /// Register every configured recurring job, disabling the ones marked
    /// `enabled = false`.
    pub async fn register_recurring(&self, engine: &JobEngine) -> AppResult<Vec<RecurringSchedule>> {
        let registered = engine.registered_types();
        let mut schedules = Vec::with_capacity(self.config.recurring.len());

        for recurring in &self.config.recurring {
            if !registered.contains(&recurring.job_type) {
                tracing::warn!(
                    job_type = %recurring.job_type,
                    "Recurring job has no registered handler; its jobs will fail with HandlerNotFound"
                );
            }

            let mut schedule = engine
                .schedule_recurring_job_with_priority(
                    &recurring.job_type,
                    recurring.payload.clone(),
                    &recurring.cron,
                    recurring.priority,
                )
                .await?;

            if !recurring.enabled {
                schedule = engine.disable_recurring_job(schedule.id).await?;
            }
            schedules.push(schedule);
        }

        Ok(schedules)
    }

    fn report_dry_run(&self, engine: &JobEngine, schedules: &[RecurringSchedule]) -> AppResult<()> {
        println!("✓ Configuration is valid");
        println!("✓ Handlers registered: {}", engine.registered_types().join(", "));
        println!(
            "✓ Workers per job type: {}",
            self.config.engine.workers_per_type
        );
        println!(
            "✓ Retry strategy: {} (max {} retries)",
            self.config.retry.strategy, self.config.retry.max_retries
        );
        for schedule in schedules {
            let next = schedule
                .next_run
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "-".to_string());
            println!(
                "✓ Recurring {} '{}' enabled={} next run: {}",
                schedule.job_type, schedule.cron_expression, schedule.enabled, next
            );
        }

        println!("Dry run completed successfully - runtime is ready to start");
        Ok(())
    }

    pub fn config(&self) -> &Settings {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecurringJobConfig;
    use crate::jobs::JobPriority;
    use serde_json::json;

    fn config_with_recurring(enabled: bool) -> Settings {
        let mut config = Settings::default();
        config.recurring.push(RecurringJobConfig {
            job_type: "log".to_string(),
            cron: "*/5 * * * *".to_string(),
            payload: json!({ "message": "heartbeat" }),
            priority: JobPriority::Low,
            enabled,
        });
        config
    }

    #[test]
    fn test_run_handler_new() {
        let config = Settings::default();
        let handler = RunCommandHandler::new(config.clone());
        assert_eq!(handler.config(), &config);
    }

    #[test]
    fn test_build_engine_registers_log_handler() {
        let engine = RunCommandHandler::new(Settings::default())
            .build_engine()
            .unwrap();
        assert_eq!(engine.registered_types(), vec!["log".to_string()]);
    }

    #[test]
    fn test_build_engine_rejects_bad_retry_strategy() {
        let mut config = Settings::default();
        config.retry.strategy = "random".to_string();
        assert!(RunCommandHandler::new(config).build_engine().is_err());
    }

    #[tokio::test]
    async fn test_register_recurring_from_config() {
        let handler = RunCommandHandler::new(config_with_recurring(true));
        let engine = handler.build_engine().unwrap();

        let schedules = handler.register_recurring(&engine).await.unwrap();
        assert_eq!(schedules.len(), 1);
        assert!(schedules[0].enabled);
        assert!(schedules[0].next_run.is_some());
        assert_eq!(schedules[0].priority, JobPriority::Low);
        assert_eq!(engine.get_recurring_jobs().len(), 1);
    }

    #[tokio::test]
    async fn test_register_recurring_disabled() {
        let handler = RunCommandHandler::new(config_with_recurring(false));
        let engine = handler.build_engine().unwrap();

        let schedules = handler.register_recurring(&engine).await.unwrap();
        assert!(!schedules[0].enabled);
    }

    #[tokio::test]
    async fn test_run_handler_dry_run() {
        let handler = RunCommandHandler::new(config_with_recurring(true));
        assert!(handler.execute(true).await.is_ok());
    }
}
