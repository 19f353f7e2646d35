//! Check command handler

use chrono::Utc;

use crate::config::Settings;
use crate::error::AppResult;
use crate::jobs::{CronEvaluator, CronerEvaluator};

pub struct CheckCommandHandler {
    config: Settings,
}

impl CheckCommandHandler {
    pub fn new(config: Settings) -> Self {
        Self { config }
    }

    /// Validate every configuration section and print when each recurring
    /// job would fire next.
    pub async fn execute(&self) -> AppResult<()> {
        self.config.validate()?;
        self.config.retry.build_policy()?;
        println!("✓ Configuration is valid");

        let cron = CronerEvaluator::new();
        let now = Utc::now();
        for recurring in &self.config.recurring {
            let next = cron
                .next_after(&recurring.cron, now)?
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string());
            println!(
                "✓ Recurring {} '{}' next run: {}",
                recurring.job_type, recurring.cron, next
            );
        }

        println!(
            "Check completed successfully - {} recurring job(s) configured",
            self.config.recurring.len()
        );
        Ok(())
    }
}
