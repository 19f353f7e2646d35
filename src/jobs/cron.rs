use chrono::{DateTime, Utc};
use croner::Cron;

use crate::jobs::error::{JobError, JobResult};

/// Evaluates cron expressions for recurring schedules.
pub trait CronEvaluator: Send + Sync {
    fn validate(&self, expression: &str) -> JobResult<()>;

    /// First firing strictly after `after`, or `None` if the expression
    /// never fires again.
    fn next_after(&self, expression: &str, after: DateTime<Utc>)
    -> JobResult<Option<DateTime<Utc>>>;
}

/// [`CronEvaluator`] backed by the `croner` crate.
///
/// Accepts standard five-field expressions (`"* * * * *"`) and the
/// six-field form with a leading seconds column.
#[derive(Debug, Clone, Copy, Default)]
pub struct CronerEvaluator;

impl CronerEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn parse(expression: &str) -> JobResult<Cron> {
        Cron::new(expression.trim())
            .with_seconds_optional()
            .parse()
            .map_err(|e| JobError::InvalidCronExpression {
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }
}

impl CronEvaluator for CronerEvaluator {
    fn validate(&self, expression: &str) -> JobResult<()> {
        Self::parse(expression).map(|_| ())
    }

    fn next_after(
        &self,
        expression: &str,
        after: DateTime<Utc>,
    ) -> JobResult<Option<DateTime<Utc>>> {
        let cron = Self::parse(expression)?;
        match cron.find_next_occurrence(&after, false) {
            Ok(next) => Ok(Some(next)),
            Err(e) => {
                tracing::warn!(
                    expression = %expression,
                    error = %e,
                    "Cron expression has no upcoming occurrence"
                );
                Ok(None)
            }
        }
    }
}
