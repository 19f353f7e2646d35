use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::jobs::cron::CronEvaluator;
use crate::jobs::error::{JobError, JobResult};
use crate::jobs::models::RecurringSchedule;
use crate::jobs::types::JobId;

/// A delayed job (scheduled or waiting to retry) and when it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelayedEntry {
    pub job_id: JobId,
    pub due_at: DateTime<Utc>,
}

/// One trigger of a recurring schedule.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurringFiring {
    /// Schedule state after the trigger was consumed
    pub schedule: RecurringSchedule,
    pub fired_at: DateTime<Utc>,
    /// `last_run` before this trigger, used by [`Scheduler::restore_recurring`]
    pub previous_last_run: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct SchedulerState {
    delayed: BTreeMap<(DateTime<Utc>, u64), JobId>,
    index: HashMap<JobId, (DateTime<Utc>, u64)>,
    recurring: HashMap<Uuid, RecurringSchedule>,
    sequence: u64,
}

/// Holds delayed jobs and recurring definitions until they are due
///
/// The scheduler only tracks ids and due times; the engine owns job
/// state and performs the actual promotion into the queues.
pub struct Scheduler {
    state: Mutex<SchedulerState>,
    cron: Arc<dyn CronEvaluator>,
}

impl Scheduler {
    pub fn new(cron: Arc<dyn CronEvaluator>) -> Self {
        Self {
            state: Mutex::new(SchedulerState::default()),
            cron,
        }
    }

    fn state(&self) -> MutexGuard<'_, SchedulerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // ------------------------------------------------------------------------
    // Delayed jobs
    // ------------------------------------------------------------------------

    /// Track `job_id` as due at `due_at`, replacing any earlier entry.
    pub fn schedule_at(&self, job_id: JobId, due_at: DateTime<Utc>) {
        let mut state = self.state();
        if let Some(key) = state.index.remove(&job_id) {
            state.delayed.remove(&key);
        }
        let key = (due_at, state.sequence);
        state.sequence += 1;
        state.delayed.insert(key, job_id);
        state.index.insert(job_id, key);
    }

    pub fn unschedule(&self, job_id: JobId) -> bool {
        let mut state = self.state();
        match state.index.remove(&job_id) {
            Some(key) => {
                state.delayed.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn is_scheduled(&self, job_id: JobId) -> bool {
        self.state().index.contains_key(&job_id)
    }

    pub fn due_at(&self, job_id: JobId) -> Option<DateTime<Utc>> {
        self.state().index.get(&job_id).map(|(due_at, _)| *due_at)
    }

    /// Remove and return every entry with `due_at <= now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<DelayedEntry> {
        let mut state = self.state();
        let mut due = Vec::new();
        while let Some(entry) = state.delayed.first_entry() {
            let (due_at, _) = *entry.key();
            if due_at > now {
                break;
            }
            let job_id = entry.remove();
            state.index.remove(&job_id);
            due.push(DelayedEntry { job_id, due_at });
        }
        due
    }

    pub fn delayed_len(&self) -> usize {
        self.state().delayed.len()
    }

    /// Earliest pending due time across delayed jobs and enabled schedules.
    pub fn next_due(&self) -> Option<DateTime<Utc>> {
        let state = self.state();
        let delayed = state.delayed.keys().next().map(|(due_at, _)| *due_at);
        let recurring = state
            .recurring
            .values()
            .filter(|s| s.enabled)
            .filter_map(|s| s.next_run)
            .min();
        match (delayed, recurring) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    // ------------------------------------------------------------------------
    // Recurring schedules
    // ------------------------------------------------------------------------

    /// Register a schedule; `next_run` is computed from `now`.
    pub fn add_recurring(
        &self,
        mut schedule: RecurringSchedule,
        now: DateTime<Utc>,
    ) -> JobResult<RecurringSchedule> {
        self.cron.validate(&schedule.cron_expression)?;
        schedule.next_run = if schedule.enabled {
            self.cron.next_after(&schedule.cron_expression, now)?
        } else {
            None
        };

        let mut state = self.state();
        if state.recurring.contains_key(&schedule.id) {
            return Err(JobError::Scheduler(format!(
                "Recurring schedule {} already exists",
                schedule.id
            )));
        }
        state.recurring.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    /// Enable or disable a schedule. Disabling only stops future triggers;
    /// enabling recomputes `next_run` from `now`.
    pub fn set_enabled(
        &self,
        id: Uuid,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> JobResult<RecurringSchedule> {
        let mut state = self.state();
        let schedule = state
            .recurring
            .get_mut(&id)
            .ok_or_else(|| JobError::schedule_not_found(id))?;

        if schedule.enabled != enabled {
            schedule.enabled = enabled;
            schedule.next_run = if enabled {
                self.cron.next_after(&schedule.cron_expression, now)?
            } else {
                None
            };
        }
        Ok(schedule.clone())
    }

    pub fn remove_recurring(&self, id: Uuid) -> JobResult<RecurringSchedule> {
        self.state()
            .recurring
            .remove(&id)
            .ok_or_else(|| JobError::schedule_not_found(id))
    }

    pub fn recurring(&self, id: Uuid) -> Option<RecurringSchedule> {
        self.state().recurring.get(&id).cloned()
    }

    pub fn recurring_schedules(&self) -> Vec<RecurringSchedule> {
        let mut schedules: Vec<RecurringSchedule> =
            self.state().recurring.values().cloned().collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        schedules
    }

    /// Consume every due trigger, at most one per schedule per call.
    ///
    /// `last_run` and `next_run` are advanced under the same lock that
    /// decides to fire, so a trigger can never be handed out twice.
    /// Firings missed while no pass ran collapse into a single one.
    pub fn take_due_recurring(&self, now: DateTime<Utc>) -> Vec<RecurringFiring> {
        let mut state = self.state();
        let mut firings = Vec::new();

        for schedule in state.recurring.values_mut() {
            if !schedule.is_due(now) {
                continue;
            }
            let Some(fired_at) = schedule.next_run else {
                continue;
            };

            let previous_last_run = schedule.last_run.replace(fired_at);
            schedule.next_run = match self.cron.next_after(&schedule.cron_expression, now) {
                Ok(next) => next,
                Err(e) => {
                    tracing::error!(
                        schedule_id = %schedule.id,
                        error = %e,
                        "Failed to compute next run, disabling schedule"
                    );
                    schedule.enabled = false;
                    None
                }
            };

            firings.push(RecurringFiring {
                schedule: schedule.clone(),
                fired_at,
                previous_last_run,
            });
        }

        firings.sort_by(|a, b| a.fired_at.cmp(&b.fired_at));
        firings
    }

    /// Hand a consumed trigger back so the next pass fires it again.
    ///
    /// Only applies while the schedule is still in the state `firing`
    /// left it in; a schedule that was removed, disabled or fired again
    /// in the meantime is left alone. Returns whether it was restored.
    pub fn restore_recurring(&self, firing: &RecurringFiring) -> bool {
        let mut state = self.state();
        let Some(schedule) = state.recurring.get_mut(&firing.schedule.id) else {
            return false;
        };
        if schedule.last_run != Some(firing.fired_at)
            || schedule.next_run != firing.schedule.next_run
            || schedule.enabled != firing.schedule.enabled
        {
            return false;
        }

        schedule.last_run = firing.previous_last_run;
        schedule.next_run = Some(firing.fired_at);
        schedule.enabled = true;
        true
    }
}
