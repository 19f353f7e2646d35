//! Job persistence boundary.
//!
//! The engine persists every transition through [`JobStore`]. Durable
//! backends live outside this crate; [`InMemoryJobStore`] serves
//! non-durable deployments and tests.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::models::Job;
use crate::jobs::types::{JobId, JobStatus};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert a new job record. Fails if the id already exists.
    async fn save(&self, job: &Job) -> JobResult<()>;

    async fn get(&self, id: JobId) -> JobResult<Option<Job>>;

    /// Overwrite an existing record. Fails with `NotFound` if absent.
    async fn update(&self, job: &Job) -> JobResult<()>;

    async fn delete(&self, id: JobId) -> JobResult<()>;

    async fn find_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>>;

    async fn find_by_type(&self, job_type: &str) -> JobResult<Vec<Job>>;
}

/// Non-durable store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<JobId, Job>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn collect<F>(&self, filter: F) -> Vec<Job>
    where
        F: Fn(&Job) -> bool,
    {
        let mut jobs: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| filter(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        jobs.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        jobs
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn save(&self, job: &Job) -> JobResult<()> {
        match self.jobs.entry(job.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(JobError::Store(format!(
                "Job {} already exists",
                job.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(job.clone());
                Ok(())
            }
        }
    }

    async fn get(&self, id: JobId) -> JobResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn update(&self, job: &Job) -> JobResult<()> {
        match self.jobs.get_mut(&job.id) {
            Some(mut entry) => {
                *entry = job.clone();
                Ok(())
            }
            None => Err(JobError::job_not_found(job.id)),
        }
    }

    async fn delete(&self, id: JobId) -> JobResult<()> {
        self.jobs
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| JobError::job_not_found(id))
    }

    async fn find_by_status(&self, status: JobStatus) -> JobResult<Vec<Job>> {
        Ok(self.collect(|job| job.status == status))
    }

    async fn find_by_type(&self, job_type: &str) -> JobResult<Vec<Job>> {
        Ok(self.collect(|job| job.job_type == job_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobPriority;
    use serde_json::json;

    fn job(job_type: &str) -> Job {
        Job::new(job_type, json!({}), JobPriority::Normal, 3)
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let store = InMemoryJobStore::new();
        let job = job("email");
        store.save(&job).await.unwrap();

        assert_eq!(store.get(job.id).await.unwrap(), Some(job.clone()));
        assert!(matches!(store.save(&job).await, Err(JobError::Store(_))));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryJobStore::new();
        let err = store.update(&job("email")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_find_by_status_and_type() {
        let store = InMemoryJobStore::new();
        let mut queued = job("email");
        queued.status = JobStatus::Queued;
        store.save(&queued).await.unwrap();
        store.save(&job("email")).await.unwrap();
        store.save(&job("report")).await.unwrap();

        assert_eq!(store.find_by_status(JobStatus::Queued).await.unwrap(), vec![queued]);
        assert_eq!(store.find_by_status(JobStatus::Pending).await.unwrap().len(), 2);
        assert_eq!(store.find_by_type("email").await.unwrap().len(), 2);
        assert!(store.find_by_type("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = InMemoryJobStore::new();
        let job = job("email");
        store.save(&job).await.unwrap();
        store.delete(job.id).await.unwrap();
        assert!(store.get(job.id).await.unwrap().is_none());
        assert!(store.delete(job.id).await.is_err());
        assert!(store.is_empty());
    }
}
