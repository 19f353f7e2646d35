use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::jobs::error::{JobError, JobResult};
use crate::jobs::types::JobHandler;

/// Registry mapping job types to handler implementations
///
/// Lookups hand out an `Arc` to the handler, so unregistering a type
/// never pulls a handler out from under an execution already in flight.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<String, Arc<dyn JobHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under its own job type. Fails if the type is taken.
    pub fn register(&self, handler: Arc<dyn JobHandler>) -> JobResult<()> {
        let job_type = handler.job_type().to_string();
        if job_type.trim().is_empty() {
            return Err(JobError::validation(
                "job_type",
                "Handler job type cannot be empty",
            ));
        }

        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if handlers.contains_key(&job_type) {
            return Err(JobError::AlreadyRegistered(job_type));
        }

        tracing::info!(
            job_type = %job_type,
            timeout_ms = handler.timeout().as_millis() as u64,
            description = ?handler.description(),
            "Registered job handler"
        );
        handlers.insert(job_type, handler);
        Ok(())
    }

    pub fn unregister(&self, job_type: &str) -> JobResult<Arc<dyn JobHandler>> {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let handler = handlers
            .remove(job_type)
            .ok_or_else(|| JobError::HandlerNotFound(job_type.to_string()))?;
        tracing::info!(job_type = %job_type, "Unregistered job handler");
        Ok(handler)
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(job_type).cloned()
    }

    pub fn contains(&self, job_type: &str) -> bool {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.contains_key(job_type)
    }

    pub fn registered_types(&self) -> Vec<String> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut types: Vec<String> = handlers.keys().cloned().collect();
        types.sort();
        types
    }
}
