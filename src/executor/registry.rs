//! Job Handler Registry
//!
//! A dynamic registry that maps string-based job names (e.g., "analyse_task")
//! to executable Rust closures. The queue only ever stores the name and a JSON
//! payload, so any subsystem can register work without the queue knowing about it.

use super::types::*;

use anyhow::Result;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for a thread-safe, asynchronous job handler function.
/// It takes a `Job` and returns a Future that resolves to a `Result<JobOutcome>`.
pub type JobHandlerFn = Arc<
    dyn Fn(Job) -> Pin<Box<dyn Future<Output = Result<JobOutcome>> + Send>> + Send + Sync,
>;

/// Registry holding the mapping between job names and their implementation.
pub struct JobHandlerRegistry {
    handlers: DashMap<String, JobHandlerFn>,
}

impl JobHandlerRegistry {
    /// Creates a new, empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Registers a new handler function under a specific name.
    ///
    /// # Arguments
    /// * `handler_name` - The string identifier for the job (e.g., "build_zip").
    /// * `handler` - The closure/function that implements the job body.
    pub fn register<F, Fut>(&self, handler_name: &str, handler: F)
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<JobOutcome>> + Send + 'static,
    {
        // Box::pin type-erases the concrete Future so different async
        // functions can share the same map.
        let handler_fn: JobHandlerFn = Arc::new(move |job: Job| {
            Box::pin(handler(job)) as Pin<Box<dyn Future<Output = Result<JobOutcome>> + Send>>
        });

        self.handlers.insert(handler_name.to_string(), handler_fn);

        tracing::info!("Registered job handler: {}", handler_name);
    }

    /// Looks up the handler for a job.
    ///
    /// The returned closure is cloned out of the map so no map lock is held
    /// while the job runs.
    fn handler_for(&self, job: &Job) -> Result<JobHandlerFn> {
        match self.handlers.get(&job.handler) {
            Some(handler_fn) => Ok(handler_fn.value().clone()),
            None => {
                let error = format!("Unknown job handler: {}", job.handler);
                tracing::error!("{}", error);
                Err(anyhow::anyhow!(error))
            }
        }
    }

    /// Looks up a handler by name and executes it with the job's payload.
    ///
    /// # Returns
    /// * `Ok(outcome)` if the handler executed successfully.
    /// * `Err` if the handler failed or if no handler exists for the given name.
    pub async fn execute(&self, job: &Job) -> Result<JobOutcome> {
        let handler_fn = self.handler_for(job)?;
        tracing::debug!(
            "Executing job with handler '{}' (payload size: {} bytes)",
            job.handler,
            job.payload.to_string().len()
        );
        handler_fn(job.clone()).await
    }

    /// Returns a list of all registered handler names.
    pub fn list_handlers(&self) -> Vec<String> {
        self.handlers
            .iter()
            .map(|entry| entry.key().clone())
            .collect()
    }
}

impl Default for JobHandlerRegistry {
    fn default() -> Self {
        Self {
            handlers: DashMap::new(),
        }
    }
}
