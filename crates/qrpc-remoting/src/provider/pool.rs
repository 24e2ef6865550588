//! Server Handler Pool - bounded execution of provider method calls.
//!
//! Up to `max_concurrency` handlers run at once on tokio's blocking
//! threads and up to `queue_capacity` more wait for a slot. Anything beyond
//! that is rejected immediately rather than queued without bound.

use crate::domain::{HandlerPoolConfig, HandlerPoolError};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::warn;

#[derive(Clone)]
pub struct ServerHandlerPool {
    /// Running plus queued
    admission: Arc<Semaphore>,
    workers: Arc<Semaphore>,
}

impl ServerHandlerPool {
    pub fn new(config: &HandlerPoolConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            admission: Arc::new(Semaphore::new(max_concurrency + config.queue_capacity)),
            workers: Arc::new(Semaphore::new(max_concurrency)),
        }
    }

    /// Run `job` on the pool and wait for its result
    pub async fn run<F, R>(&self, job: F) -> Result<R, HandlerPoolError>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let Ok(_admitted) = Arc::clone(&self.admission).try_acquire_owned() else {
            warn!("Server handler pool exhausted, rejecting request");
            return Err(HandlerPoolError::Exhausted);
        };
        let _worker = Arc::clone(&self.workers)
            .acquire_owned()
            .await
            .map_err(|e| HandlerPoolError::TaskFailed(e.to_string()))?;

        tokio::task::spawn_blocking(job)
            .await
            .map_err(|e| HandlerPoolError::TaskFailed(e.to_string()))
    }

    /// Requests that can still be admitted
    pub fn available(&self) -> usize {
        self.admission.available_permits()
    }
}
