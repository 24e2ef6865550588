//! Callback notification for CALLBACK calls.
//!
//! Callbacks never run on the task that delivers the response. They are
//! handed to a [`CallbackExecutor`], a bounded pool on tokio's blocking
//! threads, so slow callback code cannot stall the transport read path.

use crate::domain::RpcError;
use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tracing::{error, warn};

/// Receiver of a CALLBACK call's outcome
pub trait InvokeCallback: Send + Sync {
    fn on_success(&self, result: Value);

    fn on_failure(&self, error: RpcError);
}

/// [`InvokeCallback`] built from two closures
pub struct FnCallback<S, F> {
    on_success: S,
    on_failure: F,
}

impl<S, F> FnCallback<S, F>
where
    S: Fn(Value) + Send + Sync + 'static,
    F: Fn(RpcError) + Send + Sync + 'static,
{
    pub fn new(on_success: S, on_failure: F) -> Arc<Self> {
        Arc::new(Self {
            on_success,
            on_failure,
        })
    }
}

impl<S, F> InvokeCallback for FnCallback<S, F>
where
    S: Fn(Value) + Send + Sync + 'static,
    F: Fn(RpcError) + Send + Sync + 'static,
{
    fn on_success(&self, result: Value) {
        (self.on_success)(result)
    }

    fn on_failure(&self, error: RpcError) {
        (self.on_failure)(error)
    }
}

/// Bounded worker pool for callback execution
#[derive(Clone)]
pub struct CallbackExecutor {
    permits: Arc<Semaphore>,
}

impl CallbackExecutor {
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_concurrency.max(1))),
        }
    }

    /// Run `job` off the calling task. Never runs inline.
    pub fn execute<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match Handle::try_current() {
            Ok(handle) => {
                let permits = Arc::clone(&self.permits);
                handle.spawn(async move {
                    let Ok(_permit) = permits.acquire_owned().await else {
                        warn!("Callback pool closed, dropping callback");
                        return;
                    };
                    if let Err(e) = tokio::task::spawn_blocking(job).await {
                        if e.is_panic() {
                            error!("Invoke callback panicked");
                        }
                    }
                });
            }
            Err(_) => {
                // Outside a runtime (e.g. a transport on its own threads)
                if let Err(e) = std::thread::Builder::new()
                    .name("qrpc-callback".into())
                    .spawn(job)
                {
                    error!(error = %e, "Failed to spawn callback thread");
                }
            }
        }
    }

    /// Deliver an outcome to `callback` on the pool
    pub fn deliver(&self, callback: Arc<dyn InvokeCallback>, outcome: Result<Value, RpcError>) {
        self.execute(move || match outcome {
            Ok(result) => callback.on_success(result),
            Err(error) => callback.on_failure(error),
        });
    }

    /// Callbacks that can start right now
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}
