//! Pending Call - the async-to-sync bridge for one in-flight request.
//!
//! State machine: `Pending -> Completed`, `Pending -> TimedOut` or
//! `Pending -> Failed`. All three are terminal; the first transition wins and
//! every later one is a no-op.

use crate::domain::{RequestId, RpcError, RpcRequest, RpcResponse};
use crate::invoker::callback::{CallbackExecutor, InvokeCallback};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

enum CallState {
    Pending,
    Completed(RpcResponse),
    TimedOut,
    /// Ended locally without a response, e.g. on factory stop
    Failed(RpcError),
}

/// Terminal state observed by a waiter
enum Snapshot {
    Pending,
    Completed(RpcResponse),
    TimedOut,
    Failed(RpcError),
}

/// One in-flight request awaiting its response.
///
/// Created before the request is sent and owned by the
/// [`CallTable`](crate::invoker::table::CallTable) until removed.
pub struct PendingCall {
    request: Arc<RpcRequest>,
    state: Mutex<CallState>,
    notify: Notify,
    callback: Option<(Arc<dyn InvokeCallback>, CallbackExecutor)>,
    created_at: Instant,
    /// Configured deadline; zero means none
    timeout: Duration,
}

impl PendingCall {
    pub fn new(request: Arc<RpcRequest>, timeout: Duration) -> Self {
        Self {
            request,
            state: Mutex::new(CallState::Pending),
            notify: Notify::new(),
            callback: None,
            created_at: Instant::now(),
            timeout,
        }
    }

    /// Pending call whose outcome is delivered to `callback` on `executor`
    pub fn with_callback(
        request: Arc<RpcRequest>,
        timeout: Duration,
        callback: Arc<dyn InvokeCallback>,
        executor: CallbackExecutor,
    ) -> Self {
        Self {
            callback: Some((callback, executor)),
            ..Self::new(request, timeout)
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.request.request_id
    }

    pub fn request(&self) -> &RpcRequest {
        &self.request
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Whether the configured deadline has passed at `now`
    pub fn is_expired(&self, now: Instant) -> bool {
        !self.timeout.is_zero() && now.duration_since(self.created_at) > self.timeout
    }

    /// Completed, timed out or failed
    pub fn is_done(&self) -> bool {
        !matches!(*self.state.lock(), CallState::Pending)
    }

    /// Deliver the response. Returns false if the call was already terminal.
    pub fn complete(&self, response: RpcResponse) -> bool {
        let outcome = self.callback.as_ref().map(|_| response.clone().into_result());
        {
            let mut state = self.state.lock();
            if !matches!(*state, CallState::Pending) {
                return false;
            }
            *state = CallState::Completed(response);
        }
        self.notify.notify_waiters();

        if let (Some((callback, executor)), Some(outcome)) = (&self.callback, outcome) {
            executor.deliver(Arc::clone(callback), outcome);
        }
        true
    }

    /// Move to the timed-out state. Returns false if the call was already terminal.
    pub fn time_out(&self) -> bool {
        {
            let mut state = self.state.lock();
            if !matches!(*state, CallState::Pending) {
                return false;
            }
            *state = CallState::TimedOut;
        }
        self.notify.notify_waiters();

        if let Some((callback, executor)) = &self.callback {
            executor.deliver(Arc::clone(callback), Err(self.timeout_error(self.timeout)));
        }
        true
    }

    /// End the call with a local error. Returns false if the call was already terminal.
    pub fn fail(&self, error: RpcError) -> bool {
        {
            let mut state = self.state.lock();
            if !matches!(*state, CallState::Pending) {
                return false;
            }
            *state = CallState::Failed(error.clone());
        }
        self.notify.notify_waiters();

        if let Some((callback, executor)) = &self.callback {
            executor.deliver(Arc::clone(callback), Err(error));
        }
        true
    }

    /// Wait for the response.
    ///
    /// Returns at once if already completed. A zero `timeout` waits
    /// indefinitely. On timeout the call moves to `TimedOut`; the caller
    /// still has to remove it from the table.
    pub async fn wait(&self, timeout: Duration) -> Result<RpcResponse, RpcError> {
        if timeout.is_zero() {
            return self.wait_terminal(timeout).await;
        }

        match tokio::time::timeout(timeout, self.wait_terminal(timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                self.time_out();
                // A completion may have won the race
                match self.snapshot() {
                    Snapshot::Completed(response) => Ok(response),
                    Snapshot::Failed(error) => Err(error),
                    _ => Err(self.timeout_error(timeout)),
                }
            }
        }
    }

    async fn wait_terminal(&self, timeout: Duration) -> Result<RpcResponse, RpcError> {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking state so a concurrent completion is not missed
            notified.as_mut().enable();

            match self.snapshot() {
                Snapshot::Completed(response) => return Ok(response),
                Snapshot::TimedOut => return Err(self.timeout_error(timeout)),
                Snapshot::Failed(error) => return Err(error),
                Snapshot::Pending => {}
            }

            notified.await;
        }
    }

    fn snapshot(&self) -> Snapshot {
        match &*self.state.lock() {
            CallState::Pending => Snapshot::Pending,
            CallState::Completed(response) => Snapshot::Completed(response.clone()),
            CallState::TimedOut => Snapshot::TimedOut,
            CallState::Failed(error) => Snapshot::Failed(error.clone()),
        }
    }

    fn timeout_error(&self, timeout: Duration) -> RpcError {
        RpcError::Timeout {
            request: Box::new((*self.request).clone()),
            timeout,
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("request_id", &self.request.request_id)
            .field("done", &self.is_done())
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
