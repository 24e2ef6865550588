//! Handle returned by FUTURE calls.

use crate::domain::{RequestId, RpcError};
use crate::invoker::pending::PendingCall;
use crate::invoker::table::CallTable;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Eventual result of a FUTURE call.
///
/// Dropping the handle discards the correlation entry, so a response that
/// arrives afterwards is dropped by the table.
#[must_use = "dropping an InvokeFuture discards the call's result"]
pub struct InvokeFuture {
    call: Arc<PendingCall>,
    table: Arc<CallTable>,
    timeout: Duration,
}

impl InvokeFuture {
    pub(crate) fn new(call: Arc<PendingCall>, table: Arc<CallTable>, timeout: Duration) -> Self {
        Self {
            call,
            table,
            timeout,
        }
    }

    pub fn request_id(&self) -> RequestId {
        self.call.request_id()
    }

    /// Whether the response (or a timeout) has been recorded
    pub fn is_done(&self) -> bool {
        self.call.is_done()
    }

    /// Wait for the result with the call's configured timeout
    pub async fn get(&self) -> Result<Value, RpcError> {
        self.get_timeout(self.timeout).await
    }

    /// Wait for the result with an explicit timeout; zero waits indefinitely
    pub async fn get_timeout(&self, timeout: Duration) -> Result<Value, RpcError> {
        let outcome = self.call.wait(timeout).await;
        if outcome.is_err() {
            self.table.remove(&self.call.request_id());
        }
        outcome?.into_result()
    }
}

impl Drop for InvokeFuture {
    fn drop(&mut self) {
        self.table.remove(&self.call.request_id());
    }
}

impl std::fmt::Debug for InvokeFuture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeFuture")
            .field("request_id", &self.call.request_id())
            .field("done", &self.call.is_done())
            .finish()
    }
}
