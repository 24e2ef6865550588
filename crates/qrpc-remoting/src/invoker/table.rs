//! Call Correlation Table - request id to in-flight call.
//!
//! Flow:
//! 1. Dispatcher builds a [`PendingCall`] and calls `register()`
//! 2. Dispatcher sends the request on a pooled connection
//! 3. The transport read task decodes the response and calls `complete()`
//! 4. `complete()` removes the entry and releases the waiter or runs the callback
//!
//! A response whose id is no longer present (timed out, discarded, or
//! already completed) is dropped. An id never resurrects after removal.

use crate::domain::{RequestId, RpcError, RpcResponse};
use crate::invoker::pending::PendingCall;
use crate::ports::ResponseSink;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Statistics for the correlation table
#[derive(Debug, Default)]
pub struct CallStats {
    /// Total calls registered
    pub total_registered: AtomicU64,
    /// Total calls completed with a response
    pub total_completed: AtomicU64,
    /// Total calls expired by the sweep
    pub total_timeouts: AtomicU64,
    /// Total calls removed before completion
    pub total_cancelled: AtomicU64,
    /// Total responses dropped for unknown or finished ids
    pub total_discarded: AtomicU64,
}

/// Process-scoped map of in-flight calls.
///
/// Sharded by request id, so unrelated ids never contend on one lock.
#[derive(Default)]
pub struct CallTable {
    pending: DashMap<RequestId, Arc<PendingCall>>,
    stats: CallStats,
}

impl CallTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an in-flight call under its request id
    pub fn register(&self, call: Arc<PendingCall>) {
        let request_id = call.request_id();
        self.pending.insert(request_id, call);
        self.stats.total_registered.fetch_add(1, Ordering::Relaxed);

        debug!(request_id = %request_id, "Registered pending call");
    }

    /// Complete the call matching `response.request_id`.
    ///
    /// Returns true if the call was found and completed, false if the
    /// response was discarded.
    pub fn complete(&self, response: RpcResponse) -> bool {
        let request_id = response.request_id;
        let Some((_, call)) = self.pending.remove(&request_id) else {
            self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_id = %request_id,
                "Response for unknown or expired request id, discarding"
            );
            return false;
        };

        let elapsed = call.elapsed();
        if call.complete(response) {
            self.stats.total_completed.fetch_add(1, Ordering::Relaxed);
            debug!(
                request_id = %request_id,
                response_time_ms = elapsed.as_millis() as u64,
                "Completed pending call"
            );
            true
        } else {
            // Timed out between the waiter's deadline and its removal
            self.stats.total_discarded.fetch_add(1, Ordering::Relaxed);
            debug!(request_id = %request_id, "Pending call already finished, discarding response");
            false
        }
    }

    /// Remove an entry without completing it. Idempotent.
    pub fn remove(&self, request_id: &RequestId) -> Option<Arc<PendingCall>> {
        let removed = self.pending.remove(request_id).map(|(_, call)| call);
        if let Some(call) = &removed {
            if !call.is_done() {
                self.stats.total_cancelled.fetch_add(1, Ordering::Relaxed);
            }
        }
        removed
    }

    /// Time out and remove every call past its deadline.
    ///
    /// Returns the number of calls removed.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let expired: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|entry| entry.value().is_expired(now))
            .map(|entry| *entry.key())
            .collect();

        let mut removed = 0;
        for request_id in expired {
            let Some((_, call)) = self.pending.remove(&request_id) else {
                continue;
            };
            warn!(
                request_id = %request_id,
                elapsed_ms = call.elapsed().as_millis() as u64,
                "Removing expired pending call"
            );
            call.time_out();
            self.stats.total_timeouts.fetch_add(1, Ordering::Relaxed);
            removed += 1;
        }
        removed
    }

    /// Fail every pending call with `error` and clear the table.
    ///
    /// Returns the number of calls failed.
    pub fn fail_all(&self, error: RpcError) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|entry| *entry.key()).collect();
        let mut failed = 0;
        for request_id in ids {
            if let Some((_, call)) = self.pending.remove(&request_id) {
                if call.fail(error.clone()) {
                    failed += 1;
                }
            }
        }
        failed
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, request_id: &RequestId) -> bool {
        self.pending.contains_key(request_id)
    }

    pub fn stats(&self) -> &CallStats {
        &self.stats
    }
}

impl ResponseSink for CallTable {
    fn deliver(&self, response: RpcResponse) {
        self.complete(response);
    }
}

/// Background task to time out expired calls
pub async fn cleanup_task(table: Arc<CallTable>, interval: Duration) {
    let mut cleanup_interval = tokio::time::interval(interval);
    cleanup_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        cleanup_interval.tick().await;
        let removed = table.remove_expired();
        if removed > 0 {
            debug!(removed = removed, "Cleaned up expired pending calls");
        }
    }
}
