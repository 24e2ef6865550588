//! Connection Pool - one live connection per destination address.
//!
//! Fast path is a sharded map lookup plus a validity check. First use and
//! repair of an invalid entry go through a per-address async lock with a
//! second check, so concurrent callers for the same address open at most
//! one connection and unrelated addresses never wait on each other.

use crate::domain::TransportError;
use crate::ports::{Connection, ResponseSink, Transport};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub struct ConnectionPool {
    transport: Arc<dyn Transport>,
    sink: Arc<dyn ResponseSink>,
    connections: DashMap<String, Arc<dyn Connection>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConnectionPool {
    /// Pool over `transport`; responses from every connection go to `sink`
    pub fn new(transport: Arc<dyn Transport>, sink: Arc<dyn ResponseSink>) -> Self {
        Self {
            transport,
            sink,
            connections: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// Get a valid connection to `address`, opening one if needed.
    ///
    /// An open failure is returned as-is and leaves no entry behind.
    pub async fn acquire(&self, address: &str) -> Result<Arc<dyn Connection>, TransportError> {
        if let Some(connection) = self.cached(address) {
            return Ok(connection);
        }

        let lock = Arc::clone(self.locks.entry(address.to_string()).or_default().value());
        let _guard = lock.lock().await;

        // Another caller may have repaired it while we waited
        if let Some(connection) = self.cached(address) {
            return Ok(connection);
        }

        if let Some((_, stale)) = self.connections.remove(address) {
            debug!(address = %address, "Closing invalid pooled connection");
            stale.close().await;
        }

        let connection = self.transport.open(address, Arc::clone(&self.sink)).await?;
        self.connections
            .insert(address.to_string(), Arc::clone(&connection));

        info!(
            address = %address,
            transport = self.transport.name(),
            "Connection created"
        );
        Ok(connection)
    }

    fn cached(&self, address: &str) -> Option<Arc<dyn Connection>> {
        self.connections
            .get(address)
            .filter(|connection| connection.is_valid())
            .map(|connection| Arc::clone(connection.value()))
    }

    /// Close every pooled connection and clear the pool
    pub async fn close_all(&self) {
        let addresses: Vec<String> = self
            .connections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();

        for address in addresses {
            if let Some((_, connection)) = self.connections.remove(&address) {
                connection.close().await;
            }
        }
        self.locks.clear();

        debug!(transport = self.transport.name(), "Connection pool closed");
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
