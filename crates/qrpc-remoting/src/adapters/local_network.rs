//! In-process network: transport and server over tokio channels.
//!
//! Each connection has a writer channel carrying encoded requests to the
//! bound endpoint and a reader task carrying encoded responses back to the
//! invoker's [`ResponseSink`]. Both directions go through the [`Codec`], so
//! requests and responses cross a real serialization boundary. Oneway
//! requests are handled but never answered.

use crate::domain::TransportError;
use crate::ports::{Codec, Connection, RequestHandler, ResponseSink, Server, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

#[derive(Clone)]
struct Endpoint {
    handler: Arc<dyn RequestHandler>,
    /// Cleared on unbind; every connection to the endpoint observes it
    alive: Arc<AtomicBool>,
}

/// Address space of in-process providers
pub struct LocalNetwork {
    codec: Arc<dyn Codec>,
    endpoints: DashMap<String, Endpoint>,
}

impl LocalNetwork {
    pub fn new(codec: Arc<dyn Codec>) -> Self {
        Self {
            codec,
            endpoints: DashMap::new(),
        }
    }

    pub fn is_bound(&self, address: &str) -> bool {
        self.endpoints.contains_key(address)
    }
}

#[async_trait]
impl Transport for LocalNetwork {
    fn name(&self) -> &str {
        "local"
    }

    async fn open(
        &self,
        address: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Arc<dyn Connection>, TransportError> {
        if address.trim().is_empty() {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }
        let endpoint = self
            .endpoints
            .get(address)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| TransportError::ConnectionRefused(address.to_string()))?;

        let connection = LocalConnection::open(address, endpoint, Arc::clone(&self.codec), sink);
        Ok(Arc::new(connection))
    }
}

#[async_trait]
impl Server for LocalNetwork {
    async fn bind(
        &self,
        address: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), TransportError> {
        if address.trim().is_empty() {
            return Err(TransportError::InvalidAddress(address.to_string()));
        }
        match self.endpoints.entry(address.to_string()) {
            Entry::Occupied(_) => Err(TransportError::AddressInUse(address.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(Endpoint {
                    handler,
                    alive: Arc::new(AtomicBool::new(true)),
                });
                info!(address = %address, "Local endpoint bound");
                Ok(())
            }
        }
    }

    async fn unbind(&self, address: &str) {
        if let Some((_, endpoint)) = self.endpoints.remove(address) {
            endpoint.alive.store(false, Ordering::SeqCst);
            info!(address = %address, "Local endpoint unbound");
        }
    }
}

/// One connection to a [`LocalNetwork`] endpoint
pub struct LocalConnection {
    address: String,
    codec: Arc<dyn Codec>,
    writer: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    endpoint_alive: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl LocalConnection {
    fn open(
        address: &str,
        endpoint: Endpoint,
        codec: Arc<dyn Codec>,
        sink: Arc<dyn ResponseSink>,
    ) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<Bytes>();
        let (response_tx, mut response_rx) = mpsc::unbounded_channel::<Bytes>();
        let endpoint_alive = Arc::clone(&endpoint.alive);

        // Provider side: requests are handled concurrently, so responses
        // may come back in any order
        let server_codec = Arc::clone(&codec);
        let server_address = address.to_string();
        tokio::spawn(async move {
            while let Some(frame) = request_rx.recv().await {
                if !endpoint.alive.load(Ordering::SeqCst) {
                    debug!(address = %server_address, "Endpoint gone, dropping connection");
                    break;
                }
                let request = match server_codec.decode_request(&frame) {
                    Ok(request) => request,
                    Err(e) => {
                        warn!(address = %server_address, error = %e, "Undecodable request frame");
                        continue;
                    }
                };

                let handler = Arc::clone(&endpoint.handler);
                let codec = Arc::clone(&server_codec);
                let response_tx = response_tx.clone();
                let oneway = request.oneway;
                tokio::spawn(async move {
                    let response = handler.handle(request).await;
                    if oneway {
                        return;
                    }
                    match codec.encode_response(&response) {
                        Ok(frame) => {
                            let _ = response_tx.send(frame);
                        }
                        Err(e) => {
                            warn!(request_id = %response.request_id, error = %e, "Response encode failed");
                        }
                    }
                });
            }
        });

        // Invoker side read loop
        let client_codec = Arc::clone(&codec);
        let client_address = address.to_string();
        tokio::spawn(async move {
            while let Some(frame) = response_rx.recv().await {
                match client_codec.decode_response(&frame) {
                    Ok(response) => sink.deliver(response),
                    Err(e) => {
                        warn!(address = %client_address, error = %e, "Undecodable response frame");
                    }
                }
            }
            debug!(address = %client_address, "Connection reader stopped");
        });

        Self {
            address: address.to_string(),
            codec,
            writer: Mutex::new(Some(request_tx)),
            endpoint_alive,
            closed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl Connection for LocalConnection {
    fn address(&self) -> &str {
        &self.address
    }

    async fn send(&self, request: &crate::domain::RpcRequest) -> Result<(), TransportError> {
        if !self.is_valid() {
            return Err(TransportError::Closed(self.address.clone()));
        }
        let frame = self
            .codec
            .encode_request(request)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        match self.writer.lock().as_ref() {
            Some(writer) => writer
                .send(frame)
                .map_err(|_| TransportError::Closed(self.address.clone())),
            None => Err(TransportError::Closed(self.address.clone())),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.writer.lock().take();
    }

    fn is_valid(&self) -> bool {
        !self.closed.load(Ordering::SeqCst) && self.endpoint_alive.load(Ordering::SeqCst)
    }
}
