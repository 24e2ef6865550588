//! # Driven Ports (Outbound SPI)
//!
//! Interfaces the remoting core requires the host to provide: a transport
//! with its codec, a service registry, and a time source.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`; they are shared by every caller
//! task and by the transport's own delivery tasks.

use crate::domain::{CodecError, RegistryError, RpcRequest, RpcResponse, ServiceKey, TransportError};
use crate::ports::inbound::{RequestHandler, ResponseSink};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Opens connections to provider addresses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Short name, used to key connection pools
    fn name(&self) -> &str;

    /// Open and initialize a connection to `address`.
    ///
    /// Responses read from the connection are handed to `sink`.
    async fn open(
        &self,
        address: &str,
        sink: Arc<dyn ResponseSink>,
    ) -> Result<Arc<dyn Connection>, TransportError>;
}

/// One logical connection to a provider address.
#[async_trait]
pub trait Connection: Send + Sync {
    fn address(&self) -> &str;

    /// Write a request. Returns once the request is handed to the transport;
    /// the matching response arrives later through the [`ResponseSink`].
    async fn send(&self, request: &RpcRequest) -> Result<(), TransportError>;

    async fn close(&self);

    fn is_valid(&self) -> bool;
}

/// Provider-side endpoint binding.
#[async_trait]
pub trait Server: Send + Sync {
    /// Start accepting requests at `address`, dispatching them to `handler`
    async fn bind(
        &self,
        address: &str,
        handler: Arc<dyn RequestHandler>,
    ) -> Result<(), TransportError>;

    /// Stop accepting requests at `address` and close its connections
    async fn unbind(&self, address: &str);
}

/// Stable, versioned wire representation of requests and responses.
pub trait Codec: Send + Sync {
    fn encode_request(&self, request: &RpcRequest) -> Result<Bytes, CodecError>;

    fn decode_request(&self, bytes: &[u8]) -> Result<RpcRequest, CodecError>;

    fn encode_response(&self, response: &RpcResponse) -> Result<Bytes, CodecError>;

    fn decode_response(&self, bytes: &[u8]) -> Result<RpcResponse, CodecError>;
}

/// Service key to address-set store.
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    async fn start(&self) -> Result<(), RegistryError>;

    async fn stop(&self);

    /// Publish `address` under every key
    async fn register(
        &self,
        keys: &BTreeSet<ServiceKey>,
        address: &str,
    ) -> Result<bool, RegistryError>;

    /// Withdraw `address` from every key
    async fn remove(
        &self,
        keys: &BTreeSet<ServiceKey>,
        address: &str,
    ) -> Result<bool, RegistryError>;

    /// Known addresses for a key, in stable order
    fn discover(&self, key: &ServiceKey) -> BTreeSet<String>;
}

/// Time source, injectable for deterministic tests.
pub trait Clock: Send + Sync {
    /// Current time in unix milliseconds
    fn now_millis(&self) -> u64;
}
