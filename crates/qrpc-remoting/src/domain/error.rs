//! Error taxonomy for the remoting core.
//!
//! Caller-side failures surface as [`RpcError`]; provider-side failures are
//! always folded into a well-formed response and reach the caller as
//! [`RpcError::Remote`].

use crate::domain::types::{RpcRequest, ServiceKey};
use std::time::Duration;

/// Errors surfaced to code invoking a remote method
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// No destination address could be found for the service key
    #[error("address unresolved for service {service_key}")]
    AddressUnresolved { service_key: ServiceKey },

    /// The call did not complete within its deadline
    #[error("request timeout after {}ms: {request}", timeout.as_millis())]
    Timeout {
        request: Box<RpcRequest>,
        timeout: Duration,
    },

    /// The provider answered with an error message
    #[error("remote error: {0}")]
    Remote(String),

    /// Connection establishment or send failed locally
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    /// Unknown call type name
    #[error("call type [{0}] invalid")]
    CallTypeInvalid(String),

    /// CALLBACK semantics requested with no callback available
    #[error("callback missing for call type CALLBACK")]
    CallbackMissing,

    /// The invoker factory was stopped while the call was in flight
    #[error("invoker factory stopped")]
    Stopped,

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl RpcError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, RpcError::Timeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, RpcError::Transport(_))
    }
}

/// Transport-level failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection refused: {0}")]
    ConnectionRefused(String),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("connection closed: {0}")]
    Closed(String),

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("address already bound: {0}")]
    AddressInUse(String),
}

/// Serialization failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("encode failed: {0}")]
    Encode(String),

    #[error("decode failed: {0}")]
    Decode(String),
}

/// Service registry failures
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    #[error("registry not started")]
    NotStarted,
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// Reference without an interface name
    #[error("interface name missing")]
    MissingInterface,

    /// Invalid size or count limit
    #[error("invalid limit: {0}")]
    InvalidLimit(String),

    /// Invalid duration value
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),

    /// General configuration error
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Server handler pool failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerPoolError {
    /// Every worker busy and the queue full
    #[error("provider thread pool is EXHAUSTED!")]
    Exhausted,

    #[error("handler task failed: {0}")]
    TaskFailed(String),
}

/// Provider lifecycle errors
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("server bind error: {0}")]
    Bind(#[from] TransportError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("provider already started")]
    AlreadyStarted,
}
