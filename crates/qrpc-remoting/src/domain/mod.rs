//! Domain types for the remoting core.
//!
//! Pure value types, configuration, and error handling. No I/O.

pub mod config;
pub mod error;
pub mod request_id;
pub mod types;

pub use config::{HandlerPoolConfig, InvokerConfig, ProviderConfig, ReferenceConfig};
pub use error::{
    CodecError, ConfigError, HandlerPoolError, ProviderError, RegistryError, RpcError,
    TransportError,
};
pub use request_id::RequestId;
pub use types::{CallType, GenericCall, LoadBalance, RpcRequest, RpcResponse, ServiceKey};
