//! Provider side: service registration, request validation and dispatch.

pub mod dispatch;
pub mod factory;
pub mod pool;
pub mod service;

pub use dispatch::{constant_time_compare, ProviderDispatch};
pub use factory::ProviderFactory;
pub use pool::ServerHandlerPool;
pub use service::{method_signature, MethodHandler, ServiceBean};
