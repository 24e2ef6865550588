// Allow missing docs for internal items in development
#![allow(missing_docs)]

//! QRPC Remoting - invocation and dispatch engine.
//!
//! Lets a caller invoke an interface method as if it were local while the
//! implementation runs behind a transport, selected by service discovery
//! and load balancing.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────── INVOKER ─────────────────────────┐
//! │                                                            │
//! │  RpcReference::invoke(method, types, params, CallOptions)  │
//! │          │                                                 │
//! │          ▼                                                 │
//! │  AddressResolver ──► ServiceRegistry::discover             │
//! │          │                 └─► LoadBalancer::route (≥2)    │
//! │          ▼                                                 │
//! │  CallTable::register ──► ConnectionPool::acquire ──► send  │
//! │          ▲                                           │     │
//! │          │ complete(response)                        │     │
//! │  ResponseSink ◄──────── transport read task ◄────────┤     │
//! │          │                                           │     │
//! │          ▼                                           │     │
//! │  PendingCall: wake SYNC/FUTURE waiter                │     │
//! │               or CallbackExecutor → InvokeCallback   │     │
//! └──────────────────────────────────────────────────────┼─────┘
//!                                                        │
//! ┌───────────────────────── PROVIDER ───────────────────┼─────┐
//! │                                                      ▼     │
//! │  Server ──► ServerHandlerPool ──► ProviderDispatch::invoke │
//! │               service key → staleness → token → method     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Call Types
//!
//! - **SYNC**: wait for the response up to the timeout
//! - **FUTURE**: return an [`InvokeFuture`] handle immediately
//! - **CALLBACK**: return immediately; an [`InvokeCallback`] gets the outcome
//! - **ONEWAY**: send only, nothing is correlated
//!
//! # Usage
//!
//! ```ignore
//! use qrpc_remoting::*;
//!
//! let network = Arc::new(LocalNetwork::new(Arc::new(JsonCodec)));
//!
//! let provider = ProviderFactory::new(ProviderConfig::new("local:7080"))?;
//! provider.add_service("Echo", Some("v1"), ServiceBean::new()
//!     .typed_method("echo", &["String"], |(s,): (String,)| Ok(s)));
//! provider.start(network.clone()).await?;
//!
//! let factory = Arc::new(InvokerFactory::new(InvokerConfig::default())?);
//! factory.start().await?;
//! let echo = RpcReference::new(
//!     ReferenceConfig::new("Echo").with_version("v1").with_address("local:7080"),
//!     factory.clone(),
//!     network,
//! )?;
//! let reply = echo.invoke("echo", &["String"], vec!["hi".into()], CallOptions::default()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod invoker;
pub mod ports;
pub mod provider;

pub use adapters::{FixedClock, JsonCodec, LocalNetwork, LocalServiceRegistry, SystemClock};
pub use domain::{
    CallType, CodecError, ConfigError, GenericCall, HandlerPoolConfig, HandlerPoolError,
    InvokerConfig, LoadBalance, ProviderConfig, ProviderError, ReferenceConfig, RegistryError,
    RequestId, RpcError, RpcRequest, RpcResponse, ServiceKey, TransportError,
};
pub use invoker::{
    CallOptions, CallTable, FnCallback, Invocation, InvokeCallback, InvokeFuture, InvokerFactory,
    LoadBalancer, RpcReference,
};
pub use ports::{
    Clock, Codec, Connection, RequestHandler, ResponseSink, Server, ServiceRegistry, Transport,
};
pub use provider::{ProviderFactory, ServiceBean};
