//! Invoker side: correlation, call semantics, connection reuse, and
//! address selection.

pub mod callback;
pub mod factory;
pub mod future;
pub mod pending;
pub mod pool;
pub mod reference;
pub mod resolver;
pub mod route;
pub mod table;

pub use callback::{CallbackExecutor, FnCallback, InvokeCallback};
pub use factory::InvokerFactory;
pub use future::InvokeFuture;
pub use pending::PendingCall;
pub use pool::ConnectionPool;
pub use reference::{CallOptions, Invocation, RpcReference};
pub use resolver::AddressResolver;
pub use route::{
    ConsistentHashBalancer, LfuBalancer, LoadBalancer, LruBalancer, RandomBalancer, RoundBalancer,
};
pub use table::{cleanup_task, CallStats, CallTable};
