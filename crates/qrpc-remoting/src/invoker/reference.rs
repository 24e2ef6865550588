//! Invocation Dispatcher - per-interface call entry point.
//!
//! Every call goes through the same pipeline: build the request, resolve
//! the destination, then branch on the call type.
//!
//! | Call type | Correlation entry | Returns |
//! |-----------|-------------------|---------|
//! | SYNC      | registered, always removed after the wait | [`Invocation::Completed`] |
//! | FUTURE    | registered, removed when the handle is consumed or dropped | [`Invocation::Pending`] |
//! | CALLBACK  | registered with the callback, removed on completion | [`Invocation::Dispatched`] |
//! | ONEWAY    | none | [`Invocation::Dispatched`] |
//!
//! Resolution failures surface before any network activity for every
//! call type. A send failure removes the correlation entry before the
//! error propagates.

use crate::domain::{
    CallType, GenericCall, ReferenceConfig, RequestId, RpcError, RpcRequest, ServiceKey,
};
use crate::invoker::callback::InvokeCallback;
use crate::invoker::factory::InvokerFactory;
use crate::invoker::future::InvokeFuture;
use crate::invoker::pending::PendingCall;
use crate::invoker::pool::ConnectionPool;
use crate::invoker::resolver::AddressResolver;
use crate::ports::Transport;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call options, passed explicitly at the call site.
#[derive(Clone, Default)]
pub struct CallOptions {
    /// Callback for this call, overriding the reference's default
    pub callback: Option<Arc<dyn InvokeCallback>>,
    /// Timeout for this call, overriding the configured one
    pub timeout: Option<Duration>,
}

impl CallOptions {
    pub fn with_callback(mut self, callback: Arc<dyn InvokeCallback>) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for CallOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallOptions")
            .field("callback", &self.callback.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Outcome of a dispatched call
#[derive(Debug)]
pub enum Invocation {
    /// SYNC result
    Completed(Value),
    /// FUTURE handle
    Pending(InvokeFuture),
    /// CALLBACK or ONEWAY, nothing to return
    Dispatched,
}

impl Invocation {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Invocation::Completed(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_future(self) -> Option<InvokeFuture> {
        match self {
            Invocation::Pending(future) => Some(future),
            _ => None,
        }
    }

    pub fn is_dispatched(&self) -> bool {
        matches!(self, Invocation::Dispatched)
    }
}

/// Client stub for one remote interface.
///
/// Hand-written stubs wrap [`invoke`](Self::invoke); generic callers use
/// [`invoke_generic`](Self::invoke_generic).
pub struct RpcReference {
    config: ReferenceConfig,
    factory: Arc<InvokerFactory>,
    pool: Arc<ConnectionPool>,
    resolver: AddressResolver,
    default_callback: Option<Arc<dyn InvokeCallback>>,
}

impl RpcReference {
    pub fn new(
        config: ReferenceConfig,
        factory: Arc<InvokerFactory>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, RpcError> {
        config.validate()?;
        let pool = factory.pool_for(&transport);
        let resolver =
            AddressResolver::new(factory.registry().cloned(), config.load_balance.router());

        Ok(Self {
            config,
            factory,
            pool,
            resolver,
            default_callback: None,
        })
    }

    /// Callback used by CALLBACK calls that bring none of their own
    pub fn with_callback(mut self, callback: Arc<dyn InvokeCallback>) -> Self {
        self.default_callback = Some(callback);
        self
    }

    pub fn config(&self) -> &ReferenceConfig {
        &self.config
    }

    pub fn service_key(&self) -> ServiceKey {
        ServiceKey::make(&self.config.iface, self.config.version.as_deref())
    }

    /// Invoke `method` on the referenced interface
    pub async fn invoke(
        &self,
        method: &str,
        parameter_types: &[&str],
        parameters: Vec<Value>,
        options: CallOptions,
    ) -> Result<Invocation, RpcError> {
        let request = self.build_request(
            self.config.iface.clone(),
            self.config.version.clone(),
            method,
            parameter_types.iter().map(|t| t.to_string()).collect(),
            parameters,
        );
        self.dispatch(request, options).await
    }

    /// Invoke a call that carries its own interface, version and signature
    pub async fn invoke_generic(
        &self,
        call: GenericCall,
        options: CallOptions,
    ) -> Result<Invocation, RpcError> {
        let request = self.build_request(
            call.iface,
            call.version,
            &call.method,
            call.parameter_types,
            call.parameters,
        );
        self.dispatch(request, options).await
    }

    fn build_request(
        &self,
        class_name: String,
        version: Option<String>,
        method: &str,
        parameter_types: Vec<String>,
        parameters: Vec<Value>,
    ) -> RpcRequest {
        RpcRequest {
            request_id: RequestId::new(),
            create_millis_time: self.factory.clock().now_millis(),
            access_token: self.config.access_token.clone(),
            class_name,
            method_name: method.to_string(),
            parameter_types,
            parameters,
            version,
            oneway: false,
        }
    }

    async fn dispatch(
        &self,
        mut request: RpcRequest,
        options: CallOptions,
    ) -> Result<Invocation, RpcError> {
        if self.factory.is_stopped() {
            return Err(RpcError::Stopped);
        }

        let callback = match self.config.call_type {
            CallType::Callback => Some(
                options
                    .callback
                    .or_else(|| self.default_callback.clone())
                    .ok_or(RpcError::CallbackMissing)?,
            ),
            _ => None,
        };

        let address = self
            .resolver
            .resolve(&request.service_key(), self.config.static_address())?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        request.oneway = matches!(self.config.call_type, CallType::Oneway);
        let request = Arc::new(request);
        let table = self.factory.call_table();

        debug!(
            request_id = %request.request_id,
            call_type = %self.config.call_type,
            address = %address,
            method = %request.signature(),
            "Dispatching call"
        );

        match self.config.call_type {
            CallType::Sync => {
                let call = Arc::new(PendingCall::new(Arc::clone(&request), timeout));
                self.factory.register_call(Arc::clone(&call))?;

                if let Err(e) = self.send(&address, &request).await {
                    table.remove(&request.request_id);
                    return Err(e);
                }

                let outcome = call.wait(timeout).await;
                table.remove(&request.request_id);
                let value = outcome?.into_result()?;
                Ok(Invocation::Completed(value))
            }
            CallType::Future => {
                let call = Arc::new(PendingCall::new(Arc::clone(&request), timeout));
                self.factory.register_call(Arc::clone(&call))?;

                if let Err(e) = self.send(&address, &request).await {
                    table.remove(&request.request_id);
                    return Err(e);
                }
                Ok(Invocation::Pending(InvokeFuture::new(
                    call,
                    Arc::clone(table),
                    timeout,
                )))
            }
            CallType::Callback => {
                let callback = callback.ok_or(RpcError::CallbackMissing)?;
                let call = Arc::new(PendingCall::with_callback(
                    Arc::clone(&request),
                    timeout,
                    Arc::clone(&callback),
                    self.factory.callback_executor().clone(),
                ));
                // Rejected like the early stopped check: returned, not called back
                self.factory.register_call(call)?;

                if let Err(e) = self.send(&address, &request).await {
                    table.remove(&request.request_id);
                    callback.on_failure(e.clone());
                    return Err(e);
                }
                Ok(Invocation::Dispatched)
            }
            CallType::Oneway => {
                self.send(&address, &request).await?;
                Ok(Invocation::Dispatched)
            }
        }
    }

    async fn send(&self, address: &str, request: &RpcRequest) -> Result<(), RpcError> {
        let result = async {
            let connection = self.pool.acquire(address).await?;
            connection.send(request).await
        }
        .await;

        result.map_err(|e| {
            warn!(
                request_id = %request.request_id,
                address = %address,
                error = %e,
                "Invoke error"
            );
            RpcError::Transport(e)
        })
    }
}
