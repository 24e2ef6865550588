//! Provider Factory - lifecycle root of the provider side.
//!
//! `start` binds the server at the configured address, then publishes
//! every service key to the registry. `stop` undoes both in reverse order
//! and stops the registry client. A failed `start` leaves nothing bound and
//! the registry client stopped.

use crate::adapters::SystemClock;
use crate::domain::{ProviderConfig, ProviderError, RpcRequest, RpcResponse, ServiceKey};
use crate::ports::{Clock, RequestHandler, Server, ServiceRegistry};
use crate::provider::dispatch::ProviderDispatch;
use crate::provider::pool::ServerHandlerPool;
use crate::provider::service::ServiceBean;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub struct ProviderFactory {
    config: ProviderConfig,
    dispatch: Arc<ProviderDispatch>,
    handler_pool: ServerHandlerPool,
    registry: Option<Arc<dyn ServiceRegistry>>,
    /// Bound server while started
    server: Mutex<Option<Arc<dyn Server>>>,
}

impl ProviderFactory {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        config.validate()?;
        Ok(Self {
            dispatch: Arc::new(ProviderDispatch::new(&config, Arc::new(SystemClock))),
            handler_pool: ServerHandlerPool::new(&config.handler_pool),
            config,
            registry: None,
            server: Mutex::new(None),
        })
    }

    /// Publish service keys to `registry` on start
    pub fn with_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.dispatch = Arc::new(self.dispatch.with_clock(clock));
        self
    }

    /// Expose `bean` under `iface` and `version`.
    ///
    /// Services added after `start` are served but not published to the
    /// registry until the next start.
    pub fn add_service(&self, iface: &str, version: Option<&str>, bean: ServiceBean) {
        let key = ServiceKey::make(iface, version);
        info!(service_key = %key, methods = bean.len(), "Provider service added");
        self.dispatch.add_service(key, bean);
    }

    /// Run provider dispatch directly, bypassing the handler pool
    pub fn invoke(&self, request: &RpcRequest) -> RpcResponse {
        self.dispatch.invoke(request)
    }

    /// Request handler to bind on a server
    pub fn handler(&self) -> Arc<dyn RequestHandler> {
        Arc::new(ProviderHandler {
            dispatch: Arc::clone(&self.dispatch),
            pool: self.handler_pool.clone(),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub async fn is_started(&self) -> bool {
        self.server.lock().await.is_some()
    }

    pub async fn start(&self, server: Arc<dyn Server>) -> Result<(), ProviderError> {
        let mut slot = self.server.lock().await;
        if slot.is_some() {
            return Err(ProviderError::AlreadyStarted);
        }

        if let Some(registry) = &self.registry {
            registry.start().await?;
        }

        let address = self.config.address.as_str();
        if let Err(e) = server.bind(address, self.handler()).await {
            self.stop_registry().await;
            return Err(e.into());
        }

        if let Some(registry) = &self.registry {
            let keys = self.dispatch.service_keys();
            if let Err(e) = registry.register(&keys, address).await {
                server.unbind(address).await;
                self.stop_registry().await;
                return Err(e.into());
            }
        }

        *slot = Some(server);
        info!(
            address = %address,
            services = self.dispatch.service_keys().len(),
            "Provider factory started"
        );
        Ok(())
    }

    pub async fn stop(&self) {
        let Some(server) = self.server.lock().await.take() else {
            return;
        };
        let address = self.config.address.as_str();

        if let Some(registry) = &self.registry {
            let keys = self.dispatch.service_keys();
            if let Err(e) = registry.remove(&keys, address).await {
                warn!(address = %address, error = %e, "Failed to remove services from registry");
            }
        }

        server.unbind(address).await;
        self.stop_registry().await;

        info!(address = %address, "Provider factory stopped");
    }

    async fn stop_registry(&self) {
        if let Some(registry) = &self.registry {
            registry.stop().await;
        }
    }
}

/// Bridges the server to dispatch through the handler pool
struct ProviderHandler {
    dispatch: Arc<ProviderDispatch>,
    pool: ServerHandlerPool,
}

#[async_trait]
impl RequestHandler for ProviderHandler {
    async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let request_id = request.request_id;
        let dispatch = Arc::clone(&self.dispatch);

        match self.pool.run(move || dispatch.invoke(&request)).await {
            Ok(response) => response,
            Err(e) => RpcResponse::failure(request_id, e.to_string()),
        }
    }
}
