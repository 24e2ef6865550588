//! Invoker Factory - lifecycle root of the invoker side.
//!
//! Owns the correlation table, the callback pool, the per-transport
//! connection pools, the stop-hook list and the registry client. Every
//! [`RpcReference`](crate::invoker::reference::RpcReference) holds an
//! `Arc` to one factory instead of reaching for process globals.

use crate::adapters::SystemClock;
use crate::domain::{ConfigError, InvokerConfig, RegistryError, RpcError};
use crate::invoker::callback::CallbackExecutor;
use crate::invoker::pending::PendingCall;
use crate::invoker::pool::ConnectionPool;
use crate::invoker::table::{cleanup_task, CallTable};
use crate::ports::{Clock, ResponseSink, ServiceRegistry, Transport};
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Teardown step run by [`InvokerFactory::stop`]
type StopHook = Box<dyn FnOnce() -> BoxFuture<'static, ()> + Send>;

pub struct InvokerFactory {
    config: InvokerConfig,
    table: Arc<CallTable>,
    callback_executor: CallbackExecutor,
    registry: Option<Arc<dyn ServiceRegistry>>,
    clock: Arc<dyn Clock>,
    /// Keyed by transport identity
    pools: DashMap<usize, Arc<ConnectionPool>>,
    stop_hooks: Mutex<Vec<StopHook>>,
    sweep: Mutex<Option<JoinHandle<()>>>,
    stopped: AtomicBool,
}

impl InvokerFactory {
    pub fn new(config: InvokerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            callback_executor: CallbackExecutor::new(config.callback_concurrency),
            config,
            table: Arc::new(CallTable::new()),
            registry: None,
            clock: Arc::new(SystemClock),
            pools: DashMap::new(),
            stop_hooks: Mutex::new(Vec::new()),
            sweep: Mutex::new(None),
            stopped: AtomicBool::new(false),
        })
    }

    /// Use `registry` for address discovery
    pub fn with_registry(mut self, registry: Arc<dyn ServiceRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Start the registry client and the expired-call sweep
    pub async fn start(&self) -> Result<(), RegistryError> {
        if let Some(registry) = &self.registry {
            registry.start().await?;
        }

        let sweep = tokio::spawn(cleanup_task(
            Arc::clone(&self.table),
            self.config.sweep_interval,
        ));
        if let Some(previous) = self.sweep.lock().replace(sweep) {
            previous.abort();
        }

        info!(
            sweep_interval_ms = self.config.sweep_interval.as_millis() as u64,
            "Invoker factory started"
        );
        Ok(())
    }

    /// Stop the factory.
    ///
    /// Fails every in-flight call with [`RpcError::Stopped`], runs stop hooks
    /// in reverse registration order, then stops the registry client.
    pub async fn stop(&self) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }

        if let Some(sweep) = self.sweep.lock().take() {
            sweep.abort();
        }

        let failed = self.table.fail_all(RpcError::Stopped);
        if failed > 0 {
            warn!(failed = failed, "Failed in-flight calls on stop");
        }

        let hooks: Vec<StopHook> = std::mem::take(&mut *self.stop_hooks.lock());
        for hook in hooks.into_iter().rev() {
            hook().await;
        }
        self.pools.clear();

        // Anything registered while the hooks ran
        let late = self.table.fail_all(RpcError::Stopped);
        if late > 0 {
            warn!(failed = late, "Failed calls registered during stop");
        }

        if let Some(registry) = &self.registry {
            registry.stop().await;
        }

        info!("Invoker factory stopped");
    }

    /// Register `call` in the correlation table unless the factory is stopped.
    ///
    /// The stopped flag is checked after the insert, so a call racing
    /// [`stop`](Self::stop) is either failed by it or rejected here.
    pub fn register_call(&self, call: Arc<PendingCall>) -> Result<(), RpcError> {
        let request_id = call.request_id();
        self.table.register(call);
        if self.is_stopped() {
            self.table.remove(&request_id);
            return Err(RpcError::Stopped);
        }
        Ok(())
    }

    /// Register a teardown step for [`stop`](Self::stop)
    pub fn add_stop_hook<F, Fut>(&self, hook: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop_hooks.lock().push(Box::new(move || hook().boxed()));
    }

    /// Connection pool for `transport`, created on first use.
    ///
    /// One pool per transport instance, so two transports sharing a name
    /// never share connections. The pool closes itself on stop.
    pub fn pool_for(&self, transport: &Arc<dyn Transport>) -> Arc<ConnectionPool> {
        // The pool holds the Arc, so the address stays unique while keyed
        let key = Arc::as_ptr(transport) as *const () as usize;
        if let Some(pool) = self.pools.get(&key) {
            return Arc::clone(pool.value());
        }

        let mut created = false;
        let pool = Arc::clone(
            self.pools
                .entry(key)
                .or_insert_with(|| {
                    created = true;
                    let sink: Arc<dyn ResponseSink> = self.table.clone();
                    Arc::new(ConnectionPool::new(Arc::clone(transport), sink))
                })
                .value(),
        );

        if created {
            let closing = Arc::clone(&pool);
            self.add_stop_hook(move || async move { closing.close_all().await });
            debug!(transport = %transport.name(), "Connection pool created");
        }
        pool
    }

    pub fn call_table(&self) -> &Arc<CallTable> {
        &self.table
    }

    pub fn callback_executor(&self) -> &CallbackExecutor {
        &self.callback_executor
    }

    pub fn registry(&self) -> Option<&Arc<dyn ServiceRegistry>> {
        self.registry.as_ref()
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}
