//! In-memory service registry.

use crate::domain::{RegistryError, ServiceKey};
use crate::ports::ServiceRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Service key to address set, shared by providers and invokers in one
/// process.
#[derive(Default)]
pub struct LocalServiceRegistry {
    services: DashMap<ServiceKey, BTreeSet<String>>,
    started: AtomicBool,
}

impl LocalServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    fn ensure_started(&self) -> Result<(), RegistryError> {
        if self.is_started() {
            Ok(())
        } else {
            Err(RegistryError::NotStarted)
        }
    }
}

#[async_trait]
impl ServiceRegistry for LocalServiceRegistry {
    async fn start(&self) -> Result<(), RegistryError> {
        if !self.started.swap(true, Ordering::SeqCst) {
            info!("Local service registry started");
        }
        Ok(())
    }

    async fn stop(&self) {
        if self.started.swap(false, Ordering::SeqCst) {
            info!("Local service registry stopped");
        }
    }

    async fn register(
        &self,
        keys: &BTreeSet<ServiceKey>,
        address: &str,
    ) -> Result<bool, RegistryError> {
        self.ensure_started()?;
        if keys.is_empty() || address.trim().is_empty() {
            return Ok(false);
        }
        for key in keys {
            self.services
                .entry(key.clone())
                .or_default()
                .insert(address.to_string());
            debug!(service_key = %key, address = %address, "Service registered");
        }
        Ok(true)
    }

    async fn remove(
        &self,
        keys: &BTreeSet<ServiceKey>,
        address: &str,
    ) -> Result<bool, RegistryError> {
        self.ensure_started()?;
        for key in keys {
            if let Some(mut addresses) = self.services.get_mut(key) {
                addresses.remove(address);
            }
            self.services.remove_if(key, |_, addresses| addresses.is_empty());
            debug!(service_key = %key, address = %address, "Service removed");
        }
        Ok(true)
    }

    fn discover(&self, key: &ServiceKey) -> BTreeSet<String> {
        self.services
            .get(key)
            .map(|addresses| addresses.value().clone())
            .unwrap_or_default()
    }
}
