//! Address Resolver - service key to one destination address.

use crate::domain::{RpcError, ServiceKey};
use crate::invoker::route::LoadBalancer;
use crate::ports::ServiceRegistry;
use std::sync::Arc;
use tracing::debug;

pub struct AddressResolver {
    registry: Option<Arc<dyn ServiceRegistry>>,
    balancer: Arc<dyn LoadBalancer>,
}

impl AddressResolver {
    pub fn new(registry: Option<Arc<dyn ServiceRegistry>>, balancer: Arc<dyn LoadBalancer>) -> Self {
        Self { registry, balancer }
    }

    /// Resolve the address for `service_key`.
    ///
    /// A configured static address wins without discovery. Otherwise one
    /// discovered candidate is used directly and several go through the
    /// load balancer.
    pub fn resolve(
        &self,
        service_key: &ServiceKey,
        static_address: Option<&str>,
    ) -> Result<String, RpcError> {
        if let Some(address) = static_address.map(str::trim).filter(|a| !a.is_empty()) {
            return Ok(address.to_string());
        }

        let unresolved = || RpcError::AddressUnresolved {
            service_key: service_key.clone(),
        };

        let candidates = match &self.registry {
            Some(registry) => registry.discover(service_key),
            None => return Err(unresolved()),
        };

        let address = match candidates.len() {
            0 => None,
            1 => candidates.into_iter().next(),
            _ => self.balancer.route(service_key, &candidates),
        };

        let address = address.filter(|a| !a.trim().is_empty()).ok_or_else(unresolved)?;
        debug!(service_key = %service_key, address = %address, "Address resolved");
        Ok(address)
    }
}
