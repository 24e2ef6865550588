//! Provider Dispatch - validates a request and invokes the target method.
//!
//! Gates, in order; the first failure short-circuits with an error response:
//! 1. Service lookup by service key
//! 2. Staleness window on the request's creation time
//! 3. Access token, when one is configured
//! 4. Method lookup by name and parameter types, then invocation
//!
//! Nothing escapes this boundary: handler errors and panics become the
//! response's `error_msg`.

use crate::domain::{ProviderConfig, RpcRequest, RpcResponse, ServiceKey};
use crate::ports::Clock;
use crate::provider::service::{method_signature, ServiceBean};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

pub struct ProviderDispatch {
    services: DashMap<ServiceKey, Arc<ServiceBean>>,
    access_token: Option<String>,
    max_request_age: Duration,
    clock: Arc<dyn Clock>,
}

impl ProviderDispatch {
    pub fn new(config: &ProviderConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            services: DashMap::new(),
            access_token: config.required_token().map(str::to_string),
            max_request_age: config.max_request_age,
            clock,
        }
    }

    /// Same services and limits, different time source
    pub fn with_clock(&self, clock: Arc<dyn Clock>) -> Self {
        Self {
            services: self.services.clone(),
            access_token: self.access_token.clone(),
            max_request_age: self.max_request_age,
            clock,
        }
    }

    /// Register (or replace) the implementation for `key`
    pub fn add_service(&self, key: ServiceKey, bean: ServiceBean) {
        debug!(service_key = %key, methods = bean.len(), "Service added");
        self.services.insert(key, Arc::new(bean));
    }

    pub fn service_keys(&self) -> BTreeSet<ServiceKey> {
        self.services.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Run the dispatch gates for one request. Never panics.
    pub fn invoke(&self, request: &RpcRequest) -> RpcResponse {
        let request_id = request.request_id;
        let service_key = request.service_key();

        let Some(bean) = self.services.get(&service_key).map(|e| Arc::clone(e.value())) else {
            warn!(request_id = %request_id, service_key = %service_key, "Service not found");
            return RpcResponse::failure(
                request_id,
                format!("The serviceKey[{}] not found.", service_key),
            );
        };

        let age = self.clock.now_millis().saturating_sub(request.create_millis_time);
        if age > self.max_request_age.as_millis() as u64 {
            warn!(request_id = %request_id, age_ms = age, "Stale request rejected");
            return RpcResponse::failure(
                request_id,
                "The timestamp difference between invoker and provider exceeds the limit.",
            );
        }

        if let Some(expected) = &self.access_token {
            let presented = request.access_token.as_deref().unwrap_or_default();
            if !constant_time_compare(expected, presented) {
                warn!(request_id = %request_id, service_key = %service_key, "Access token rejected");
                return RpcResponse::failure(
                    request_id,
                    format!("The access token[{}] is wrong.", presented),
                );
            }
        }

        let parameter_types = request.parameter_types.as_slice();
        let Some(handler) = bean.lookup(&request.method_name, parameter_types) else {
            let signature = method_signature(&request.method_name, parameter_types);
            warn!(request_id = %request_id, method = %signature, "Method not found");
            return RpcResponse::failure(
                request_id,
                format!("No such method: {}.{}", service_key, signature),
            );
        };

        let parameters = request.parameters.clone();
        match catch_unwind(AssertUnwindSafe(|| handler(parameters))) {
            Ok(Ok(result)) => RpcResponse::success(request_id, result),
            Ok(Err(e)) => {
                error!(
                    request_id = %request_id,
                    method = %request.signature(),
                    error = %format!("{:#}", e),
                    "Provider invoke error"
                );
                RpcResponse::failure(request_id, format!("{:#}", e))
            }
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(
                    request_id = %request_id,
                    method = %request.signature(),
                    panic = %message,
                    "Provider method panicked"
                );
                RpcResponse::failure(request_id, format!("service method panicked: {}", message))
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Constant-time string comparison.
///
/// Takes the same time regardless of how many bytes match, and does not
/// leak the length of the expected value through early exit.
pub fn constant_time_compare(a: &str, b: &str) -> bool {
    use subtle::ConstantTimeEq;

    let max_len = std::cmp::max(a.len(), b.len());

    // Different pad bytes so unequal lengths never compare equal
    let mut a_padded = vec![0u8; max_len];
    let mut b_padded = vec![0xFFu8; max_len];
    a_padded[..a.len()].copy_from_slice(a.as_bytes());
    b_padded[..b.len()].copy_from_slice(b.as_bytes());

    let lengths_equal = a.len().ct_eq(&b.len());
    let contents_equal = a_padded.ct_eq(&b_padded);
    (lengths_equal & contents_equal).into()
}
