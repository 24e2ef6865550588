//! # Driving Ports (Inbound API)
//!
//! Entry points the transport calls into: request handling on the provider
//! side and response delivery on the invoker side.

use crate::domain::{RpcRequest, RpcResponse};
use async_trait::async_trait;

/// Provider-side request processing.
///
/// Implementations never fail: every request produces a response, with
/// failures reported in [`RpcResponse::error_msg`].
#[async_trait]
pub trait RequestHandler: Send + Sync {
    async fn handle(&self, request: RpcRequest) -> RpcResponse;
}

/// Invoker-side response delivery, called from transport read tasks.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, response: RpcResponse);
}
