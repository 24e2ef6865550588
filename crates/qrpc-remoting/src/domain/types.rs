//! Wire-level value types shared by the invoker and provider sides.

use crate::domain::error::RpcError;
use crate::domain::request_id::RequestId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Identifies a remote capability independent of its network location.
///
/// Rendered as `iface` or `iface#version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceKey(String);

impl ServiceKey {
    /// Build a key from an interface name and an optional version.
    ///
    /// A blank version is ignored.
    pub fn make(iface: &str, version: Option<&str>) -> Self {
        match version.map(str::trim).filter(|v| !v.is_empty()) {
            Some(v) => Self(format!("{}#{}", iface, v)),
            None => Self(iface.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ServiceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A single remote call. Immutable once sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub request_id: RequestId,
    /// Creation time in unix milliseconds, checked by the provider's staleness window
    pub create_millis_time: u64,
    pub access_token: Option<String>,
    /// Interface name of the target service
    pub class_name: String,
    pub method_name: String,
    /// Parameter type descriptors, part of the method signature
    pub parameter_types: Vec<String>,
    pub parameters: Vec<Value>,
    pub version: Option<String>,
    /// Fire-and-forget; the provider side sends no reply
    #[serde(default)]
    pub oneway: bool,
}

impl RpcRequest {
    /// Service key this request is addressed to
    pub fn service_key(&self) -> ServiceKey {
        ServiceKey::make(&self.class_name, self.version.as_deref())
    }

    /// `method(T1,T2)` form used in logs and error messages
    pub fn signature(&self) -> String {
        format!("{}({})", self.method_name, self.parameter_types.join(","))
    }
}

impl fmt::Display for RpcRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RpcRequest{{request_id={}, create_millis_time={}, service={}, method={}}}",
            self.request_id,
            self.create_millis_time,
            self.service_key(),
            self.signature()
        )
    }
}

/// Provider's answer to a [`RpcRequest`].
///
/// A present `error_msg` means the business logic did not complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub request_id: RequestId,
    pub result: Option<Value>,
    pub error_msg: Option<String>,
}

impl RpcResponse {
    pub fn success(request_id: RequestId, result: Value) -> Self {
        Self {
            request_id,
            result: Some(result),
            error_msg: None,
        }
    }

    pub fn failure(request_id: RequestId, error_msg: impl Into<String>) -> Self {
        Self {
            request_id,
            result: None,
            error_msg: Some(error_msg.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error_msg.as_deref().is_some_and(|m| !m.is_empty())
    }

    /// Unwrap the result, turning a provider-side error into [`RpcError::Remote`].
    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.is_error() {
            return Err(RpcError::Remote(self.error_msg.unwrap_or_default()));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

/// Call semantics of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallType {
    /// Block until the response arrives or the timeout elapses
    #[default]
    Sync,
    /// Return a handle immediately; the result is fetched from it later
    Future,
    /// Return immediately; a callback receives the outcome
    Callback,
    /// Send only, no response is awaited
    Oneway,
}

impl CallType {
    pub const ALL: [CallType; 4] = [
        CallType::Sync,
        CallType::Future,
        CallType::Callback,
        CallType::Oneway,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CallType::Sync => "SYNC",
            CallType::Future => "FUTURE",
            CallType::Callback => "CALLBACK",
            CallType::Oneway => "ONEWAY",
        }
    }

    /// Look a call type up by name, falling back to `default` when unknown.
    pub fn match_or(name: &str, default: CallType) -> CallType {
        name.parse().unwrap_or(default)
    }
}

impl fmt::Display for CallType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CallType {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|ct| ct.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| RpcError::CallTypeInvalid(s.to_string()))
    }
}

/// Address selection policy used when discovery yields several candidates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LoadBalance {
    Random,
    #[default]
    Round,
    Lru,
    Lfu,
    ConsistentHash,
}

impl LoadBalance {
    pub const ALL: [LoadBalance; 5] = [
        LoadBalance::Random,
        LoadBalance::Round,
        LoadBalance::Lru,
        LoadBalance::Lfu,
        LoadBalance::ConsistentHash,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            LoadBalance::Random => "RANDOM",
            LoadBalance::Round => "ROUND",
            LoadBalance::Lru => "LRU",
            LoadBalance::Lfu => "LFU",
            LoadBalance::ConsistentHash => "CONSISTENT_HASH",
        }
    }
}

impl FromStr for LoadBalance {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|lb| lb.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown load balance: {}", s))
    }
}

/// Call aimed at the generic invocation entry point.
///
/// Carries its own interface, version and signature, which replace the
/// reference's static metadata when the request is built.
#[derive(Debug, Clone, PartialEq)]
pub struct GenericCall {
    pub iface: String,
    pub version: Option<String>,
    pub method: String,
    pub parameter_types: Vec<String>,
    pub parameters: Vec<Value>,
}
