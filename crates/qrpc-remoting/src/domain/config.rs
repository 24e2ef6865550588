//! Invoker and provider configuration with validation.

use crate::domain::error::ConfigError;
use crate::domain::types::{CallType, LoadBalance};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Static configuration of one remote interface reference
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferenceConfig {
    /// Interface name the reference calls into
    pub iface: String,
    /// Interface version (appended to the service key)
    pub version: Option<String>,
    /// Default call semantics
    pub call_type: CallType,
    /// Policy used when discovery returns several addresses
    pub load_balance: LoadBalance,
    /// Deadline for SYNC and FUTURE calls; zero waits indefinitely
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Static destination; skips discovery when set
    pub address: Option<String>,
    /// Token presented to the provider
    pub access_token: Option<String>,
}

impl Default for ReferenceConfig {
    fn default() -> Self {
        Self {
            iface: String::new(),
            version: None,
            call_type: CallType::Sync,
            load_balance: LoadBalance::Round,
            timeout: Duration::from_millis(1000),
            address: None,
            access_token: None,
        }
    }
}

impl ReferenceConfig {
    pub fn new(iface: impl Into<String>) -> Self {
        Self {
            iface: iface.into(),
            ..Self::default()
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn with_call_type(mut self, call_type: CallType) -> Self {
        self.call_type = call_type;
        self
    }

    pub fn with_load_balance(mut self, load_balance: LoadBalance) -> Self {
        self.load_balance = load_balance;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Static address, if one is configured and not blank
    pub fn static_address(&self) -> Option<&str> {
        self.address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iface.trim().is_empty() {
            return Err(ConfigError::MissingInterface);
        }
        Ok(())
    }
}

/// Provider-side configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Address the server binds to and registers under
    pub address: String,
    /// Token every request must present (None or blank = no check)
    pub access_token: Option<String>,
    /// Requests created longer ago than this are rejected
    #[serde(with = "humantime_serde")]
    pub max_request_age: Duration,
    /// Worker pool executing service methods
    pub handler_pool: HandlerPoolConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:7080".to_string(),
            access_token: None,
            max_request_age: Duration::from_secs(3 * 60),
            handler_pool: HandlerPoolConfig::default(),
        }
    }
}

impl ProviderConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            ..Self::default()
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_max_request_age(mut self, age: Duration) -> Self {
        self.max_request_age = age;
        self
    }

    /// Configured token, trimmed; blank counts as none
    pub fn required_token(&self) -> Option<&str> {
        self.access_token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("provider address cannot be empty".into()));
        }
        if self.max_request_age.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "max_request_age cannot be 0".into(),
            ));
        }
        self.handler_pool.validate()
    }
}

/// Bounded worker pool for provider requests
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerPoolConfig {
    /// Requests executing at the same time
    pub max_concurrency: usize,
    /// Requests allowed to wait for a worker
    pub queue_capacity: usize,
}

impl Default for HandlerPoolConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 300,
            queue_capacity: 1000,
        }
    }
}

impl HandlerPoolConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_concurrency cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Invoker-side process configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvokerConfig {
    /// Callbacks running at the same time
    pub callback_concurrency: usize,
    /// Period of the expired pending-call sweep
    #[serde(with = "humantime_serde")]
    pub sweep_interval: Duration,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            callback_concurrency: 64,
            sweep_interval: Duration::from_secs(10),
        }
    }
}

impl InvokerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.callback_concurrency == 0 {
            return Err(ConfigError::InvalidLimit(
                "callback_concurrency cannot be 0".into(),
            ));
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "sweep_interval cannot be 0".into(),
            ));
        }
        Ok(())
    }
}

/// Humantime serde module for Duration serialization
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}ms", duration.as_millis()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse_duration(&s).map_err(serde::de::Error::custom)
    }

    pub(super) fn parse_duration(s: &str) -> Result<Duration, &'static str> {
        let s = s.trim();
        // "ms" must be tried before the bare "s" suffix
        if let Some(ms) = s.strip_suffix("ms") {
            ms.trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid milliseconds")
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| "invalid seconds")
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.trim()
                .parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(|_| "invalid minutes")
        } else {
            // Plain numbers are milliseconds
            s.parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| "invalid duration format")
        }
    }
}
