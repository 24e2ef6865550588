//! # QRPC Telemetry
//!
//! Structured logging bootstrap for Quantum-RPC processes.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use qrpc_telemetry::{init_logging, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     init_logging(&TelemetryConfig::from_env()).expect("Failed to init logging");
//!     // Remoting components now log through tracing
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `QRPC_SERVICE_NAME` | `quantum-rpc` | Service name in logs |
//! | `QRPC_LOG_LEVEL` | `info` | Log level filter (`RUST_LOG` also honored) |
//! | `QRPC_CONSOLE_OUTPUT` | `true` | Write logs to stdout |
//! | `QRPC_JSON_LOGS` | `false` (`true` in containers) | JSON formatted output |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{env_filter, init_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to install tracing subscriber: {0}")]
    SubscriberInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}
