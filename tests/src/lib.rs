//! # Quantum-RPC Test Suite
//!
//! Unified test crate driving invoker and provider together over the
//! in-process network.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/          # Correlation and routing throughput
//! └── src/integration/
//!     ├── support.rs    # Shared fixtures: network, providers, references
//!     ├── calls.rs      # SYNC / FUTURE / CALLBACK / ONEWAY end to end
//!     ├── discovery.rs  # Registry lookup and load balancing
//!     └── failures.rs   # Timeouts, rejections, reconnects, shutdown
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p qrpc-tests
//!
//! # By category
//! cargo test -p qrpc-tests integration::calls::
//! cargo test -p qrpc-tests integration::failures::
//!
//! # Benchmarks
//! cargo bench -p qrpc-tests
//! ```

pub mod integration;
