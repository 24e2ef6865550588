//! Adapters Layer: in-process implementations of the outbound ports.
//!
//! Real deployments plug their own transport, codec and registry in
//! through the same traits.

pub mod clock;
pub mod codec;
pub mod local_network;
pub mod registry;

pub use clock::{FixedClock, SystemClock};
pub use codec::{JsonCodec, WIRE_VERSION};
pub use local_network::{LocalConnection, LocalNetwork};
pub use registry::LocalServiceRegistry;
