//! Ports Layer: trait boundaries between the remoting core and its
//! collaborators (transport, codec, registry, clock).

pub mod inbound;
pub mod outbound;

pub use inbound::{RequestHandler, ResponseSink};
pub use outbound::{Clock, Codec, Connection, Server, ServiceRegistry, Transport};
