//! shazbot-daemon library: the HTTP pieces around the core engine.
//!
//! Exposed as a library so integration tests can assemble nodes in-process.

pub mod http_transport;
pub mod server;

pub use http_transport::{HttpTransport, gossip_endpoint};
pub use server::{ApiError, router, serve_node};
