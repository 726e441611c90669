//! Sinew Remote - Robot federation over UDP
//!
//! A parent robot reaches each remote through [`UdpConnector`], which yields a
//! [`RemoteClient`] answering the same queries as a local robot. The child side
//! runs a [`RemoteServer`] over its own robot.

pub mod client;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{ClientError, RemoteClient, RemoteResource, UdpConnector, DEFAULT_TIMEOUT};
pub use server::RemoteServer;
pub use transport::{TransportError, UdpTransport};
