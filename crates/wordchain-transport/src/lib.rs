//! Transport layer for wordchain.
//!
//! Turns a raw byte stream into a message-oriented duplex channel: send one
//! text message, receive the next text message, observe closure. The
//! upgrade handshake ([`handshake`]) and the frame codec ([`frame`]) are
//! implemented here directly on top of Tokio's `AsyncRead`/`AsyncWrite`;
//! nothing in this crate knows about rooms or players.
//!
//! - [`Transport`] / [`Connection`]: the seams the server is written
//!   against.
//! - [`WebSocketTransport`]: TCP listener that upgrades each accepted
//!   stream concurrently.
//! - [`WebSocketConnection`]: one upgraded stream.

#![allow(async_fn_in_trait)]

mod error;
pub mod frame;
pub mod handshake;
mod websocket;

pub use error::TransportError;
pub use frame::{Frame, FrameDecoder};
pub use websocket::{FrameConfig, WebSocketConnection, WebSocketTransport};

use std::fmt;

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;
    /// The error type for transport operations.
    type Error: std::error::Error + Send + Sync;

    /// Waits for and accepts the next upgraded connection.
    async fn accept(&mut self) -> Result<Self::Connection, Self::Error>;

    /// Stops accepting new connections.
    async fn shutdown(&self) -> Result<(), Self::Error>;
}

/// A single message-oriented connection.
pub trait Connection: Send + Sync + 'static {
    /// The error type for connection operations.
    type Error: std::error::Error + Send + Sync;

    /// Sends one text message as a single frame.
    async fn send(&self, text: &str) -> Result<(), Self::Error>;

    /// Receives the next text message from the remote peer.
    ///
    /// Returns `Ok(None)` once the channel is closed (peer close frame,
    /// end of stream, or a local [`close`](Self::close)).
    async fn recv(&self) -> Result<Option<String>, Self::Error>;

    /// Closes the connection. Calling it more than once is a no-op.
    async fn close(&self) -> Result<(), Self::Error>;

    /// Returns `true` once the channel has become unusable.
    fn is_closed(&self) -> bool;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_new_and_into_inner() {
        let id = ConnectionId::new(42);
        assert_eq!(id.into_inner(), 42);
    }

    #[test]
    fn test_connection_id_display() {
        let id = ConnectionId::new(7);
        assert_eq!(id.to_string(), "conn-7");
    }

    #[test]
    fn test_connection_id_hash_works_as_map_key() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ConnectionId::new(1), "alice");
        map.insert(ConnectionId::new(2), "bob");
        assert_eq!(map[&ConnectionId::new(1)], "alice");
    }
}
