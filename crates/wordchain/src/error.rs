//! Unified error type for the wordchain server.

use wordchain_protocol::ProtocolError;
use wordchain_room::RoomError;
use wordchain_session::SessionError;
use wordchain_store::StoreError;
use wordchain_transport::TransportError;

/// Top-level error that wraps every crate-specific error, so `?` works
/// across layers.
#[derive(Debug, thiserror::Error)]
pub enum WordchainError {
    /// Binding, accepting, framing, or I/O on a connection.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding or decoding an envelope.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Session(#[from] SessionError),

    /// A rejected command.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// Snapshot storage.
    #[error(transparent)]
    Store(#[from] StoreError),
}
