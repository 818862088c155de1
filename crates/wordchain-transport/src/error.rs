/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The connection was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// The upgrade request was rejected. `status` is the HTTP status line
    /// that was written back before the stream was dropped.
    #[error("handshake rejected ({status}): {reason}")]
    Handshake {
        status: &'static str,
        reason: String,
    },

    /// The peer violated the framing protocol (unsupported opcode,
    /// oversized length, invalid UTF-8 in a text frame).
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Sending data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Receiving data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
