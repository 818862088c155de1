//! Per-connection handler: decode, dispatch, and write back.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Spawn a writer task that drains the session's outbound channel
//!   2. Loop: receive text → decode envelope → `SessionManager::handle`
//!   3. On close or error: unbind the session, let the writer drain, close

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use wordchain_protocol::{ClientMessage, Codec, Envelope, ProtocolError, Reason, ServerMessage};
use wordchain_session::Session;
use wordchain_transport::{Connection, WebSocketConnection};

use crate::WordchainError;
use crate::server::ServerState;

/// How long queued messages get to reach the socket after the read side
/// has finished.
const WRITER_DRAIN: Duration = Duration::from_secs(1);

/// Marks the session's player disconnected when the handler exits,
/// including by panic.
struct SessionGuard<'a, C: Codec> {
    state: &'a ServerState<C>,
    session: Session,
}

impl<C: Codec> Drop for SessionGuard<'_, C> {
    fn drop(&mut self) {
        self.state.sessions.disconnect(&mut self.session);
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: WebSocketConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), WordchainError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    let (tx, rx) = mpsc::unbounded_channel();
    let mut writer = tokio::spawn(write_loop(Arc::clone(&conn), Arc::clone(&state), rx));

    let result = {
        let mut guard = SessionGuard {
            state: &state,
            session: Session::new(tx),
        };
        read_loop(&conn, &state, &mut guard.session).await
        // guard drops here → the player is marked disconnected and the
        // session's sender goes with it.
    };

    if tokio::time::timeout(WRITER_DRAIN, &mut writer).await.is_err() {
        tracing::debug!(%conn_id, "writer did not drain in time");
        writer.abort();
    }
    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    tracing::debug!(%conn_id, "connection finished");
    result
}

async fn read_loop<C: Codec>(
    conn: &WebSocketConnection,
    state: &ServerState<C>,
    session: &mut Session,
) -> Result<(), WordchainError> {
    let conn_id = conn.id();
    loop {
        let text = match conn.recv().await {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed");
                return Ok(());
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                return Err(e.into());
            }
        };

        let msg = match decode(&state.codec, &text) {
            Ok(msg) => msg,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "undecodable message");
                session.send(ServerMessage::error(Reason::InvalidInput));
                continue;
            }
        };

        tracing::trace!(%conn_id, kind = msg.kind(), "dispatching");
        if let Err(e) = state.sessions.handle(session, msg) {
            tracing::warn!(%conn_id, error = %e, "command failed");
        }
    }
}

fn decode(codec: &impl Codec, text: &str) -> Result<ClientMessage, ProtocolError> {
    let envelope: Envelope = codec.decode(text)?;
    ClientMessage::try_from(envelope)
}

/// Encodes and sends everything queued for this connection until every
/// sender is gone or the socket fails.
async fn write_loop<C: Codec>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<C>>,
    mut rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = rx.recv().await {
        let text = match state.codec.encode(&msg) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "failed to encode message");
                continue;
            }
        };
        if let Err(e) = conn.send(&text).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "send failed");
            break;
        }
    }
}
