//! Per-connection session state and session-layer configuration.

use std::time::Duration;

use tokio::sync::mpsc;
use wordchain_protocol::{PlayerId, RoomId, ServerMessage};
use wordchain_room::GameConfig;

/// Channel for delivering outbound messages to one connection.
///
/// Unbounded so that broadcasting never waits on a slow client.
pub type PlayerSender = mpsc::UnboundedSender<ServerMessage>;

// ---------------------------------------------------------------------------
// SessionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// How often the server looks for expired rooms.
    pub sweep_interval: Duration,

    /// Rules applied to every room.
    pub game: GameConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            game: GameConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Where a connection currently sits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// One connection's view of the session layer: its outbound channel and,
/// after a successful join, the seat it is bound to.
///
/// The binding is a back-reference only. The player itself lives in the
/// room and outlives the connection.
#[derive(Debug)]
pub struct Session {
    pub(crate) sender: PlayerSender,
    pub(crate) binding: Option<Binding>,
}

impl Session {
    pub fn new(sender: PlayerSender) -> Self {
        Self {
            sender,
            binding: None,
        }
    }

    pub fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    /// Queues a message for this connection. A closed channel is ignored;
    /// the connection is going away and will be cleaned up on its own.
    pub fn send(&self, msg: ServerMessage) {
        if self.sender.send(msg).is_err() {
            tracing::debug!("dropping message for closed connection");
        }
    }
}
