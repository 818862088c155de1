//! Error types for the session layer.

use wordchain_protocol::{Reason, RoomId};
use wordchain_room::RoomError;

/// Errors that can occur while resolving or managing rooms.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No live room has this id.
    #[error("room {0} not found")]
    RoomNotFound(RoomId),

    /// Every attempt to draw an unused room id collided.
    ///
    /// The id space is only 10000 wide, so this means the server is
    /// holding far more rooms than it should.
    #[error("no free room id after {0} attempts")]
    NoRoomId(usize),

    /// The room refused the command.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl SessionError {
    pub fn reason(&self) -> Reason {
        match self {
            Self::RoomNotFound(_) => Reason::RoomNotFound,
            Self::NoRoomId(_) => Reason::NoRoomId,
            Self::Room(e) => e.reason(),
        }
    }
}
