//! Error types for the snapshot store.

use wordchain_protocol::{Reason, RoomId};
use wordchain_room::RoomError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No snapshot exists for this id.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The snapshot exists but is not a valid room document.
    #[error("room {room_id} snapshot is corrupt: {source}")]
    Corrupt {
        room_id: RoomId,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode room snapshot: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Every candidate id already had a snapshot.
    #[error("no free room id after {0} attempts")]
    NoRoomId(usize),

    /// The room refused the command.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl StoreError {
    pub fn reason(&self) -> Reason {
        match self {
            // An unreadable snapshot is as good as no room.
            Self::NotFound(_) | Self::Corrupt { .. } => Reason::RoomNotFound,
            Self::Encode(_) | Self::Io(_) => Reason::StorageError,
            Self::NoRoomId(_) => Reason::NoRoomId,
            Self::Room(e) => e.reason(),
        }
    }
}
