//! Error types for the room layer.

use wordchain_protocol::{ActionId, PlayerId, Reason, RoomId};

/// Every way a command against a room can be refused.
///
/// None of these are faults: the room is left untouched and the caller
/// gets the matching [`Reason`] code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RoomError {
    /// The room does not exist.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// The room has no free seat for another connected player.
    #[error("room {0} is full")]
    RoomFull(RoomId),

    /// The player is not a member of this room.
    #[error("player {0} not in room {1}")]
    PlayerNotFound(PlayerId, RoomId),

    /// The command is malformed or not allowed in the current state.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The played card is not in the player's hand.
    #[error("card {0} not in hand")]
    NotInHand(char),

    /// The word does not chain from the current character to the card.
    #[error("word {0:?} does not match the chain")]
    WordPatternMismatch(String),

    /// There is no matching action to undo.
    #[error("action {0} cannot be undone")]
    UndoNotAvailable(ActionId),

    /// No card left to draw.
    #[error("deck exhausted")]
    DeckExhausted,

    /// Another command holds the room right now.
    #[error("room {0} is busy")]
    Contention(RoomId),
}

impl RoomError {
    /// The wire code reported to the client.
    pub fn reason(&self) -> Reason {
        match self {
            Self::NotFound(_) => Reason::RoomNotFound,
            Self::RoomFull(_) => Reason::RoomFull,
            Self::PlayerNotFound(..) => Reason::PlayerNotFound,
            Self::InvalidInput(_) | Self::DeckExhausted => Reason::InvalidInput,
            Self::NotInHand(_) => Reason::NotInHand,
            Self::WordPatternMismatch(_) => Reason::WordPatternMismatch,
            Self::UndoNotAvailable(_) => Reason::UndoNotAvailable,
            Self::Contention(_) => Reason::RaceLost,
        }
    }
}
