//! Core protocol types: ids, reason codes, room views and message envelopes.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ProtocolError;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque identifier of a player within a room.
///
/// Generated by the server as `p` followed by 8 hex digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Four-digit decimal room code, `"0000"` through `"9999"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Formats `n` (taken modulo 10000) as a zero-padded room code.
    pub fn from_number(n: u32) -> Self {
        Self(format!("{:04}", n % 10_000))
    }

    /// True when the id is exactly four ASCII digits.
    ///
    /// Ids arrive from clients verbatim; anything else can never name a
    /// room and is safe to reject before touching storage.
    pub fn is_well_formed(&self) -> bool {
        self.0.len() == 4 && self.0.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of an accepted play, used to target undo.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionId(pub String);

impl ActionId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ActionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ---------------------------------------------------------------------------
// Status and reason codes
// ---------------------------------------------------------------------------

/// Lifecycle of a room.
///
/// `ACTIVE` is accepted on input as a synonym for `PLAYING`; the server
/// only ever writes `PLAYING`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomStatus {
    #[default]
    Waiting,
    #[serde(alias = "ACTIVE")]
    Playing,
    Finished,
}

impl RoomStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Waiting => "WAITING",
            Self::Playing => "PLAYING",
            Self::Finished => "FINISHED",
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a command was rejected.
///
/// Older clients used a few different spellings; those are accepted as
/// aliases when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    RoomNotFound,
    RoomFull,
    PlayerNotFound,
    #[serde(alias = "INVALID_PLAY")]
    InvalidInput,
    #[serde(alias = "CARD_NOT_OWNED")]
    NotInHand,
    WordPatternMismatch,
    #[serde(alias = "UNDO_NOT_ALLOWED")]
    UndoNotAvailable,
    UnknownAction,
    RaceLost,
    NoRoomId,
    StorageError,
}

impl Reason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoomNotFound => "ROOM_NOT_FOUND",
            Self::RoomFull => "ROOM_FULL",
            Self::PlayerNotFound => "PLAYER_NOT_FOUND",
            Self::InvalidInput => "INVALID_INPUT",
            Self::NotInHand => "NOT_IN_HAND",
            Self::WordPatternMismatch => "WORD_PATTERN_MISMATCH",
            Self::UndoNotAvailable => "UNDO_NOT_AVAILABLE",
            Self::UnknownAction => "UNKNOWN_ACTION",
            Self::RaceLost => "RACE_LOST",
            Self::NoRoomId => "NO_ROOM_ID",
            Self::StorageError => "STORAGE_ERROR",
        }
    }
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Room views
// ---------------------------------------------------------------------------

/// The most recent accepted play.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastPlay {
    pub player_id: PlayerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word: Option<String>,
    pub end_char: char,
    /// Unix milliseconds.
    pub at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Winner {
    pub player_id: PlayerId,
    pub name: String,
}

/// The undo handle exposed to clients. The pre-play snapshot stays
/// server-side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastActionView {
    pub action_id: ActionId,
    pub player_id: PlayerId,
}

/// One seat as seen by a particular viewer.
///
/// `hand` is present only on the viewer's own entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub hand_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hand: Option<Vec<char>>,
    pub score: u32,
}

/// A room as seen by one player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub room_id: RoomId,
    pub status: RoomStatus,
    pub players: Vec<PlayerView>,
    pub deck_count: usize,
    pub current_char: char,
    pub last_play: Option<LastPlay>,
    pub winner: Option<Winner>,
    pub state_version: u64,
    pub last_action: Option<LastActionView>,
}

impl RoomView {
    /// The viewer's own seat, if the view was projected for a member.
    pub fn own_player(&self) -> Option<&PlayerView> {
        self.players.iter().find(|p| p.hand.is_some())
    }
}

// ---------------------------------------------------------------------------
// Inbound messages
// ---------------------------------------------------------------------------

/// Raw `{ "type", "payload" }` wrapper as read off the wire.
///
/// A missing or `null` payload is treated as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRoom {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayRequest {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    /// Kept as a string so that a multi-character value reaches the rules
    /// and is rejected there rather than at decode time.
    pub end_char: String,
    #[serde(default)]
    pub word: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UndoRequest {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub action_id: ActionId,
}

/// Both fields default to the connection's current binding.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRoom {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    #[serde(default)]
    pub player_id: Option<PlayerId>,
}

/// Payload for commands that only name a room and the acting player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

/// A validated inbound message.
///
/// Built from an [`Envelope`] via `TryFrom`; the enum is closed, so every
/// message the server acts on is one of these variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ClientMessage {
    CreateRoom,
    JoinRoom(JoinRoom),
    PlayRequest(PlayRequest),
    UndoRequest(UndoRequest),
    LeaveRoom(LeaveRoom),
    ShuffleField(RoomRef),
    GetState(RoomRef),
}

impl ClientMessage {
    /// The wire name of the message, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateRoom => "create_room",
            Self::JoinRoom(_) => "join_room",
            Self::PlayRequest(_) => "play_request",
            Self::UndoRequest(_) => "undo_request",
            Self::LeaveRoom(_) => "leave_room",
            Self::ShuffleField(_) => "shuffle_field",
            Self::GetState(_) => "get_state",
        }
    }
}

impl TryFrom<Envelope> for ClientMessage {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let payload = match envelope.payload {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };
        Ok(match envelope.kind.as_str() {
            "create_room" => Self::CreateRoom,
            "join_room" => Self::JoinRoom(decode(payload)?),
            "play_request" => Self::PlayRequest(decode(payload)?),
            "undo_request" => Self::UndoRequest(decode(payload)?),
            "leave_room" => Self::LeaveRoom(decode(payload)?),
            "shuffle_field" => Self::ShuffleField(decode(payload)?),
            "get_state" => Self::GetState(decode(payload)?),
            _ => return Err(ProtocolError::UnknownType(envelope.kind)),
        })
    }
}

fn decode<T: DeserializeOwned>(payload: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(payload).map_err(ProtocolError::Decode)
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// Outcome of a play, undo or shuffle.
///
/// Rejections may omit `room_state` when the caller's view cannot be
/// resolved (unknown room, or the room was busy).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResult {
    pub accepted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_state: Option<RoomView>,
}

impl CommandResult {
    pub fn accepted(room_state: RoomView) -> Self {
        Self {
            accepted: true,
            reason: None,
            room_state: Some(room_state),
        }
    }

    pub fn rejected(reason: Reason, room_state: Option<RoomView>) -> Self {
        Self {
            accepted: false,
            reason: Some(reason),
            room_state,
        }
    }
}

/// Messages sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "snake_case",
    rename_all_fields = "camelCase"
)]
pub enum ServerMessage {
    RoomCreated { room_id: RoomId },
    JoinOk { player_id: PlayerId, room_state: RoomView },
    RoomFull { room_id: RoomId },
    PlayResult(CommandResult),
    UndoResult(CommandResult),
    ShuffleResult(CommandResult),
    StateSync { room_state: RoomView },
    /// `message` carries a [`Reason`] code.
    Error { message: String },
}

impl ServerMessage {
    pub fn error(reason: Reason) -> Self {
        Self::Error {
            message: reason.as_str().to_string(),
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
