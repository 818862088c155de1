//! Wire protocol for wordchain.
//!
//! This crate defines the "language" that clients and the server speak:
//!
//! - **Envelopes**: every message is `{ "type": ..., "payload": ... }`.
//!   Inbound envelopes are validated into the closed [`ClientMessage`]
//!   enum before anything else sees them; outbound messages are the
//!   [`ServerMessage`] enum.
//! - **Views** ([`RoomView`], [`PlayerView`]): the per-player projection
//!   of a room, the only room representation that ever leaves the server.
//! - **Reason codes** ([`Reason`]): why a command was rejected.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]).
//!
//! # Architecture
//!
//! ```text
//! Transport (text frames) → Protocol (ClientMessage) → Session (rooms, players)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{
    ActionId, ClientMessage, CommandResult, Envelope, JoinRoom, LastActionView, LastPlay,
    LeaveRoom, PlayRequest, PlayerId, PlayerView, Reason, RoomId, RoomRef, RoomStatus, RoomView,
    ServerMessage, UndoRequest, Winner,
};
