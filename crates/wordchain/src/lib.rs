//! # Wordchain
//!
//! Real-time word-chain room server.
//!
//! Clients create or join a four-digit room, take turns playing a card
//! whose word starts with the current field character, and every
//! connection in the room is kept in sync with its own view of the state.
//! The server is authoritative: clients only ever see projections.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wordchain::prelude::*;
//!
//! # async fn start() -> Result<(), WordchainError> {
//! let server = WordchainServer::builder()
//!     .bind("0.0.0.0:8080")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```
//!
//! ## Crates
//!
//! - `wordchain-transport`: upgrade handshake and text framing
//! - `wordchain-protocol`: `{type, payload}` envelopes, views, reasons
//! - `wordchain-room`: deck, room record, turn engine, projection
//! - `wordchain-session`: room registry, bindings, broadcast, TTL sweep
//! - `wordchain-store`: file snapshots and a stateless request API

mod error;
mod handler;
mod server;

pub use error::WordchainError;
pub use server::{WordchainServer, WordchainServerBuilder};

pub mod prelude {
    pub use crate::{WordchainError, WordchainServer, WordchainServerBuilder};
    pub use wordchain_protocol::{
        ClientMessage, Codec, CommandResult, JsonCodec, PlayerId, PlayerView, Reason, RoomId,
        RoomStatus, RoomView, ServerMessage,
    };
    pub use wordchain_room::{Command, Deck, GameConfig, Outcome, Room, RoomError, RoomLock};
    pub use wordchain_session::{Session, SessionConfig, SessionError, SessionManager};
    pub use wordchain_store::{ApiResponse, FileRoomStore, StoreError, handle_request};
    pub use wordchain_transport::{Connection, FrameConfig, Transport, TransportError};
}
