//! Room state and game rules for wordchain.
//!
//! Everything here is synchronous and free of I/O: a [`Room`] is plain
//! data, the turn engine ([`Room::apply`]) is a pure state transition and
//! [`project`] turns a room into what one player may see.
//!
//! # Key types
//!
//! - [`Deck`]: shuffled draw pile with a cursor
//! - [`Room`]: the authoritative record (also the persisted snapshot)
//! - [`Command`] / [`Outcome`]: turn engine input and output
//! - [`RoomLock`]: exclusive access contract, [`RoomCell`] in memory
//! - [`GameConfig`]: player limit, hand size, word check, TTL

mod config;
mod deck;
mod engine;
mod error;
mod lock;
mod projection;
mod room;

pub use config::GameConfig;
pub use deck::{ALPHABET, COPIES, Deck};
pub use engine::{Command, MAX_NAME_CHARS, Outcome, normalize_name};
pub use error::RoomError;
pub use lock::{RoomCell, RoomLock};
pub use projection::project;
pub use room::{LastAction, PlaySnapshot, Player, Room, unix_millis};
