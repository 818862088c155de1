//! File-backed room storage for wordchain.
//!
//! Each room lives in its own JSON snapshot. Several processes may serve
//! the same directory: an exclusive advisory lock (`fs4`) around every
//! read-modify-write keeps commands on one room strictly one at a time,
//! with later callers waiting rather than failing.
//!
//! [`handle_request`] is the stateless command API on top: action name in,
//! `{ok, reason?, roomId?, playerId?, roomState?}` and a status code out.

mod api;
mod error;
mod store;

pub use api::{ApiBody, ApiResponse, handle_request};
pub use error::StoreError;
pub use store::{FileRoomStore, MAX_ROOM_ID_ATTEMPTS, RoomFile};
