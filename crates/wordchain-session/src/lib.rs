//! Room registry and connection bookkeeping for wordchain.
//!
//! This crate sits between the connection handlers and the rules:
//!
//! 1. **Registry**: creating rooms, looking them up, expiring idle ones
//!    ([`SessionManager`])
//! 2. **Bindings**: which connection sits in which seat ([`Session`])
//! 3. **Fan-out**: after every accepted command, each bound connection
//!    gets a message built from its own projection of the room
//!
//! # How it fits in the stack
//!
//! ```text
//! Server (above)  ← one Session per connection, calls SessionManager::handle
//!     ↕
//! Session Layer (this crate)  ← resolves rooms, locks them, broadcasts
//!     ↕
//! Room Layer (below)  ← turn engine and projection
//! ```

mod error;
mod manager;
mod session;

pub use error::SessionError;
pub use manager::{MAX_ROOM_ID_ATTEMPTS, SessionManager};
pub use session::{Binding, PlayerSender, Session, SessionConfig};
