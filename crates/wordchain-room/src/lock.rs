//! Exclusive access to one room.
//!
//! [`RoomLock`] is "run this closure with the room to yourself". The
//! in-memory [`RoomCell`] refuses instead of waiting; the file store in
//! `wordchain-store` waits on an OS lock. Callers write their command once
//! against the trait.

use std::sync::{Mutex, TryLockError};

use wordchain_protocol::RoomId;

use crate::{Room, RoomError};

pub trait RoomLock {
    type Error: From<RoomError>;

    /// Runs `f` with exclusive access to the room.
    ///
    /// The lock is held only for the duration of `f`; `f` must not block.
    fn with_locked<T, F>(&self, f: F) -> Result<T, Self::Error>
    where
        F: FnOnce(&mut Room) -> T;
}

/// An in-memory room behind a non-blocking mutex.
///
/// A second command arriving while one is running gets
/// [`RoomError::Contention`] and is expected to retry.
#[derive(Debug)]
pub struct RoomCell {
    room_id: RoomId,
    inner: Mutex<Room>,
}

impl RoomCell {
    pub fn new(room: Room) -> Self {
        Self {
            room_id: room.room_id.clone(),
            inner: Mutex::new(room),
        }
    }

    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }
}

impl RoomLock for RoomCell {
    type Error = RoomError;

    fn with_locked<T, F>(&self, f: F) -> Result<T, RoomError>
    where
        F: FnOnce(&mut Room) -> T,
    {
        let mut guard = match self.inner.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Err(RoomError::Contention(self.room_id.clone()));
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                // Commands validate before mutating, so the state is whole.
                tracing::warn!(room_id = %self.room_id, "room lock poisoned, recovering");
                poisoned.into_inner()
            }
        };
        Ok(f(&mut guard))
    }
}
