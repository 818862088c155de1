//! The authoritative room record.
//!
//! A [`Room`] serializes (camelCase) to the full snapshot document, hands
//! and deck included. It must never be sent to a client as-is; clients
//! get a [`project`](crate::project)ed view.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use wordchain_protocol::{ActionId, LastPlay, PlayerId, RoomId, RoomStatus, Winner};

use crate::{Deck, RoomError};

/// A seat in a room. Players are never removed; leaving only clears
/// `connected`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub player_id: PlayerId,
    pub name: String,
    pub connected: bool,
    pub hand: Vec<char>,
    pub score: u32,
}

/// Everything a play changes, captured just before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaySnapshot {
    pub current_char: char,
    pub deck_cursor: usize,
    pub hand: Vec<char>,
    pub score: u32,
    pub last_play: Option<LastPlay>,
    pub winner: Option<Winner>,
}

/// Single-slot undo journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastAction {
    pub action_id: ActionId,
    pub player_id: PlayerId,
    /// The current character the play produced.
    pub result_char: char,
    pub before: PlaySnapshot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: RoomId,
    pub status: RoomStatus,
    /// In join order.
    pub players: Vec<Player>,
    pub deck: Deck,
    pub current_char: char,
    pub last_play: Option<LastPlay>,
    pub winner: Option<Winner>,
    /// Starts at 1 and goes up by one on every accepted mutation.
    pub state_version: u64,
    pub last_action: Option<LastAction>,
    /// Unix milliseconds of the last command that touched the room.
    pub last_active_at: u64,
}

impl Room {
    /// Creates an empty room, drawing the opening character from `deck`.
    ///
    /// # Errors
    /// [`RoomError::DeckExhausted`] if `deck` has no cards.
    pub fn new(room_id: RoomId, mut deck: Deck, now: u64) -> Result<Self, RoomError> {
        let current_char = deck.draw()?;
        Ok(Self {
            room_id,
            status: RoomStatus::Waiting,
            players: Vec::new(),
            deck,
            current_char,
            last_play: None,
            winner: None,
            state_version: 1,
            last_action: None,
            last_active_at: now,
        })
    }

    pub fn player(&self, player_id: &PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| &p.player_id == player_id)
    }

    pub fn has_player(&self, player_id: &PlayerId) -> bool {
        self.player(player_id).is_some()
    }

    pub fn connected_count(&self) -> usize {
        self.players.iter().filter(|p| p.connected).count()
    }

    /// Records activity without counting as a mutation.
    pub fn touch(&mut self, now: u64) {
        self.last_active_at = self.last_active_at.max(now);
    }

    /// True when nobody is connected and the room has been idle for
    /// longer than `ttl`.
    pub fn is_expired(&self, now: u64, ttl: Duration) -> bool {
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.connected_count() == 0 && now.saturating_sub(self.last_active_at) > ttl_ms
    }

    pub(crate) fn player_index(&self, player_id: &PlayerId) -> Result<usize, RoomError> {
        self.players
            .iter()
            .position(|p| &p.player_id == player_id)
            .ok_or_else(|| RoomError::PlayerNotFound(player_id.clone(), self.room_id.clone()))
    }
}

/// Current wall-clock time in Unix milliseconds.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}
