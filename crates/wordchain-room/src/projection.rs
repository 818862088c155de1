//! Per-player view of a room.

use wordchain_protocol::{LastActionView, PlayerId, PlayerView, RoomView};

use crate::Room;

/// Builds the view of `room` that `viewer` is allowed to see.
///
/// Only the viewer's own entry carries `hand`; everyone else is reduced to
/// `hand_count`. The deck order and the undo snapshot are never exposed.
pub fn project(room: &Room, viewer: &PlayerId) -> RoomView {
    RoomView {
        room_id: room.room_id.clone(),
        status: room.status,
        players: room
            .players
            .iter()
            .map(|p| PlayerView {
                player_id: p.player_id.clone(),
                name: p.name.clone(),
                connected: p.connected,
                hand_count: p.hand.len(),
                hand: (&p.player_id == viewer).then(|| p.hand.clone()),
                score: p.score,
            })
            .collect(),
        deck_count: room.deck.remaining(),
        current_char: room.current_char,
        last_play: room.last_play.clone(),
        winner: room.winner.clone(),
        state_version: room.state_version,
        last_action: room.last_action.as_ref().map(|a| LastActionView {
            action_id: a.action_id.clone(),
            player_id: a.player_id.clone(),
        }),
    }
}
