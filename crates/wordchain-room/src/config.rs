//! Game rules configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tunable rules shared by every room a server hosts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    /// Maximum connected players per room.
    pub max_players: usize,

    /// Cards dealt to a player on join (fewer if the deck runs short).
    pub initial_hand: usize,

    /// When true, every play must carry a word that starts with the
    /// current character and ends with the played card.
    pub word_check: bool,

    /// How long a room with nobody connected survives without activity.
    pub room_ttl: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 8,
            initial_hand: 7,
            word_check: true,
            room_ttl: Duration::from_secs(10 * 60),
        }
    }
}
