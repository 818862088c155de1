//! Turn engine: validates a command against a room and applies it.
//!
//! [`Room::apply`] either returns an [`Outcome`] with the room advanced by
//! exactly one `state_version`, or a [`RoomError`] with the room untouched.
//! All checks run before the first field is written.

use rand::Rng;
use wordchain_protocol::{ActionId, LastPlay, PlayerId, RoomStatus, Winner};

use crate::room::{LastAction, PlaySnapshot, Player};
use crate::{GameConfig, Room, RoomError};

/// Longest player name kept, in characters.
pub const MAX_NAME_CHARS: usize = 16;

const DEFAULT_NAME: &str = "Player";

/// A well-typed request to change a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join {
        name: Option<String>,
    },
    Play {
        player_id: PlayerId,
        end_char: String,
        word: Option<String>,
    },
    Undo {
        player_id: PlayerId,
        action_id: ActionId,
    },
    Leave {
        player_id: PlayerId,
    },
    /// Replaces the current character with a random card.
    ShuffleField {
        player_id: PlayerId,
    },
}

/// What an accepted command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Joined { player_id: PlayerId },
    Played { action_id: ActionId, finished: bool },
    Undone,
    Left { player_id: PlayerId },
    FieldShuffled { current_char: char },
}

/// Trims `name` and caps it at [`MAX_NAME_CHARS`], falling back to
/// `"Player"` when nothing is left.
pub fn normalize_name(name: Option<&str>) -> String {
    let name: String = name
        .unwrap_or("")
        .trim()
        .chars()
        .take(MAX_NAME_CHARS)
        .collect();
    if name.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        name
    }
}

impl Room {
    /// Validates and applies one command.
    ///
    /// # Errors
    /// Any [`RoomError`] other than `NotFound`/`Contention`, which are
    /// raised by the layers holding the room.
    pub fn apply<R: Rng + ?Sized>(
        &mut self,
        command: Command,
        config: &GameConfig,
        now: u64,
        rng: &mut R,
    ) -> Result<Outcome, RoomError> {
        match command {
            Command::Join { name } => self.join(name.as_deref(), config, now, rng),
            Command::Play {
                player_id,
                end_char,
                word,
            } => self.play(&player_id, &end_char, word.as_deref(), config, now, rng),
            Command::Undo {
                player_id,
                action_id,
            } => self.undo(&player_id, &action_id, now),
            Command::Leave { player_id } => self.leave(&player_id, now),
            Command::ShuffleField { player_id } => self.shuffle_field(&player_id, now, rng),
        }
    }

    fn join<R: Rng + ?Sized>(
        &mut self,
        name: Option<&str>,
        config: &GameConfig,
        now: u64,
        rng: &mut R,
    ) -> Result<Outcome, RoomError> {
        if self.connected_count() >= config.max_players {
            return Err(RoomError::RoomFull(self.room_id.clone()));
        }

        let player_id = loop {
            let candidate = PlayerId(format!("p{:08x}", rng.random::<u32>()));
            if !self.has_player(&candidate) {
                break candidate;
            }
        };

        let deal = config.initial_hand.min(self.deck.remaining());
        let mut hand = Vec::with_capacity(deal);
        for _ in 0..deal {
            hand.push(self.deck.draw()?);
        }

        self.players.push(Player {
            player_id: player_id.clone(),
            name: normalize_name(name),
            connected: true,
            hand,
            score: 0,
        });
        if self.status == RoomStatus::Waiting && self.connected_count() >= 2 {
            self.status = RoomStatus::Playing;
            tracing::info!(room_id = %self.room_id, "game started");
        }
        self.bump(now);
        Ok(Outcome::Joined { player_id })
    }

    fn play<R: Rng + ?Sized>(
        &mut self,
        player_id: &PlayerId,
        end_char: &str,
        word: Option<&str>,
        config: &GameConfig,
        now: u64,
        rng: &mut R,
    ) -> Result<Outcome, RoomError> {
        let idx = self.player_index(player_id)?;
        let player = &self.players[idx];

        if !player.connected {
            return Err(RoomError::InvalidInput("player is disconnected".into()));
        }
        if self.status != RoomStatus::Playing || self.winner.is_some() {
            return Err(RoomError::InvalidInput(format!(
                "room is {}, not accepting plays",
                self.status
            )));
        }

        let mut end_chars = end_char.trim().chars();
        let end_char = match (end_chars.next(), end_chars.next()) {
            (Some(c), None) => c,
            _ => {
                return Err(RoomError::InvalidInput(
                    "endChar must be exactly one character".into(),
                ));
            }
        };

        let word = word.map(str::trim).filter(|w| !w.is_empty());
        match word {
            Some(word) => {
                let chars: Vec<char> = word.chars().collect();
                if chars.len() < 2 {
                    return Err(RoomError::InvalidInput("word is too short".into()));
                }
                if chars.first() != Some(&self.current_char) || chars.last() != Some(&end_char) {
                    return Err(RoomError::WordPatternMismatch(word.to_string()));
                }
            }
            None if config.word_check => {
                return Err(RoomError::InvalidInput("word is required".into()));
            }
            None => {}
        }

        let card = player
            .hand
            .iter()
            .position(|&c| c == end_char)
            .ok_or(RoomError::NotInHand(end_char))?;
        if self.deck.remaining() == 0 {
            return Err(RoomError::DeckExhausted);
        }

        // Validation done; from here on every step succeeds.
        let action_id = ActionId(format!("a{:016x}", rng.random::<u64>()));
        let before = PlaySnapshot {
            current_char: self.current_char,
            deck_cursor: self.deck.cursor(),
            hand: player.hand.clone(),
            score: player.score,
            last_play: self.last_play.clone(),
            winner: self.winner.clone(),
        };
        let next = self.deck.draw()?;

        let player = &mut self.players[idx];
        player.hand.remove(card);
        player.score += 1;
        let emptied = player.hand.is_empty();
        let name = player.name.clone();

        self.current_char = next;
        self.last_play = Some(LastPlay {
            player_id: player_id.clone(),
            name: name.clone(),
            word: word.map(str::to_string),
            end_char,
            at: now,
        });
        if emptied {
            self.winner = Some(Winner {
                player_id: player_id.clone(),
                name,
            });
            self.status = RoomStatus::Finished;
            tracing::info!(room_id = %self.room_id, %player_id, "game finished");
        }
        self.last_action = Some(LastAction {
            action_id: action_id.clone(),
            player_id: player_id.clone(),
            result_char: next,
            before,
        });
        self.bump(now);

        Ok(Outcome::Played {
            action_id,
            finished: emptied,
        })
    }

    /// Rolls back the most recent play.
    ///
    /// Only the player who made it may undo it, and only while its result
    /// is still the current character.
    fn undo(
        &mut self,
        player_id: &PlayerId,
        action_id: &ActionId,
        now: u64,
    ) -> Result<Outcome, RoomError> {
        let idx = self.player_index(player_id)?;

        let undoable = self.last_action.as_ref().is_some_and(|action| {
            &action.action_id == action_id
                && &action.player_id == player_id
                && action.result_char == self.current_char
        });
        if !undoable {
            return Err(RoomError::UndoNotAvailable(action_id.clone()));
        }
        let Some(LastAction { before, .. }) = self.last_action.take() else {
            return Err(RoomError::UndoNotAvailable(action_id.clone()));
        };

        self.current_char = before.current_char;
        self.deck.rewind_to(before.deck_cursor);
        let player = &mut self.players[idx];
        player.hand = before.hand;
        player.score = before.score;
        self.last_play = before.last_play;
        self.winner = before.winner;
        self.status = if self.players.len() >= 2 {
            RoomStatus::Playing
        } else {
            RoomStatus::Waiting
        };
        self.bump(now);
        Ok(Outcome::Undone)
    }

    fn leave(&mut self, player_id: &PlayerId, now: u64) -> Result<Outcome, RoomError> {
        let idx = self.player_index(player_id)?;
        self.players[idx].connected = false;
        self.bump(now);
        Ok(Outcome::Left {
            player_id: player_id.clone(),
        })
    }

    fn shuffle_field<R: Rng + ?Sized>(
        &mut self,
        player_id: &PlayerId,
        now: u64,
        rng: &mut R,
    ) -> Result<Outcome, RoomError> {
        self.player_index(player_id)?;
        let current_char = self.deck.random_card(rng)?;

        self.current_char = current_char;
        self.last_action = None;
        self.bump(now);
        Ok(Outcome::FieldShuffled { current_char })
    }

    fn bump(&mut self, now: u64) {
        self.state_version += 1;
        self.touch(now);
    }
}
