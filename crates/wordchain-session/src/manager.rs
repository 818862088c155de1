//! The session manager: room registry, connection bindings and broadcast.
//!
//! # Locking
//!
//! The registry lock is held only to look a room up (or, in the sweep, to
//! remove it). Commands run under the room's own [`RoomCell`], and the
//! bindings map is only ever taken while a room lock is held, never the
//! other way round. Replies and broadcasts are queued on the unbounded
//! per-connection channels while the room lock is still held, so each
//! connection sees one room's states in version order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use rand::Rng;
use wordchain_protocol::{
    ClientMessage, CommandResult, JoinRoom, LeaveRoom, PlayerId, Reason, RoomId, RoomView,
    ServerMessage,
};
use wordchain_room::{
    Command, Deck, Outcome, Room, RoomCell, RoomError, RoomLock, project, unix_millis,
};

use crate::{Binding, PlayerSender, Session, SessionConfig, SessionError};

/// Attempts at drawing an unused room id before giving up.
pub const MAX_ROOM_ID_ATTEMPTS: usize = 20_000;

/// How many times a leave retries a busy room before reporting contention.
const LEAVE_ATTEMPTS: usize = 1_000;

/// Owns every live room and knows which connection sits in which seat.
///
/// All methods take `&self`; share it between connection tasks with an
/// `Arc`.
pub struct SessionManager {
    rooms: RwLock<HashMap<RoomId, Arc<RoomCell>>>,
    bindings: Mutex<HashMap<RoomId, HashMap<PlayerId, PlayerSender>>>,
    config: SessionConfig,
}

impl SessionManager {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            rooms: RwLock::new(HashMap::new()),
            bindings: Mutex::new(HashMap::new()),
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn room_count(&self) -> usize {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn room(&self, room_id: &RoomId) -> Option<Arc<RoomCell>> {
        self.rooms
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(room_id)
            .cloned()
    }

    /// Creates an empty room with a fresh shuffled deck.
    ///
    /// # Errors
    /// [`SessionError::NoRoomId`] if no unused id turned up within
    /// [`MAX_ROOM_ID_ATTEMPTS`] draws.
    pub fn create_room(&self) -> Result<RoomId, SessionError> {
        let mut rng = rand::rng();
        let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);

        for _ in 0..MAX_ROOM_ID_ATTEMPTS {
            let room_id = RoomId::from_number(rng.random_range(0..10_000));
            if rooms.contains_key(&room_id) {
                continue;
            }
            let room = Room::new(room_id.clone(), Deck::shuffled(&mut rng), unix_millis())?;
            rooms.insert(room_id.clone(), Arc::new(RoomCell::new(room)));
            tracing::info!(%room_id, "room created");
            return Ok(room_id);
        }

        tracing::warn!(rooms = rooms.len(), "room id space exhausted");
        Err(SessionError::NoRoomId(MAX_ROOM_ID_ATTEMPTS))
    }

    /// Adopts an existing room, replacing any room with the same id.
    pub fn insert_room(&self, room: Room) -> Arc<RoomCell> {
        let cell = Arc::new(RoomCell::new(room));
        self.rooms
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(cell.room_id().clone(), Arc::clone(&cell));
        cell
    }

    /// Handles one inbound message from `session`'s connection.
    ///
    /// Replies and broadcasts are queued on the relevant channels. Client
    /// mistakes are answered with a reason code and are not errors here.
    ///
    /// # Errors
    /// [`SessionError::NoRoomId`] when a room could not be created. The
    /// client has already been told.
    pub fn handle(&self, session: &mut Session, msg: ClientMessage) -> Result<(), SessionError> {
        match msg {
            ClientMessage::CreateRoom => match self.create_room() {
                Ok(room_id) => session.send(ServerMessage::RoomCreated { room_id }),
                Err(e) => {
                    session.send(ServerMessage::error(e.reason()));
                    return Err(e);
                }
            },
            ClientMessage::JoinRoom(payload) => self.join(session, payload),
            ClientMessage::PlayRequest(p) => self.run_command(
                session,
                &p.room_id,
                &p.player_id,
                Command::Play {
                    player_id: p.player_id.clone(),
                    end_char: p.end_char,
                    word: p.word,
                },
                ServerMessage::PlayResult,
            ),
            ClientMessage::UndoRequest(p) => self.run_command(
                session,
                &p.room_id,
                &p.player_id,
                Command::Undo {
                    player_id: p.player_id.clone(),
                    action_id: p.action_id,
                },
                ServerMessage::UndoResult,
            ),
            ClientMessage::ShuffleField(p) => self.run_command(
                session,
                &p.room_id,
                &p.player_id,
                Command::ShuffleField {
                    player_id: p.player_id.clone(),
                },
                ServerMessage::ShuffleResult,
            ),
            ClientMessage::LeaveRoom(payload) => self.leave(session, payload),
            ClientMessage::GetState(p) => self.get_state(session, &p.room_id, &p.player_id),
        }
        Ok(())
    }

    /// The connection is gone: take its player out of play and tell the
    /// rest of the room.
    pub fn disconnect(&self, session: &mut Session) {
        let Some(Binding { room_id, player_id }) = session.binding.take() else {
            return;
        };
        match self.leave_player(&room_id, &player_id) {
            Ok(()) => tracing::info!(%room_id, %player_id, "player disconnected"),
            Err(e) => tracing::debug!(%room_id, %player_id, error = %e, "disconnect cleanup"),
        }
    }

    /// Removes rooms that nobody is connected to and that have been idle
    /// for longer than the configured TTL. Returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        self.sweep_expired_at(unix_millis())
    }

    pub fn sweep_expired_at(&self, now: u64) -> usize {
        let ttl = self.config.game.room_ttl;
        let mut expired = Vec::new();
        {
            let mut rooms = self.rooms.write().unwrap_or_else(PoisonError::into_inner);
            rooms.retain(|room_id, cell| {
                // A busy room is in use by definition.
                let stale = cell
                    .with_locked(|room| room.is_expired(now, ttl))
                    .unwrap_or(false);
                if stale {
                    expired.push(room_id.clone());
                }
                !stale
            });
        }

        if !expired.is_empty() {
            let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
            for room_id in &expired {
                bindings.remove(room_id);
                tracing::info!(%room_id, "room expired");
            }
        }
        expired.len()
    }

    // -----------------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------------

    fn join(&self, session: &mut Session, payload: JoinRoom) {
        let Some(cell) = payload.room_id.as_ref().and_then(|id| self.room(id)) else {
            session.send(ServerMessage::error(Reason::RoomNotFound));
            return;
        };
        let room_id = cell.room_id().clone();

        let now = unix_millis();
        let mut rng = rand::rng();
        let caller = &*session;
        let result = cell.with_locked(|room| {
            room.touch(now);
            let outcome = room.apply(
                Command::Join { name: payload.name },
                &self.config.game,
                now,
                &mut rng,
            )?;
            let Outcome::Joined { player_id } = outcome else {
                return Err(RoomError::InvalidInput("join produced no player".into()));
            };
            self.bind(&room_id, &player_id, caller.sender.clone());
            caller.send(ServerMessage::JoinOk {
                player_id: player_id.clone(),
                room_state: project(room, &player_id),
            });
            self.broadcast(room, |view| ServerMessage::StateSync { room_state: view });
            Ok(player_id)
        });

        match result {
            Ok(Ok(player_id)) => {
                tracing::info!(%room_id, %player_id, "player joined");
                // One seat per connection: the old one goes only once the
                // new one is taken.
                let previous = session.binding.replace(Binding { room_id, player_id });
                if let Some(Binding { room_id, player_id }) = previous {
                    if let Err(e) = self.leave_player(&room_id, &player_id) {
                        tracing::debug!(%room_id, %player_id, error = %e, "previous seat cleanup");
                    }
                }
            }
            Ok(Err(RoomError::RoomFull(room_id))) => {
                tracing::debug!(%room_id, "join rejected, room full");
                session.send(ServerMessage::RoomFull { room_id });
            }
            Ok(Err(e)) | Err(e) => {
                tracing::debug!(%room_id, reason = %e.reason(), "join rejected");
                session.send(ServerMessage::error(e.reason()));
            }
        }
    }

    /// Runs a play, undo or shuffle. Accepted results go to every bound
    /// connection with its own projection; rejections go to the caller only.
    fn run_command(
        &self,
        session: &Session,
        room_id: &RoomId,
        player_id: &PlayerId,
        command: Command,
        wrap: fn(CommandResult) -> ServerMessage,
    ) {
        let Some(cell) = self.room(room_id) else {
            session.send(wrap(CommandResult::rejected(Reason::RoomNotFound, None)));
            return;
        };

        let now = unix_millis();
        let mut rng = rand::rng();
        let result = cell.with_locked(|room| {
            room.touch(now);
            match room.apply(command, &self.config.game, now, &mut rng) {
                Ok(_) => self.broadcast(room, |view| wrap(CommandResult::accepted(view))),
                Err(e) => {
                    tracing::debug!(%room_id, %player_id, reason = %e.reason(), "command rejected");
                    let view = room.has_player(player_id).then(|| project(room, player_id));
                    session.send(wrap(CommandResult::rejected(e.reason(), view)));
                }
            }
        });

        if let Err(e) = result {
            tracing::debug!(%room_id, %player_id, "command lost race");
            session.send(wrap(CommandResult::rejected(e.reason(), None)));
        }
    }

    fn leave(&self, session: &mut Session, payload: LeaveRoom) {
        let bound = session.binding.clone();
        let room_id = payload
            .room_id
            .or_else(|| bound.as_ref().map(|b| b.room_id.clone()));
        let player_id = payload
            .player_id
            .or_else(|| bound.as_ref().map(|b| b.player_id.clone()));
        let (Some(room_id), Some(player_id)) = (room_id, player_id) else {
            session.send(ServerMessage::error(Reason::InvalidInput));
            return;
        };

        if bound.is_some_and(|b| b.room_id == room_id && b.player_id == player_id) {
            session.binding = None;
        }
        match self.leave_player(&room_id, &player_id) {
            Ok(()) => tracing::info!(%room_id, %player_id, "player left"),
            Err(e) => session.send(ServerMessage::error(e.reason())),
        }
    }

    fn get_state(&self, session: &Session, room_id: &RoomId, player_id: &PlayerId) {
        let Some(cell) = self.room(room_id) else {
            session.send(ServerMessage::error(Reason::RoomNotFound));
            return;
        };
        let now = unix_millis();
        let result = cell.with_locked(|room| {
            room.touch(now);
            if room.has_player(player_id) {
                session.send(ServerMessage::StateSync {
                    room_state: project(room, player_id),
                });
                Ok(())
            } else {
                Err(RoomError::PlayerNotFound(player_id.clone(), room_id.clone()))
            }
        });
        if let Ok(Err(e)) | Err(e) = result {
            session.send(ServerMessage::error(e.reason()));
        }
    }

    /// Marks the player disconnected, drops its binding and syncs everyone
    /// still bound.
    ///
    /// Unlike other commands a leave waits out short contention, since a
    /// vanished connection cannot retry.
    fn leave_player(&self, room_id: &RoomId, player_id: &PlayerId) -> Result<(), SessionError> {
        let Some(cell) = self.room(room_id) else {
            self.unbind(room_id, player_id);
            return Err(SessionError::RoomNotFound(room_id.clone()));
        };

        let now = unix_millis();
        let mut rng = rand::rng();
        let mut attempt = |room: &mut Room| -> Result<(), RoomError> {
            room.apply(
                Command::Leave {
                    player_id: player_id.clone(),
                },
                &self.config.game,
                now,
                &mut rng,
            )?;
            self.unbind(room_id, player_id);
            self.broadcast(room, |view| ServerMessage::StateSync { room_state: view });
            Ok(())
        };

        let mut result = cell.with_locked(&mut attempt);
        for _ in 0..LEAVE_ATTEMPTS {
            if !matches!(result, Err(RoomError::Contention(_))) {
                break;
            }
            std::thread::yield_now();
            result = cell.with_locked(&mut attempt);
        }

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) | Err(e) => {
                self.unbind(room_id, player_id);
                Err(e.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Bindings
    // -----------------------------------------------------------------------

    fn bind(&self, room_id: &RoomId, player_id: &PlayerId, sender: PlayerSender) {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(room_id.clone())
            .or_default()
            .insert(player_id.clone(), sender);
    }

    fn unbind(&self, room_id: &RoomId, player_id: &PlayerId) {
        let mut bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(players) = bindings.get_mut(room_id) {
            players.remove(player_id);
            if players.is_empty() {
                bindings.remove(room_id);
            }
        }
    }

    /// Sends one message to every bound connection, each built from that
    /// player's own projection.
    ///
    /// Call with the room lock held: queueing under the lock is what keeps
    /// every connection's messages in `state_version` order.
    fn broadcast(&self, room: &Room, make: impl Fn(RoomView) -> ServerMessage) {
        let bindings = self.bindings.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(players) = bindings.get(&room.room_id) else {
            return;
        };
        for (player_id, tx) in players {
            if tx.send(make(project(room, player_id))).is_err() {
                tracing::debug!(room_id = %room.room_id, %player_id, "skipping closed connection");
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
