//! Stateless request/response front end over [`FileRoomStore`].
//!
//! One call is one command: the room snapshot is locked, loaded, changed
//! and written back before the response is built. The action name comes
//! from the caller (typically a query parameter), the body is JSON.

use serde::{Deserialize, Serialize};
use wordchain_protocol::{ActionId, PlayerId, Reason, RoomId, RoomView};
use wordchain_room::{Command, GameConfig, Outcome, Room, RoomError, RoomLock, project, unix_millis};

use crate::{FileRoomStore, StoreError};

/// Request fields. Every field is optional; each action picks what it
/// needs.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RequestBody {
    room_id: Option<RoomId>,
    player_id: Option<PlayerId>,
    name: Option<String>,
    end_char: Option<String>,
    word: Option<String>,
    action_id: Option<ActionId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBody {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<Reason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<RoomId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_state: Option<RoomView>,
}

impl ApiBody {
    fn accepted(room_state: RoomView) -> Self {
        Self {
            ok: true,
            reason: None,
            room_id: None,
            player_id: None,
            room_state: Some(room_state),
        }
    }

    fn rejected(reason: Reason, room_state: Option<RoomView>) -> Self {
        Self {
            ok: false,
            reason: Some(reason),
            room_id: None,
            player_id: None,
            room_state,
        }
    }
}

/// An HTTP-style status plus JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: ApiBody,
}

impl ApiResponse {
    fn from_body(body: ApiBody) -> Self {
        let status = match (body.ok, body.reason) {
            (true, _) => 200,
            (false, Some(Reason::RoomNotFound)) => 404,
            (false, Some(Reason::StorageError)) => 500,
            (false, _) => 400,
        };
        Self { status, body }
    }

    fn error(err: &StoreError) -> Self {
        Self::from_body(ApiBody::rejected(err.reason(), None))
    }

    pub fn to_json(&self) -> Result<String, StoreError> {
        serde_json::to_string(&self.body).map_err(StoreError::Encode)
    }
}

/// Runs one action against the store.
///
/// Known actions: `create_room`, `join_room`, `get_state`, `leave_room`,
/// `play_request`, `undo_request`, `shuffle_field`.
pub fn handle_request(store: &FileRoomStore, action: &str, body: &[u8]) -> ApiResponse {
    let request: RequestBody = if body.iter().all(u8::is_ascii_whitespace) {
        RequestBody::default()
    } else {
        match serde_json::from_slice(body) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(action, error = %e, "undecodable request body");
                return ApiResponse::from_body(ApiBody::rejected(Reason::InvalidInput, None));
            }
        }
    };

    if action == "create_room" {
        return create_room(store, request.name);
    }

    let Some(room_id) = request.room_id.clone() else {
        return ApiResponse::from_body(ApiBody::rejected(Reason::RoomNotFound, None));
    };
    let result = store
        .room(&room_id)
        .and_then(|file| file.with_locked(|room| dispatch(room, action, request, store.config())));

    match result {
        Ok(body) => {
            if let Some(reason) = body.reason {
                tracing::debug!(%room_id, action, %reason, "request rejected");
            }
            ApiResponse::from_body(body)
        }
        Err(e) => {
            tracing::debug!(%room_id, action, error = %e, "request failed");
            ApiResponse::error(&e)
        }
    }
}

fn create_room(store: &FileRoomStore, name: Option<String>) -> ApiResponse {
    let mut rng = rand::rng();
    let now = unix_millis();
    let created = store.create_room_with(|room| -> Result<(PlayerId, RoomView), RoomError> {
        match room.apply(Command::Join { name }, store.config(), now, &mut rng)? {
            Outcome::Joined { player_id } => {
                let view = project(room, &player_id);
                Ok((player_id, view))
            }
            _ => Err(RoomError::InvalidInput("join produced no player".into())),
        }
    });

    match created {
        Ok((room_id, Ok((player_id, view)))) => ApiResponse::from_body(ApiBody {
            room_id: Some(room_id),
            player_id: Some(player_id),
            ..ApiBody::accepted(view)
        }),
        Ok((_, Err(e))) => ApiResponse::error(&StoreError::Room(e)),
        Err(e) => {
            tracing::warn!(error = %e, "room creation failed");
            ApiResponse::error(&e)
        }
    }
}

/// Runs with the snapshot locked. Anything that changes the room bumps
/// its version, which is what gets it written back.
fn dispatch(room: &mut Room, action: &str, request: RequestBody, config: &GameConfig) -> ApiBody {
    let now = unix_millis();
    let mut rng = rand::rng();
    room.touch(now);

    if action == "join_room" {
        return match room.apply(Command::Join { name: request.name }, config, now, &mut rng) {
            Ok(Outcome::Joined { player_id }) => ApiBody {
                player_id: Some(player_id.clone()),
                ..ApiBody::accepted(project(room, &player_id))
            },
            Ok(_) => ApiBody::rejected(Reason::InvalidInput, None),
            Err(e) => ApiBody::rejected(e.reason(), None),
        };
    }

    let Some(player_id) = request.player_id.filter(|id| room.has_player(id)) else {
        return ApiBody::rejected(Reason::PlayerNotFound, None);
    };

    let command = match action {
        "get_state" => return ApiBody::accepted(project(room, &player_id)),
        "leave_room" => Command::Leave {
            player_id: player_id.clone(),
        },
        "play_request" => Command::Play {
            player_id: player_id.clone(),
            end_char: request.end_char.unwrap_or_default(),
            word: request.word,
        },
        "undo_request" => Command::Undo {
            player_id: player_id.clone(),
            action_id: request.action_id.unwrap_or_else(|| ActionId(String::new())),
        },
        "shuffle_field" => Command::ShuffleField {
            player_id: player_id.clone(),
        },
        _ => return ApiBody::rejected(Reason::UnknownAction, None),
    };

    match room.apply(command, config, now, &mut rng) {
        Ok(_) => ApiBody::accepted(project(room, &player_id)),
        Err(e) => ApiBody::rejected(e.reason(), Some(project(room, &player_id))),
    }
}
