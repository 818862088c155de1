//! Integration tests for the snapshot store and its request API.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use serde_json::json;
use wordchain_protocol::{Reason, RoomId, RoomStatus};
use wordchain_room::{Deck, GameConfig, Room, RoomLock};
use wordchain_store::{ApiResponse, FileRoomStore, handle_request};

fn store(config: GameConfig) -> (tempfile::TempDir, FileRoomStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = FileRoomStore::open(dir.path(), config).unwrap();
    (dir, store)
}

fn call(store: &FileRoomStore, action: &str, body: serde_json::Value) -> ApiResponse {
    handle_request(store, action, body.to_string().as_bytes())
}

/// Opening char あ; each joiner gets two cards: か,さ then た,な.
fn stacked(store: &FileRoomStore) -> RoomId {
    let room_id = RoomId::from("0300");
    let deck = Deck::from_cards(vec!['あ', 'か', 'さ', 'た', 'な', 'は', 'ま', 'や']);
    store
        .insert_room(&Room::new(room_id.clone(), deck, 0).unwrap())
        .unwrap();
    room_id
}

fn small_hands() -> GameConfig {
    GameConfig {
        initial_hand: 2,
        ..GameConfig::default()
    }
}

// =========================================================================
// Request API
// =========================================================================

#[test]
fn test_create_room_joins_creator() {
    let (_dir, store) = store(GameConfig::default());
    let resp = call(&store, "create_room", json!({ "name": "  Ann  " }));

    assert_eq!(resp.status, 200);
    assert!(resp.body.ok);
    let room_id = resp.body.room_id.clone().unwrap();
    let player_id = resp.body.player_id.clone().unwrap();
    let state = resp.body.room_state.as_ref().unwrap();
    assert_eq!(state.room_id, room_id);
    assert_eq!(state.status, RoomStatus::Waiting);
    assert_eq!(state.players.len(), 1);
    assert_eq!(state.players[0].name, "Ann");
    assert_eq!(state.own_player().unwrap().player_id, player_id);
    assert_eq!(state.own_player().unwrap().hand.as_ref().unwrap().len(), 7);

    let json: serde_json::Value = serde_json::from_str(&resp.to_json().unwrap()).unwrap();
    assert_eq!(json["ok"], true);
    assert_eq!(json["roomId"], room_id.as_str());
    assert!(json.get("reason").is_none());
}

#[test]
fn test_unknown_room_is_404() {
    let (_dir, store) = store(GameConfig::default());
    for body in [json!({}), json!({ "roomId": "9999" }), json!({ "roomId": "../../etc" })] {
        let resp = call(&store, "join_room", body);
        assert_eq!(resp.status, 404);
        assert_eq!(resp.body.reason, Some(Reason::RoomNotFound));
    }
}

#[test]
fn test_bad_json_and_unknown_action_are_400() {
    let (_dir, store) = store(small_hands());
    let room_id = stacked(&store);

    let resp = handle_request(&store, "join_room", b"{nope");
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.reason, Some(Reason::InvalidInput));

    let joined = call(&store, "join_room", json!({ "roomId": room_id }));
    let player_id = joined.body.player_id.unwrap();
    let resp = call(
        &store,
        "explode",
        json!({ "roomId": room_id, "playerId": player_id }),
    );
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.reason, Some(Reason::UnknownAction));
}

#[test]
fn test_play_undo_and_reasons_through_api() {
    let (_dir, store) = store(small_hands());
    let room_id = stacked(&store);
    let ann = call(&store, "join_room", json!({ "roomId": room_id.as_str(), "name": "Ann" }))
        .body
        .player_id
        .unwrap();
    let bob = call(&store, "join_room", json!({ "roomId": room_id, "name": "Bob" }));
    assert_eq!(bob.body.room_state.unwrap().status, RoomStatus::Playing);

    let resp = call(
        &store,
        "play_request",
        json!({ "roomId": room_id, "playerId": ann, "endChar": "ん", "word": "あん" }),
    );
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.reason, Some(Reason::NotInHand));
    assert!(resp.body.room_state.is_some());

    let resp = call(
        &store,
        "play_request",
        json!({ "roomId": room_id, "playerId": ann, "endChar": "か", "word": "いか" }),
    );
    assert_eq!(resp.body.reason, Some(Reason::WordPatternMismatch));

    let resp = call(
        &store,
        "play_request",
        json!({ "roomId": room_id, "playerId": ann, "endChar": "か", "word": "あか" }),
    );
    assert_eq!(resp.status, 200);
    let state = resp.body.room_state.unwrap();
    assert_eq!(state.current_char, 'は');
    let action_id = state.last_action.unwrap().action_id;

    let resp = call(
        &store,
        "undo_request",
        json!({ "roomId": room_id, "playerId": ann, "actionId": action_id }),
    );
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body.room_state.unwrap().current_char, 'あ');

    let resp = call(
        &store,
        "undo_request",
        json!({ "roomId": room_id, "playerId": ann, "actionId": action_id }),
    );
    assert_eq!(resp.body.reason, Some(Reason::UndoNotAvailable));
}

#[test]
fn test_get_state_leave_and_shuffle_through_api() {
    let (_dir, store) = store(small_hands());
    let room_id = stacked(&store);
    let ann = call(&store, "join_room", json!({ "roomId": room_id }))
        .body
        .player_id
        .unwrap();

    let state = call(&store, "get_state", json!({ "roomId": room_id, "playerId": ann }))
        .body
        .room_state
        .unwrap();
    let version = state.state_version;

    let resp = call(&store, "get_state", json!({ "roomId": room_id, "playerId": "p00000000" }));
    assert_eq!(resp.body.reason, Some(Reason::PlayerNotFound));

    let shuffled = call(&store, "shuffle_field", json!({ "roomId": room_id, "playerId": ann }))
        .body
        .room_state
        .unwrap();
    assert_eq!(shuffled.state_version, version + 1);
    assert!(shuffled.last_action.is_none());

    let left = call(&store, "leave_room", json!({ "roomId": room_id, "playerId": ann }))
        .body
        .room_state
        .unwrap();
    assert!(!left.own_player().unwrap().connected);
    assert_eq!(left.state_version, version + 2);
}

#[test]
fn test_rejections_leave_snapshot_untouched() {
    let (_dir, store) = store(small_hands());
    let room_id = stacked(&store);
    let ann = call(&store, "join_room", json!({ "roomId": room_id }))
        .body
        .player_id
        .unwrap();
    let path = store.room(&room_id).unwrap().path().to_path_buf();
    let before = std::fs::read(&path).unwrap();

    call(&store, "play_request", json!({ "roomId": room_id, "playerId": ann, "endChar": "か", "word": "あか" }));
    call(&store, "get_state", json!({ "roomId": room_id, "playerId": ann }));
    call(&store, "undo_request", json!({ "roomId": room_id, "playerId": ann, "actionId": "a1" }));

    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn test_full_room_through_api() {
    let (_dir, store) = store(GameConfig {
        max_players: 1,
        ..GameConfig::default()
    });
    let room_id = call(&store, "create_room", json!({})).body.room_id.unwrap();
    let resp = call(&store, "join_room", json!({ "roomId": room_id }));
    assert_eq!(resp.status, 400);
    assert_eq!(resp.body.reason, Some(Reason::RoomFull));
}

// =========================================================================
// Locking
// =========================================================================

#[test]
fn test_concurrent_commands_wait_for_lock() {
    let (_dir, store) = store(GameConfig::default());
    let room_id = store.create_room().unwrap();
    let store = Arc::new(store);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = Arc::clone(&store);
            let barrier = Arc::clone(&barrier);
            let room_id = room_id.clone();
            thread::spawn(move || {
                barrier.wait();
                store
                    .room(&room_id)
                    .unwrap()
                    .with_locked(|room| {
                        let seen = room.state_version;
                        thread::sleep(Duration::from_millis(20));
                        room.state_version = seen + 1;
                    })
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let version = store
        .room(&room_id)
        .unwrap()
        .with_locked(|room| room.state_version)
        .unwrap();
    assert_eq!(version, 5, "every command saw its predecessor's write");
}

#[test]
fn test_sweep_racing_queued_join_never_drops_the_join() {
    for round in 0..5 {
        let (_dir, store) = store(small_hands());
        let room_id = stacked(&store);
        let path = store.room(&room_id).unwrap().path().to_path_buf();
        let store = Arc::new(store);

        // Holds the lock so the sweep and the join both queue on the old file.
        let holder = {
            let store = Arc::clone(&store);
            let room_id = room_id.clone();
            thread::spawn(move || {
                store
                    .room(&room_id)
                    .unwrap()
                    .with_locked(|_| thread::sleep(Duration::from_millis(200)))
                    .unwrap();
            })
        };
        thread::sleep(Duration::from_millis(50));

        let sweeper = {
            let store = Arc::clone(&store);
            thread::spawn(move || store.sweep_expired_at(1 << 50).unwrap())
        };
        thread::sleep(Duration::from_millis(50));

        let joiner = {
            let store = Arc::clone(&store);
            let room_id = room_id.clone();
            thread::spawn(move || call(&store, "join_room", json!({ "roomId": room_id.as_str(), "name": "Ann" })))
        };

        holder.join().unwrap();
        let removed = sweeper.join().unwrap();
        let resp = joiner.join().unwrap();

        match resp.status {
            404 => {
                assert_eq!(resp.body.reason, Some(Reason::RoomNotFound), "round {round}");
                assert_eq!(removed, 1, "round {round}");
                assert!(!path.exists(), "round {round}");
            }
            200 => {
                assert_eq!(removed, 0, "round {round}: joined room was swept");
                let player_id = resp.body.player_id.clone().unwrap();
                let room: Room = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
                assert!(
                    room.players.iter().any(|p| p.player_id == player_id),
                    "round {round}: accepted join missing from snapshot"
                );
            }
            other => panic!("round {round}: unexpected status {other}"),
        }
    }
}
