//! Integration tests for the wordchain server, handler, and full connection flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio_tungstenite::tungstenite::Message;
use wordchain::prelude::*;

type ClientWs =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

// =========================================================================
// Helpers
// =========================================================================

/// Starts a server on a random port and returns its address.
async fn start_server() -> String {
    let server = WordchainServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .unwrap();
    let addr = server.local_addr().to_string();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send(ws: &mut ClientWs, kind: &str, payload: Value) {
    let text = json!({ "type": kind, "payload": payload }).to_string();
    ws.send(Message::Text(text.into())).await.unwrap();
}

async fn recv(ws: &mut ClientWs) -> ServerMessage {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a server message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn create_room(ws: &mut ClientWs) -> RoomId {
    send(ws, "create_room", json!({})).await;
    match recv(ws).await {
        ServerMessage::RoomCreated { room_id } => room_id,
        other => panic!("expected room_created, got {other:?}"),
    }
}

/// Joins and returns the new player id and the view from `join_ok`. The
/// `state_sync` that follows is consumed too.
async fn join(ws: &mut ClientWs, room_id: &RoomId, name: &str) -> (PlayerId, RoomView) {
    send(ws, "join_room", json!({ "roomId": room_id, "name": name })).await;
    let joined = match recv(ws).await {
        ServerMessage::JoinOk {
            player_id,
            room_state,
        } => (player_id, room_state),
        other => panic!("expected join_ok, got {other:?}"),
    };
    assert!(matches!(recv(ws).await, ServerMessage::StateSync { .. }));
    joined
}

async fn expect_state_sync(ws: &mut ClientWs) -> RoomView {
    match recv(ws).await {
        ServerMessage::StateSync { room_state } => room_state,
        other => panic!("expected state_sync, got {other:?}"),
    }
}

// =========================================================================
// Room lifecycle
// =========================================================================

#[tokio::test]
async fn test_create_and_join_two_players() {
    let addr = start_server().await;
    let mut ann = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let room_id = create_room(&mut ann).await;
    assert_eq!(room_id.as_str().len(), 4);

    let (ann_id, view) = join(&mut ann, &room_id, "Ann").await;
    assert_eq!(view.status, RoomStatus::Waiting);
    assert_eq!(view.own_player().unwrap().player_id, ann_id);
    assert_eq!(view.own_player().unwrap().hand.as_ref().unwrap().len(), 7);

    let (bob_id, view) = join(&mut bob, &room_id, "Bob").await;
    assert_eq!(view.status, RoomStatus::Playing);
    assert_ne!(ann_id, bob_id);

    // Ann hears about Bob, without seeing his hand.
    let synced = expect_state_sync(&mut ann).await;
    assert_eq!(synced.players.len(), 2);
    assert_eq!(synced.own_player().unwrap().player_id, ann_id);
    let bob_seat = synced.players.iter().find(|p| p.player_id == bob_id).unwrap();
    assert!(bob_seat.hand.is_none());
    assert_eq!(bob_seat.hand_count, 7);
}

#[tokio::test]
async fn test_join_unknown_room_is_error() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    send(&mut ws, "join_room", json!({ "roomId": "9999" })).await;
    assert_eq!(
        recv(&mut ws).await,
        ServerMessage::error(Reason::RoomNotFound)
    );

    send(&mut ws, "join_room", json!({})).await;
    assert_eq!(
        recv(&mut ws).await,
        ServerMessage::error(Reason::RoomNotFound)
    );
}

// =========================================================================
// Turns
// =========================================================================

#[tokio::test]
async fn test_play_and_undo_broadcast_to_room() {
    let addr = start_server().await;
    let mut ann = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let room_id = create_room(&mut ann).await;
    let (ann_id, _) = join(&mut ann, &room_id, "Ann").await;
    let (_, view) = join(&mut bob, &room_id, "Bob").await;
    let before = expect_state_sync(&mut ann).await;
    assert_eq!(before.state_version, view.state_version);

    let card = before.own_player().unwrap().hand.as_ref().unwrap()[0];
    let word = format!("{}{}", before.current_char, card);
    send(
        &mut ann,
        "play_request",
        json!({ "roomId": room_id, "playerId": ann_id, "endChar": card.to_string(), "word": word }),
    )
    .await;

    let action_id = match recv(&mut ann).await {
        ServerMessage::PlayResult(result) => {
            assert!(result.accepted, "play rejected: {:?}", result.reason);
            let state = result.room_state.unwrap();
            assert_eq!(state.state_version, before.state_version + 1);
            assert_eq!(state.own_player().unwrap().score, 1);
            assert_eq!(state.last_play.as_ref().unwrap().word.as_deref(), Some(word.as_str()));
            state.last_action.unwrap().action_id
        }
        other => panic!("expected play_result, got {other:?}"),
    };
    match recv(&mut bob).await {
        ServerMessage::PlayResult(result) => {
            assert!(result.accepted);
            let state = result.room_state.unwrap();
            assert_eq!(state.own_player().unwrap().name, "Bob");
        }
        other => panic!("expected play_result, got {other:?}"),
    }

    send(
        &mut ann,
        "undo_request",
        json!({ "roomId": room_id, "playerId": ann_id, "actionId": action_id }),
    )
    .await;
    for ws in [&mut ann, &mut bob] {
        match recv(ws).await {
            ServerMessage::UndoResult(result) => {
                assert!(result.accepted);
                let state = result.room_state.unwrap();
                assert_eq!(state.current_char, before.current_char);
                assert_eq!(state.deck_count, before.deck_count);
                assert_eq!(state.state_version, before.state_version + 2);
                assert!(state.last_action.is_none());
            }
            other => panic!("expected undo_result, got {other:?}"),
        }
    }
}

#[tokio::test]
async fn test_rejected_play_goes_to_caller_only() {
    let addr = start_server().await;
    let mut ann = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let room_id = create_room(&mut ann).await;
    let (ann_id, _) = join(&mut ann, &room_id, "Ann").await;
    let (bob_id, _) = join(&mut bob, &room_id, "Bob").await;
    let before = expect_state_sync(&mut ann).await;

    send(
        &mut ann,
        "play_request",
        json!({ "roomId": room_id, "playerId": ann_id, "endChar": "xy" }),
    )
    .await;
    match recv(&mut ann).await {
        ServerMessage::PlayResult(result) => {
            assert!(!result.accepted);
            assert_eq!(result.reason, Some(Reason::InvalidInput));
            assert_eq!(result.room_state.unwrap().state_version, before.state_version);
        }
        other => panic!("expected play_result, got {other:?}"),
    }

    // Bob's next message is the answer to his own request, not Ann's
    // rejection.
    send(&mut bob, "get_state", json!({ "roomId": room_id, "playerId": bob_id })).await;
    let state = expect_state_sync(&mut bob).await;
    assert_eq!(state.state_version, before.state_version);
}

// =========================================================================
// Connection handling
// =========================================================================

#[tokio::test]
async fn test_undecodable_messages_are_invalid_input() {
    let addr = start_server().await;
    let mut ws = connect(&addr).await;

    ws.send(Message::Text("not json".into())).await.unwrap();
    assert_eq!(recv(&mut ws).await, ServerMessage::error(Reason::InvalidInput));

    send(&mut ws, "teleport", json!({})).await;
    assert_eq!(recv(&mut ws).await, ServerMessage::error(Reason::InvalidInput));

    // Still usable afterwards.
    create_room(&mut ws).await;
}

#[tokio::test]
async fn test_disconnect_syncs_remaining_players() {
    let addr = start_server().await;
    let mut ann = connect(&addr).await;
    let mut bob = connect(&addr).await;

    let room_id = create_room(&mut ann).await;
    join(&mut ann, &room_id, "Ann").await;
    let (bob_id, _) = join(&mut bob, &room_id, "Bob").await;
    expect_state_sync(&mut ann).await;

    bob.close(None).await.unwrap();

    let synced = expect_state_sync(&mut ann).await;
    let bob_seat = synced.players.iter().find(|p| p.player_id == bob_id).unwrap();
    assert!(!bob_seat.connected);
    // Seats survive disconnects.
    assert_eq!(synced.players.len(), 2);
    assert_eq!(synced.status, RoomStatus::Playing);
}

#[tokio::test]
async fn test_wrong_path_is_refused() {
    let addr = start_server().await;
    let result = tokio_tungstenite::connect_async(format!("ws://{addr}/chat")).await;
    assert!(result.is_err());
}
