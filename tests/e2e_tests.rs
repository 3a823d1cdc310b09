//! End-to-end scenarios against a real `TcpListener`-bound server, one per
//! spec.md §8 literal scenario.

mod test_helpers;

use checkers_server::codec::OpCode;
use test_helpers::{start_test_server, TestClient};

#[tokio::test]
async fn happy_path_game_reaches_game_start_and_state() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    alice.login("alice").await;
    bob.login("bob").await;

    alice.send(OpCode::CreateRoom, "alice,lobby1").await;
    let created = alice.recv_op(OpCode::RoomCreated).await;
    assert_eq!(created.data, "lobby1");

    alice.send(OpCode::JoinRoom, "alice,lobby1").await;
    let joined = alice.recv_op(OpCode::RoomJoined).await;
    assert_eq!(joined.data, "lobby1,1");

    bob.send(OpCode::JoinRoom, "bob,lobby1").await;
    let joined = bob.recv_op(OpCode::RoomJoined).await;
    assert_eq!(joined.data, "lobby1,2");

    // Both sides see the match start.
    let start_a = alice.recv_op(OpCode::GameStart).await;
    let start_b = bob.recv_op(OpCode::GameStart).await;
    assert_eq!(start_a.data, "lobby1,alice,bob,alice");
    assert_eq!(start_b.data, "lobby1,alice,bob,alice");

    let state_a = alice.recv_op(OpCode::GameState).await;
    let state_b = bob.recv_op(OpCode::GameState).await;
    assert!(state_a.data.contains("\"current_turn\":\"alice\""));
    assert_eq!(state_a.data, state_b.data);

    // A legal opening move from alice (white moves first per the board
    // layout); both peers receive the refreshed board.
    alice.send(OpCode::Move, "lobby1,alice,5,0,4,1").await;
    let after_a = alice.recv_op(OpCode::GameState).await;
    let after_b = bob.recv_op(OpCode::GameState).await;
    assert_eq!(after_a.data, after_b.data);
    assert!(after_a.data.contains("\"current_turn\":\"bob\""));
}

#[tokio::test]
async fn malformed_prefix_closes_connection() {
    let addr = start_test_server().await;
    let mut client = TestClient::connect(addr).await;

    client.send_raw(b"XXXTCP|01|0005|alice\n").await;
    let err = client.recv_op(OpCode::Error).await;
    assert_eq!(err.data, "invalid message prefix");
    client.expect_close().await;
}

#[tokio::test]
async fn disallowed_op_in_lobby_triggers_eager_disconnect() {
    let addr = start_test_server().await;
    let mut client = TestClient::connect(addr).await;

    client.login("alice").await;
    // InLobby forbids Move; default MaxViolations is 1, so this single
    // rejection is enough to close the connection.
    client.send(OpCode::Move, "lobby1,alice,5,0,4,1").await;
    let err = client.recv_op(OpCode::Error).await;
    assert_eq!(err.data, "Operation not allowed in current state");
    client.expect_close().await;
}

#[tokio::test]
async fn explicit_leave_destroys_room_and_notifies_opponent() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    alice.login("alice").await;
    bob.login("bob").await;

    alice.send(OpCode::CreateRoom, "alice,lobby1").await;
    alice.recv_op(OpCode::RoomCreated).await;
    alice.send(OpCode::JoinRoom, "alice,lobby1").await;
    alice.recv_op(OpCode::RoomJoined).await;
    bob.send(OpCode::JoinRoom, "bob,lobby1").await;
    bob.recv_op(OpCode::RoomJoined).await;
    alice.recv_op(OpCode::GameStart).await;
    bob.recv_op(OpCode::GameStart).await;
    alice.recv_op(OpCode::GameState).await;
    bob.recv_op(OpCode::GameState).await;

    alice.send(OpCode::LeaveRoom, "lobby1,alice").await;
    let left_alice = alice.recv_op(OpCode::RoomLeft).await;
    assert_eq!(left_alice.data, "lobby1,alice");
    let left_bob = bob.recv_op(OpCode::RoomLeft).await;
    assert_eq!(left_bob.data, "lobby1,alice");

    // The room is gone: recreating it under the same name succeeds.
    alice.send(OpCode::CreateRoom, "alice,lobby1").await;
    let created = alice.recv_op(OpCode::RoomCreated).await;
    assert_eq!(created.data, "lobby1");
}

#[tokio::test]
async fn reconnect_mid_game_resumes_the_paused_match() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;

    alice.login("alice").await;
    bob.login("bob").await;
    alice.send(OpCode::CreateRoom, "alice,lobby1").await;
    alice.recv_op(OpCode::RoomCreated).await;
    alice.send(OpCode::JoinRoom, "alice,lobby1").await;
    alice.recv_op(OpCode::RoomJoined).await;
    bob.send(OpCode::JoinRoom, "bob,lobby1").await;
    bob.recv_op(OpCode::RoomJoined).await;
    alice.recv_op(OpCode::GameStart).await;
    bob.recv_op(OpCode::GameStart).await;
    alice.recv_op(OpCode::GameState).await;
    bob.recv_op(OpCode::GameState).await;

    // Alice's socket drops (simulated by dropping the connection).
    drop(alice);
    bob.recv_op(OpCode::PlayerDisconnected).await;
    bob.recv_op(OpCode::GamePaused).await;

    let mut alice = TestClient::connect(addr).await;
    alice.send(OpCode::ReconnectRequest, "lobby1,alice").await;
    let ok = alice.recv_op(OpCode::ReconnectOk).await;
    assert_eq!(ok.data, "lobby1");
    alice.recv_op(OpCode::GameResumed).await;
    alice.recv_op(OpCode::GameState).await;

    bob.recv_op(OpCode::PlayerReconnected).await;
    bob.recv_op(OpCode::GameResumed).await;
}
