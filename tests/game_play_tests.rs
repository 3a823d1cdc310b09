//! `Move`/`MultiMove` handler contracts: wrong turn, illegal move, and the
//! multi-step jump chain (spec.md §4.8, §8 boundary behaviors).

mod test_helpers;

use checkers_server::codec::OpCode;
use test_helpers::{start_test_server, TestClient};

async fn start_game(alice: &mut TestClient, bob: &mut TestClient) {
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
}

#[tokio::test]
async fn move_out_of_turn_is_rejected() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    // White (alice) moves first; bob moving now is out of turn.
    bob.send(OpCode::Move, "lobby1,bob,2,1,3,0").await;
    let fail = bob.recv_op(OpCode::InvalidMove).await;
    assert_eq!(fail.data, "Illegal move");
}

#[tokio::test]
async fn illegal_destination_is_rejected() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    // Backwards, not a legal diagonal step for a man.
    alice.send(OpCode::Move, "lobby1,alice,5,0,6,1").await;
    let fail = alice.recv_op(OpCode::InvalidMove).await;
    assert_eq!(fail.data, "Illegal move");
}

#[tokio::test]
async fn multi_move_rejects_out_of_range_step_count() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    // k = 1 is below the spec's 2..=20 range.
    alice
        .send(OpCode::MultiMove, "lobby1,alice,1,5,0,4,1")
        .await;
    let fail = alice.recv_op(OpCode::InvalidMove).await;
    assert_eq!(fail.data, "Invalid move count");
}

#[tokio::test]
async fn multi_move_field_count_must_match_k() {
    let addr = start_test_server().await;
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    start_game(&mut alice, &mut bob).await;

    // k = 3 promises 3 positions (6 fields) but only 2 are supplied.
    alice
        .send(OpCode::MultiMove, "lobby1,alice,3,5,0,4,1")
        .await;
    let fail = alice.recv_op(OpCode::InvalidMove).await;
    assert_eq!(fail.data, "Invalid move count");
}
