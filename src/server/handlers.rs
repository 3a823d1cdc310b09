//! One function per opcode (spec §4.8).

use std::sync::Arc;
use std::time::Instant;

use crate::board::Color;
use crate::codec::OpCode;
use crate::room::RoomState;
use crate::session::{ConnState, GameState, Session};

use super::CheckersServer;

/// What the read loop should do after a handler returns.
pub enum Outcome {
    Continue,
    /// A `ReconnectRequest` adopted a preserved session; the read loop
    /// should drive that session from now on instead of the local one.
    Switch(Arc<Session>),
}

pub async fn dispatch(
    server: &Arc<CheckersServer>,
    session: &Arc<Session>,
    op: OpCode,
    data: &str,
) -> Outcome {
    match op {
        OpCode::Login => {
            login(server, session, data).await;
            Outcome::Continue
        }
        OpCode::CreateRoom => {
            create_room(server, session, data).await;
            Outcome::Continue
        }
        OpCode::JoinRoom => {
            join_room(server, session, data).await;
            Outcome::Continue
        }
        OpCode::LeaveRoom => {
            leave_room(server, session, data).await;
            Outcome::Continue
        }
        OpCode::Move => {
            apply_move(server, session, data).await;
            Outcome::Continue
        }
        OpCode::MultiMove => {
            apply_multi_move(server, session, data).await;
            Outcome::Continue
        }
        OpCode::ListRooms => {
            list_rooms(server, session).await;
            Outcome::Continue
        }
        OpCode::Ping => {
            session.send_frame(OpCode::Pong, "").await;
            Outcome::Continue
        }
        OpCode::Pong => {
            handle_pong(session).await;
            Outcome::Continue
        }
        OpCode::ReconnectRequest => match reconnect(server, session, data).await {
            Some(target) => Outcome::Switch(target),
            None => Outcome::Continue,
        },
        // Every other opcode that reaches here passed the whitelist but has
        // no sender-initiated handler (e.g. server-only notifications).
        _ => Outcome::Continue,
    }
}

async fn login(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let id = data.trim();
    if id.is_empty() {
        session
            .send_frame(OpCode::LoginFail, "Name cannot be empty")
            .await;
        return;
    }
    match server.sessions.login(id, session.clone()) {
        Ok(()) => {
            *session.id.lock().await = Some(id.to_string());
            *session.game_state.lock().await = GameState::InLobby;
            tracing::info!(id, "client logged in");
            session.send_frame(OpCode::LoginOk, id).await;
        }
        Err(crate::session_registry::LoginError::AlreadyInUse) => {
            session
                .send_frame(OpCode::LoginFail, "Client ID already in use")
                .await;
        }
        Err(crate::session_registry::LoginError::RegistryFull) => {
            session
                .send_frame(OpCode::LoginFail, "Server is full")
                .await;
        }
        Err(crate::session_registry::LoginError::EmptyId) => {
            session
                .send_frame(OpCode::LoginFail, "Name cannot be empty")
                .await;
        }
    }
}

async fn create_room(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let mut parts = data.splitn(2, ',');
    let (Some(player), Some(room)) = (parts.next(), parts.next()) else {
        session
            .send_frame(OpCode::RoomFail, "Invalid format")
            .await;
        return;
    };
    match server.rooms.create(room, player) {
        Ok(_) => {
            session.send_frame(OpCode::RoomCreated, room).await;
        }
        Err(crate::room_registry::CreateRoomError::EmptyName) => {
            session
                .send_frame(OpCode::RoomFail, "Room name cannot be empty")
                .await;
        }
        Err(crate::room_registry::CreateRoomError::AlreadyExists) => {
            session
                .send_frame(OpCode::RoomFail, "Room already exists")
                .await;
        }
        Err(crate::room_registry::CreateRoomError::RegistryFull) => {
            session
                .send_frame(OpCode::RoomFail, "Server has reached its room limit")
                .await;
        }
    }
}

async fn join_room(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let mut parts = data.splitn(2, ',');
    let (Some(player), Some(room_name)) = (parts.next(), parts.next()) else {
        session
            .send_frame(OpCode::RoomFail, "Invalid format")
            .await;
        return;
    };

    let Some(room) = server.rooms.find(room_name) else {
        session
            .send_frame(OpCode::RoomFail, "Room not found")
            .await;
        return;
    };

    let current_room = session.current_room.lock().await.clone();
    match current_room.as_deref() {
        Some(name) if name == room_name => {
            session
                .send_frame(OpCode::RoomFail, "Already in this room")
                .await;
            return;
        }
        Some(_) => {
            session
                .send_frame(OpCode::RoomFail, "Already in another room")
                .await;
            return;
        }
        None => {}
    }

    match room.join(player).await {
        Err(crate::room::JoinError::RoomFull) => {
            session.send_frame(OpCode::RoomFail, "Room is full").await;
            return;
        }
        Err(crate::room::JoinError::AlreadyInThisRoom) => {
            session
                .send_frame(OpCode::RoomFail, "Already in this room")
                .await;
            return;
        }
        Ok(outcome) => {
            *session.current_room.lock().await = Some(room_name.to_string());
            session
                .send_frame(
                    OpCode::RoomJoined,
                    &format!("{room_name},{}", outcome.players_count),
                )
                .await;

            if outcome.started {
                *session.game_state.lock().await = GameState::InGame;
                let members = room.members().await;
                for member_id in &members {
                    if member_id != player {
                        if let Some(other) = server.sessions.find(member_id) {
                            *other.game_state.lock().await = GameState::InGame;
                        }
                    }
                }

                let inner = room.inner.lock().await;
                if let Some(game) = &inner.game {
                    let turn_name = match inner_board_turn(game) {
                        Color::White => game.player1.as_str(),
                        Color::Black => game.player2.as_str(),
                    };
                    let start_data =
                        format!("{room_name},{},{},{turn_name}", game.player1, game.player2);
                    let board_json = game.board_json();
                    drop(inner);
                    server
                        .broadcast_room(&room, OpCode::GameStart, &start_data)
                        .await;
                    server
                        .broadcast_room(&room, OpCode::GameState, &board_json)
                        .await;
                }
            } else {
                *session.game_state.lock().await = GameState::InRoomWaiting;
            }
        }
    }
}

fn inner_board_turn(game: &crate::room::GameInfo) -> Color {
    game.board.current_turn
}

async fn leave_room(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let mut parts = data.splitn(2, ',');
    let (Some(room_name), Some(player)) = (parts.next(), parts.next()) else {
        session.send_frame(OpCode::Error, "Invalid format").await;
        return;
    };

    let Some(room) = server.rooms.find(room_name) else {
        session.send_frame(OpCode::Error, "Room not found").await;
        return;
    };

    let other = room.other_member(player).await;
    server.rooms.remove(room_name);

    *session.current_room.lock().await = None;
    *session.game_state.lock().await = GameState::InLobby;
    session
        .send_frame(OpCode::RoomLeft, &format!("{room_name},{player}"))
        .await;

    if let Some(other_id) = other {
        if let Some(other_session) = server.sessions.find(&other_id) {
            *other_session.current_room.lock().await = None;
            *other_session.game_state.lock().await = GameState::InLobby;
            other_session
                .send_frame(OpCode::RoomLeft, &format!("{room_name},{player}"))
                .await;
        }
    }
}

fn parse_usize(s: &str) -> Option<usize> {
    s.parse().ok()
}

async fn apply_move(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let fields: Vec<&str> = data.split(',').collect();
    let [room_name, player, fr, fc, tr, tc] = fields[..] else {
        session
            .send_frame(OpCode::InvalidMove, "Invalid format")
            .await;
        return;
    };
    let Some(step) = parse_step(fr, fc, tr, tc) else {
        session
            .send_frame(OpCode::InvalidMove, "Invalid coordinates")
            .await;
        return;
    };

    let Some(room) = server.rooms.find(room_name) else {
        session.send_frame(OpCode::Error, "Game not found").await;
        return;
    };

    finish_one_step_move(server, session, &room, room_name, player, step).await;
}

fn parse_step(fr: &str, fc: &str, tr: &str, tc: &str) -> Option<((usize, usize), (usize, usize))> {
    Some((
        (parse_usize(fr)?, parse_usize(fc)?),
        (parse_usize(tr)?, parse_usize(tc)?),
    ))
}

async fn finish_one_step_move(
    server: &Arc<CheckersServer>,
    session: &Arc<Session>,
    room: &Arc<crate::room::Room>,
    room_name: &str,
    player: &str,
    step: ((usize, usize), (usize, usize)),
) {
    let mut inner = room.inner.lock().await;
    let Some(game) = inner.game.as_mut() else {
        session.send_frame(OpCode::Error, "Game not found").await;
        return;
    };
    let Some(color) = game.color_of(player) else {
        session
            .send_frame(OpCode::InvalidMove, "Unknown player")
            .await;
        return;
    };
    if !game.board.validate_move(step.0, step.1, color) {
        session
            .send_frame(OpCode::InvalidMove, "Illegal move")
            .await;
        return;
    }
    game.board.apply_move(step.0, step.1);
    game.board.change_turn();
    let board_json = game.board_json();
    let winner = game.board.check_game_over();
    let (p1, p2) = (game.player1.clone(), game.player2.clone());
    drop(inner);

    server.broadcast_room(room, OpCode::GameState, &board_json).await;

    if let Some(winner_color) = winner {
        let winner_name = match winner_color {
            Color::White => p1.as_str(),
            Color::Black => p2.as_str(),
        };
        server
            .broadcast_room(room, OpCode::GameEnd, &format!("{winner_name},no_pieces"))
            .await;
        finish_and_destroy_room(server, room, room_name).await;
    }
}

/// `room,player,k,r1,c1,...,rk,ck`: a chain of `k` board positions (`k-1`
/// consecutive single-step/jump moves by the same player), applied in
/// order before the turn changes once (spec §4.8).
async fn apply_multi_move(server: &Arc<CheckersServer>, session: &Arc<Session>, data: &str) {
    let fields: Vec<&str> = data.split(',').collect();
    if fields.len() < 5 {
        session
            .send_frame(OpCode::InvalidMove, "Invalid format")
            .await;
        return;
    }
    let room_name = fields[0];
    let player = fields[1];
    let Some(k) = parse_usize(fields[2]) else {
        session
            .send_frame(OpCode::InvalidMove, "Invalid move count")
            .await;
        return;
    };
    if !(2..=20).contains(&k) || fields.len() != 3 + k * 2 {
        session
            .send_frame(OpCode::InvalidMove, "Invalid move count")
            .await;
        return;
    }

    let mut positions = Vec::with_capacity(k);
    for i in 0..k {
        let row = fields[3 + i * 2];
        let col = fields[4 + i * 2];
        match (parse_usize(row), parse_usize(col)) {
            (Some(r), Some(c)) => positions.push((r, c)),
            _ => {
                session
                    .send_frame(OpCode::InvalidMove, "Invalid coordinates")
                    .await;
                return;
            }
        }
    }

    let Some(room) = server.rooms.find(room_name) else {
        session.send_frame(OpCode::Error, "Game not found").await;
        return;
    };

    let mut inner = room.inner.lock().await;
    let Some(game) = inner.game.as_mut() else {
        session.send_frame(OpCode::Error, "Game not found").await;
        return;
    };
    let Some(color) = game.color_of(player) else {
        session
            .send_frame(OpCode::InvalidMove, "Unknown player")
            .await;
        return;
    };

    for window in positions.windows(2) {
        let (from, to) = (window[0], window[1]);
        if !game.board.validate_move(from, to, color) {
            session
                .send_frame(OpCode::InvalidMove, "Illegal move in chain")
                .await;
            return;
        }
        game.board.apply_move(from, to);
    }
    game.board.change_turn();
    let board_json = game.board_json();
    let winner = game.board.check_game_over();
    let (p1, p2) = (game.player1.clone(), game.player2.clone());
    drop(inner);

    server.broadcast_room(&room, OpCode::GameState, &board_json).await;

    if let Some(winner_color) = winner {
        let winner_name = match winner_color {
            Color::White => p1.as_str(),
            Color::Black => p2.as_str(),
        };
        server
            .broadcast_room(&room, OpCode::GameEnd, &format!("{winner_name},no_pieces"))
            .await;
        finish_and_destroy_room(server, &room, room_name).await;
    }
}

async fn finish_and_destroy_room(
    server: &Arc<CheckersServer>,
    room: &Arc<crate::room::Room>,
    room_name: &str,
) {
    room.finish().await;
    let members = room.members().await;
    server.rooms.remove(room_name);
    for member_id in members {
        if let Some(member) = server.sessions.find(&member_id) {
            *member.current_room.lock().await = None;
            *member.game_state.lock().await = GameState::InLobby;
        }
    }
}

async fn list_rooms(server: &Arc<CheckersServer>, session: &Arc<Session>) {
    let rows = server.rooms.list().await;
    let json = crate::room_registry::RoomRegistry::list_json(&rows);
    session.send_frame(OpCode::RoomsList, &json).await;
}

async fn handle_pong(session: &Arc<Session>) {
    let mut liveness = session.liveness.lock().await;
    liveness.last_pong_at = Instant::now();
    liveness.missed_pongs = 0;
    liveness.awaiting_pong = false;
    if matches!(
        liveness.conn_state,
        ConnState::Disconnected | ConnState::Reconnecting
    ) {
        liveness.conn_state = ConnState::Connected;
    }
}

async fn reconnect(
    server: &Arc<CheckersServer>,
    session: &Arc<Session>,
    data: &str,
) -> Option<Arc<Session>> {
    let (room_hint, player): (Option<&str>, &str) = match data.split_once(',') {
        Some((room, player)) => (Some(room), player),
        None => (None, data),
    };
    let player = player.trim();

    let Some(target) = server.sessions.find(player) else {
        session
            .send_frame(OpCode::ReconnectFail, "No such client")
            .await;
        return None;
    };

    {
        let liveness = target.liveness.lock().await;
        if !matches!(liveness.conn_state, ConnState::Disconnected | ConnState::Timeout) {
            drop(liveness);
            session
                .send_frame(OpCode::ReconnectFail, "Client is not disconnected")
                .await;
            return None;
        }
    }

    let new_outbox = session.outbox.lock().await.clone();
    {
        let mut liveness = target.liveness.lock().await;
        liveness.conn_state = ConnState::Reconnecting;
        liveness.missed_pongs = 0;
        liveness.disconnect_at = None;
    }
    *target.outbox.lock().await = new_outbox;
    target.active.store(true, std::sync::atomic::Ordering::SeqCst);
    {
        let mut liveness = target.liveness.lock().await;
        liveness.conn_state = ConnState::Connected;
        liveness.last_pong_at = Instant::now();
    }

    tracing::info!(id = player, "client reconnected");

    let state = *target.game_state.lock().await;
    match state {
        GameState::NotLoggedIn => {
            // Shouldn't happen: a preserved session is always logged in.
            target.send_frame(OpCode::ReconnectFail, "Invalid session state").await;
        }
        GameState::InLobby => {
            target.send_frame(OpCode::ReconnectOk, "lobby").await;
            target.send_frame(OpCode::LoginOk, player).await;
        }
        GameState::InRoomWaiting => {
            let Some(room_name) = room_hint else {
                target.send_frame(OpCode::ReconnectFail, "Room name required").await;
                return Some(target);
            };
            match server.rooms.find(room_name) {
                Some(room) => {
                    let count = room.players_count().await;
                    target.send_frame(OpCode::ReconnectOk, room_name).await;
                    target
                        .send_frame(OpCode::RoomJoined, &format!("{room_name},{count}"))
                        .await;
                }
                None => {
                    *target.game_state.lock().await = GameState::InLobby;
                    *target.current_room.lock().await = None;
                    target
                        .send_frame(OpCode::ReconnectFail, "Room was closed")
                        .await;
                    target.send_frame(OpCode::LoginOk, player).await;
                }
            }
        }
        GameState::InGame => {
            let Some(room_name) = room_hint else {
                target.send_frame(OpCode::ReconnectFail, "Room name required").await;
                return Some(target);
            };
            match server.rooms.find(room_name) {
                Some(room) if room.is_member(player).await => {
                    let room_state = room.state().await;
                    if room_state == RoomState::Paused {
                        room.resume().await;
                        let board_json = {
                            let inner = room.inner.lock().await;
                            inner.game.as_ref().map(|g| g.board_json())
                        };
                        target.send_frame(OpCode::ReconnectOk, room_name).await;
                        target.send_frame(OpCode::GameResumed, room_name).await;
                        if let Some(json) = &board_json {
                            target.send_frame(OpCode::GameState, json).await;
                        }
                        if let Some(opponent_id) = room.other_member(player).await {
                            if let Some(opponent) = server.sessions.find(&opponent_id) {
                                opponent
                                    .send_frame(
                                        OpCode::PlayerReconnected,
                                        &format!("{room_name},{player}"),
                                    )
                                    .await;
                                opponent.send_frame(OpCode::GameResumed, room_name).await;
                            }
                        }
                    } else {
                        let board_json = {
                            let inner = room.inner.lock().await;
                            inner.game.as_ref().map(|g| g.board_json())
                        };
                        target.send_frame(OpCode::ReconnectOk, room_name).await;
                        if let Some(json) = &board_json {
                            target.send_frame(OpCode::GameState, json).await;
                        }
                    }
                }
                _ => {
                    *target.game_state.lock().await = GameState::InLobby;
                    *target.current_room.lock().await = None;
                    target
                        .send_frame(OpCode::ReconnectFail, "Room was closed")
                        .await;
                    target.send_frame(OpCode::LoginOk, player).await;
                }
            }
        }
    }

    Some(target)
}
