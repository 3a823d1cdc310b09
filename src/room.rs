//! A single two-seat game room and its lifecycle (spec §3, §4.4).

use std::time::Instant;

use tokio::sync::Mutex;

use crate::board::{Board, BoardWire, Color};

/// The room's lifecycle state (one of the two visible state machines named
/// in spec §9, alongside the session's `GameState`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomState {
    Waiting,
    Active,
    Paused,
    Finished,
}

/// Board plus the two player names and whose color is whose.
pub struct GameInfo {
    pub board: Board,
    pub player1: String,
    pub player2: String,
}

impl GameInfo {
    fn new(player1: String, player2: String) -> Self {
        GameInfo {
            board: Board::new(),
            player1,
            player2,
        }
    }

    pub fn color_of(&self, player: &str) -> Option<Color> {
        if player == self.player1 {
            Some(Color::White)
        } else if player == self.player2 {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn name_of(&self, color: Color) -> &str {
        match color {
            Color::White => &self.player1,
            Color::Black => &self.player2,
        }
    }

    pub fn board_json(&self) -> String {
        BoardWire::new(&self.board, &self.player1, &self.player2).to_json()
    }
}

/// Mutable room content, guarded by a single per-room lock. Room `name`,
/// `slot`, and `owner` are set at creation and never change, so they live
/// outside the lock.
pub struct RoomInner {
    pub player1: Option<String>,
    pub player2: Option<String>,
    pub game: Option<GameInfo>,
    pub game_started: bool,
    pub state: RoomState,
    pub paused_at: Option<Instant>,
    pub disconnected_player: Option<String>,
    pub waiting_for_reconnect: bool,
}

pub struct Room {
    pub name: String,
    pub owner: String,
    /// Stable index surfaced in `ListRooms` (spec §4.8).
    pub slot: usize,
    pub inner: Mutex<RoomInner>,
}

/// Outcome of a successful join (spec §4.4, §4.8).
pub struct JoinOutcome {
    pub players_count: u8,
    /// `true` once the second player has joined and `init_game` has run.
    pub started: bool,
}

/// The five join-result codes spec §4.4 documents. `AlreadyInAnotherRoom`
/// and `ClientNotFound` require knowledge the `Room` itself doesn't have
/// (the player's own `currentRoom` and session existence), so they are
/// produced by the caller (`server::handlers`) rather than by `Room::join`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomFull,
    AlreadyInThisRoom,
}

impl JoinError {
    pub const fn code(self) -> i32 {
        match self {
            JoinError::RoomFull => -2,
            JoinError::AlreadyInThisRoom => -3,
        }
    }
}

impl Room {
    pub fn new(name: String, owner: String, slot: usize) -> Self {
        Room {
            name,
            owner,
            slot,
            inner: Mutex::new(RoomInner {
                player1: None,
                player2: None,
                game: None,
                game_started: false,
                state: RoomState::Waiting,
                paused_at: None,
                disconnected_player: None,
                waiting_for_reconnect: false,
            }),
        }
    }

    /// First free seat takes the joiner; the second arrival completes the
    /// pair and starts the game (spec §4.4, §4.8).
    pub async fn join(&self, player: &str) -> Result<JoinOutcome, JoinError> {
        let mut inner = self.inner.lock().await;

        if inner.player1.as_deref() == Some(player) || inner.player2.as_deref() == Some(player) {
            return Err(JoinError::AlreadyInThisRoom);
        }

        if inner.player1.is_none() {
            inner.player1 = Some(player.to_string());
        } else if inner.player2.is_none() {
            inner.player2 = Some(player.to_string());
        } else {
            return Err(JoinError::RoomFull);
        }

        let count = inner.players_count();
        let started = if count == 2 && !inner.game_started {
            let p1 = inner.player1.clone().unwrap();
            let p2 = inner.player2.clone().unwrap();
            inner.game = Some(GameInfo::new(p1, p2));
            inner.game_started = true;
            inner.state = RoomState::Active;
            true
        } else {
            false
        };

        Ok(JoinOutcome {
            players_count: count,
            started,
        })
    }

    /// The other member's name, if the room currently has two players.
    pub async fn other_member(&self, player: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        if inner.player1.as_deref() == Some(player) {
            inner.player2.clone()
        } else if inner.player2.as_deref() == Some(player) {
            inner.player1.clone()
        } else {
            None
        }
    }

    pub async fn members(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        [&inner.player1, &inner.player2]
            .into_iter()
            .flatten()
            .cloned()
            .collect()
    }

    pub async fn is_member(&self, player: &str) -> bool {
        let inner = self.inner.lock().await;
        inner.player1.as_deref() == Some(player) || inner.player2.as_deref() == Some(player)
    }

    pub async fn players_count(&self) -> u8 {
        self.inner.lock().await.players_count()
    }

    pub async fn state(&self) -> RoomState {
        self.inner.lock().await.state
    }

    /// Pause an active game on disconnect, recording who dropped
    /// (spec §4.4, §4.7).
    pub async fn pause(&self, who: &str) {
        let mut inner = self.inner.lock().await;
        inner.state = RoomState::Paused;
        inner.paused_at = Some(Instant::now());
        inner.disconnected_player = Some(who.to_string());
        inner.waiting_for_reconnect = true;
    }

    /// Resume a paused game on reconnect.
    pub async fn resume(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = RoomState::Active;
        inner.paused_at = None;
        inner.disconnected_player = None;
        inner.waiting_for_reconnect = false;
    }

    pub async fn finish(&self) {
        let mut inner = self.inner.lock().await;
        inner.state = RoomState::Finished;
        if let Some(game) = &mut inner.game {
            // No further moves are legal once the room is finished.
            let _ = game;
        }
    }

    pub async fn paused_elapsed(&self) -> Option<std::time::Duration> {
        let inner = self.inner.lock().await;
        inner.paused_at.map(|at| at.elapsed())
    }

    pub async fn disconnected_player(&self) -> Option<String> {
        self.inner.lock().await.disconnected_player.clone()
    }
}

impl RoomInner {
    pub fn players_count(&self) -> u8 {
        self.player1.is_some() as u8 + self.player2.is_some() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_join_does_not_start_game() {
        let room = Room::new("lobby1".into(), "alice".into(), 0);
        let outcome = room.join("alice").await.unwrap();
        assert_eq!(outcome.players_count, 1);
        assert!(!outcome.started);
        assert_eq!(room.state().await, RoomState::Waiting);
    }

    #[tokio::test]
    async fn second_join_starts_game() {
        let room = Room::new("lobby1".into(), "alice".into(), 0);
        room.join("alice").await.unwrap();
        let outcome = room.join("bob").await.unwrap();
        assert_eq!(outcome.players_count, 2);
        assert!(outcome.started);
        assert_eq!(room.state().await, RoomState::Active);
    }

    #[tokio::test]
    async fn rejoining_same_room_is_rejected() {
        let room = Room::new("lobby1".into(), "alice".into(), 0);
        room.join("alice").await.unwrap();
        assert_eq!(room.join("alice").await.unwrap_err(), JoinError::AlreadyInThisRoom);
    }

    #[tokio::test]
    async fn full_room_rejects_third_player() {
        let room = Room::new("lobby1".into(), "alice".into(), 0);
        room.join("alice").await.unwrap();
        room.join("bob").await.unwrap();
        assert_eq!(room.join("carol").await.unwrap_err(), JoinError::RoomFull);
    }

    #[tokio::test]
    async fn pause_then_resume_round_trips_state() {
        let room = Room::new("lobby1".into(), "alice".into(), 0);
        room.join("alice").await.unwrap();
        room.join("bob").await.unwrap();
        room.pause("alice").await;
        assert_eq!(room.state().await, RoomState::Paused);
        assert_eq!(room.disconnected_player().await.as_deref(), Some("alice"));
        room.resume().await;
        assert_eq!(room.state().await, RoomState::Active);
        assert!(room.disconnected_player().await.is_none());
    }
}
