//! Per-connection session record and the operation-whitelist state machine
//! (spec §3, §4.2).

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};

use crate::codec::OpCode;

/// Outbound frame bytes queued to a connection's writer task.
pub type Outbox = mpsc::Sender<Vec<u8>>;

/// The session's position in the lobby/room/game lifecycle (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    NotLoggedIn,
    InLobby,
    InRoomWaiting,
    InGame,
}

impl GameState {
    /// The opcodes a session may send while in this state.
    pub fn allowed_ops(self) -> &'static [OpCode] {
        use OpCode::*;
        match self {
            GameState::NotLoggedIn => &[Login, Ping, Pong, ReconnectRequest, Error],
            GameState::InLobby => {
                &[CreateRoom, JoinRoom, ListRooms, Ping, Pong, ReconnectRequest, Error]
            }
            GameState::InRoomWaiting => {
                &[LeaveRoom, JoinRoom, ListRooms, Ping, Pong, ReconnectRequest, Error]
            }
            GameState::InGame => &[
                Move,
                MultiMove,
                LeaveRoom,
                ListRooms,
                Ping,
                Pong,
                ReconnectRequest,
                Error,
            ],
        }
    }

    pub fn is_allowed(self, op: OpCode) -> bool {
        self.allowed_ops().contains(&op)
    }
}

/// Transport liveness, orthogonal to `GameState` (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnState {
    Connected,
    Disconnected,
    Reconnecting,
    Timeout,
    Removed,
}

/// Accumulated protocol violations (decode failures or whitelist
/// rejections), used to drive the eager-disconnect policy (spec §4.2, §7).
#[derive(Debug, Default, Clone, Copy)]
pub struct Violations {
    pub invalid_messages: u32,
    pub unknown_ops: u32,
    pub last_violation_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Heartbeat + liveness bookkeeping, guarded by the session's own lock so
/// the heartbeat sweep never needs to hold the registry lock while
/// mutating per-session fields (spec §4.6, §5).
#[derive(Debug)]
pub struct Liveness {
    pub conn_state: ConnState,
    pub last_pong_at: Instant,
    pub disconnect_at: Option<Instant>,
    pub missed_pongs: u32,
    pub awaiting_pong: bool,
}

impl Liveness {
    fn new() -> Self {
        Liveness {
            conn_state: ConnState::Connected,
            last_pong_at: Instant::now(),
            disconnect_at: None,
            missed_pongs: 0,
            awaiting_pong: false,
        }
    }
}

/// Server-side record of one logical client (spec §3).
///
/// Outside of `liveness`, fields here are only ever touched by the handler
/// task that currently owns the session (enforced by the session registry
/// locating a session by socket identity before acting on it), so they are
/// plain fields rather than lock-guarded ones.
pub struct Session {
    pub id: Mutex<Option<String>>,
    pub outbox: Mutex<Option<Outbox>>,
    pub active: std::sync::atomic::AtomicBool,
    pub current_room: Mutex<Option<String>>,
    pub game_state: Mutex<GameState>,
    pub violations: Mutex<Violations>,
    pub liveness: Mutex<Liveness>,
}

impl Session {
    pub fn new(outbox: Outbox) -> Arc<Self> {
        Arc::new(Session {
            id: Mutex::new(None),
            outbox: Mutex::new(Some(outbox)),
            active: std::sync::atomic::AtomicBool::new(true),
            current_room: Mutex::new(None),
            game_state: Mutex::new(GameState::NotLoggedIn),
            violations: Mutex::new(Violations::default()),
            liveness: Mutex::new(Liveness::new()),
        })
    }

    pub async fn is_logged_in(&self) -> bool {
        self.id.lock().await.is_some()
    }

    pub async fn send(&self, bytes: Vec<u8>) {
        let outbox = self.outbox.lock().await;
        if let Some(tx) = outbox.as_ref() {
            if tx.try_send(bytes).is_err() {
                tracing::warn!("dropped outbound frame: writer queue full or closed");
            }
        }
    }

    pub async fn send_frame(&self, op: OpCode, data: &str) {
        match crate::codec::encode(op, data) {
            Ok(bytes) => self.send(bytes).await,
            Err(err) => tracing::warn!(%op, %err, "failed to encode outbound frame"),
        }
    }
}
