//! Per-connection handler: frame reassembly, decode, whitelist, dispatch,
//! and transport-failure teardown (spec §4.5, §4.7).

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;

use crate::codec::{self, OpCode, BUFFER_SIZE};
use crate::session::{ConnState, Outbox, Session};

use super::handlers::{self, Outcome};
use super::CheckersServer;

pub async fn handle_connection(server: Arc<CheckersServer>, socket: TcpStream, addr: SocketAddr) {
    let (mut read_half, write_half) = socket.into_split();
    let (tx, rx): (Outbox, mpsc::Receiver<Vec<u8>>) =
        mpsc::channel(server.limits.outbox_capacity);
    tokio::spawn(writer_task(write_half, rx));

    let mut session = Session::new(tx);
    let mut buf: Vec<u8> = Vec::with_capacity(BUFFER_SIZE);
    let mut read_buf = [0u8; 4096];

    loop {
        let n = match read_half.read(&mut read_buf).await {
            Ok(0) => {
                tracing::debug!(%addr, "connection closed by peer");
                break;
            }
            Ok(n) => n,
            Err(err) => {
                tracing::debug!(%addr, %err, "read error");
                break;
            }
        };
        buf.extend_from_slice(&read_buf[..n]);

        if buf.len() > 2 * BUFFER_SIZE {
            tracing::warn!(%addr, "frame reassembly buffer overflow");
            session
                .send_frame(OpCode::Error, "Buffer overflow")
                .await;
            break;
        }

        loop {
            let Some(pos) = buf.iter().position(|&b| b == b'\n') else {
                break;
            };
            let line: Vec<u8> = buf.drain(..=pos).collect();
            let line = &line[..line.len() - 1];

            match process_line(&server, &mut session, line).await {
                LineOutcome::Continue => {}
                LineOutcome::Close => return,
            }
        }
    }

    handle_disconnect(&server, &session).await;
}

enum LineOutcome {
    Continue,
    Close,
}

async fn process_line(
    server: &Arc<CheckersServer>,
    session: &mut Arc<Session>,
    line: &[u8],
) -> LineOutcome {
    let frame = match codec::decode(line) {
        Ok(frame) => frame,
        Err(err) => {
            return record_violation(server, session, &err.to_string(), true).await;
        }
    };

    let state = *session.game_state.lock().await;
    if !state.is_allowed(frame.op) {
        tracing::warn!(
            op = %frame.op,
            ?state,
            allowed = ?state.allowed_ops(),
            "operation rejected by whitelist"
        );
        return record_violation(
            server,
            session,
            "Operation not allowed in current state",
            false,
        )
        .await;
    }

    match handlers::dispatch(server, session, frame.op, &frame.data).await {
        Outcome::Continue => LineOutcome::Continue,
        Outcome::Switch(target) => {
            *session = target;
            LineOutcome::Continue
        }
    }
}

/// Record a decode failure (`invalid_messages`) or whitelist rejection
/// (`unknown_ops`) and close the connection once `max_violations` is
/// reached (spec §4.2, §4.5; default `MaxViolations = 1`).
async fn record_violation(
    server: &Arc<CheckersServer>,
    session: &Arc<Session>,
    reason: &str,
    decode_failure: bool,
) -> LineOutcome {
    let count = {
        let mut violations = session.violations.lock().await;
        if decode_failure {
            violations.invalid_messages += 1;
        } else {
            violations.unknown_ops += 1;
        }
        violations.last_violation_at = Some(chrono::Utc::now());
        violations.invalid_messages + violations.unknown_ops
    };

    if count < server.limits.max_violations {
        session.send_frame(OpCode::Error, reason).await;
        return LineOutcome::Continue;
    }

    session.send_frame(OpCode::Error, reason).await;
    tracing::info!(reason, count, "protocol violation, closing connection");
    LineOutcome::Close
}

async fn writer_task(
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut rx: mpsc::Receiver<Vec<u8>>,
) {
    while let Some(bytes) = rx.recv().await {
        if write_half.write_all(&bytes).await.is_err() {
            break;
        }
    }
    let _ = write_half.shutdown().await;
}

/// Transport failure for a live connection (spec §4.7). Anonymous sessions
/// are simply dropped (they were never inserted into the registry);
/// logged-in sessions are preserved in a `Disconnected` state so they may
/// reconnect within `LongDisconnect`.
async fn handle_disconnect(server: &Arc<CheckersServer>, session: &Arc<Session>) {
    let Some(id) = session.id.lock().await.clone() else {
        return;
    };

    {
        let mut liveness = session.liveness.lock().await;
        liveness.conn_state = ConnState::Disconnected;
        liveness.disconnect_at = Some(Instant::now());
    }
    *session.outbox.lock().await = None;
    session
        .active
        .store(false, std::sync::atomic::Ordering::SeqCst);

    let room_name = session.current_room.lock().await.clone();
    let Some(room_name) = room_name else {
        tracing::info!(id, "session disconnected in lobby, preserved for reconnect");
        return;
    };

    tracing::info!(id, room = %room_name, "session disconnected, pausing or notifying room");
    server.pause_or_notify_room(&id, &room_name).await;
}
