//! The heartbeat sweep: PING issuance, missed-pong accounting, and the
//! disconnect/timeout escalation paths (spec §4.6, §4.7).

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use crate::codec::OpCode;
use crate::room::RoomState;
use crate::session::ConnState;

use super::CheckersServer;

impl CheckersServer {
    /// Runs for the lifetime of the process on cadence `PingInterval`.
    ///
    /// Each tick is snapshot-then-act: per-session state transitions that
    /// only touch that session's own lock happen inline; anything that
    /// needs to reach into a room (pausing it, escalating a forfeit) is
    /// collected and executed after the per-session pass completes, so no
    /// session lock is ever held while a room lock is acquired.
    pub(super) async fn heartbeat_task(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.limits.ping_interval);

        loop {
            interval.tick().await;

            let mut to_pause: Vec<(String, String)> = Vec::new();
            let mut to_escalate: Vec<String> = Vec::new();

            for id in self.sessions.all_ids() {
                let Some(session) = self.sessions.find(&id) else {
                    continue;
                };
                let now = Instant::now();
                let mut liveness = session.liveness.lock().await;

                match liveness.conn_state {
                    ConnState::Reconnecting | ConnState::Removed => continue,
                    ConnState::Connected => {
                        if !liveness.awaiting_pong {
                            liveness.awaiting_pong = true;
                            drop(liveness);
                            session.send_frame(OpCode::Ping, "").await;
                            continue;
                        }
                        if now.duration_since(liveness.last_pong_at) > self.limits.pong_timeout {
                            liveness.awaiting_pong = false;
                            liveness.missed_pongs += 1;
                            if liveness.missed_pongs >= self.limits.max_missed_pongs {
                                liveness.conn_state = ConnState::Disconnected;
                                liveness.disconnect_at = Some(now);
                                drop(liveness);
                                *session.outbox.lock().await = None;
                                session.active.store(false, Ordering::SeqCst);
                                tracing::info!(id, "missed too many pongs, marking disconnected");
                                if let Some(room_name) = session.current_room.lock().await.clone()
                                {
                                    to_pause.push((id.clone(), room_name));
                                }
                            }
                        }
                    }
                    ConnState::Disconnected => {
                        if let Some(disconnect_at) = liveness.disconnect_at {
                            if now.duration_since(disconnect_at) > self.limits.long_disconnect {
                                liveness.conn_state = ConnState::Timeout;
                                drop(liveness);
                                to_escalate.push(id.clone());
                            }
                        }
                    }
                    ConnState::Timeout => {}
                }
            }

            for (id, room_name) in to_pause {
                self.pause_or_notify_room(&id, &room_name).await;
            }
            for id in to_escalate {
                self.escalate_long_disconnect(&id).await;
            }

            // Sweep paused rooms independently: a room can sit Paused past
            // `LongDisconnect` even if its own disconnect bookkeeping
            // already ran (e.g. the session was removed by another path).
            for room_name in self.rooms.all_names() {
                let Some(room) = self.rooms.find(&room_name) else {
                    continue;
                };
                if room.state().await != RoomState::Paused {
                    continue;
                }
                let Some(elapsed) = room.paused_elapsed().await else {
                    continue;
                };
                if elapsed > self.limits.long_disconnect {
                    if let Some(disconnected_id) = room.disconnected_player().await {
                        self.escalate_long_disconnect(&disconnected_id).await;
                    }
                }
            }
        }
    }

    /// Pause an active room (or just notify, if still waiting) when its
    /// occupant's connection drops -- shared by the connection handler's
    /// `recv` failure path and the heartbeat's missed-pong path.
    pub(crate) async fn pause_or_notify_room(&self, id: &str, room_name: &str) {
        let Some(room) = self.rooms.find(room_name) else {
            return;
        };
        match room.state().await {
            RoomState::Active => {
                room.pause(id).await;
                if let Some(opponent_id) = room.other_member(id).await {
                    if let Some(opponent) = self.sessions.find(&opponent_id) {
                        opponent
                            .send_frame(OpCode::PlayerDisconnected, &format!("{room_name},{id}"))
                            .await;
                        opponent.send_frame(OpCode::GamePaused, room_name).await;
                    }
                }
            }
            RoomState::Waiting => {
                if let Some(opponent_id) = room.other_member(id).await {
                    if let Some(opponent) = self.sessions.find(&opponent_id) {
                        opponent.send_frame(OpCode::PlayerDisconnected, id).await;
                    }
                }
            }
            RoomState::Paused | RoomState::Finished => {}
        }
    }

    /// A session has been disconnected longer than `LongDisconnect`
    /// (spec §4.7). If it held a room, the opponent wins by forfeit and
    /// the room is destroyed; either way the session is removed.
    ///
    /// The caller snapshots `Timeout` and defers this call until after the
    /// per-session pass, so a reconnect may have already promoted the
    /// session back to `Connected`/`Reconnecting` by the time this runs.
    /// Re-check the precondition here and skip entirely if it no longer
    /// holds (spec §4.6 step 2).
    pub(crate) async fn escalate_long_disconnect(&self, id: &str) {
        let Some(session) = self.sessions.find(id) else {
            return;
        };
        if session.liveness.lock().await.conn_state != ConnState::Timeout {
            tracing::debug!(id, "long-disconnect escalation skipped, session reconnected");
            return;
        }
        let current_room = session.current_room.lock().await.clone();

        if let Some(room_name) = current_room {
            if let Some(room) = self.rooms.find(&room_name) {
                if let Some(opponent_id) = room.other_member(id).await {
                    room.finish().await;
                    if let Some(opponent) = self.sessions.find(&opponent_id) {
                        *opponent.current_room.lock().await = None;
                        *opponent.game_state.lock().await = crate::session::GameState::InLobby;
                        opponent
                            .send_frame(
                                OpCode::GameEnd,
                                &format!("{opponent_id},opponent_timeout"),
                            )
                            .await;
                    }
                }
                self.rooms.remove(&room_name);
            }
        }

        tracing::info!(id, "session removed after long disconnect");
        self.sessions.remove(id);
    }
}
