//! Server orchestration: the acceptor loop, shared registries, and the
//! background heartbeat task (spec §3, §4).

use std::sync::Arc;

use tokio::net::TcpListener;

use crate::codec::OpCode;
use crate::config::Limits;
use crate::room::Room;
use crate::room_registry::RoomRegistry;
use crate::session_registry::SessionRegistry;

mod connection;
mod handlers;
mod heartbeat;

/// Top-level server state, shared by every connection handler task and the
/// heartbeat sweep via `Arc`.
pub struct CheckersServer {
    pub sessions: SessionRegistry,
    pub rooms: RoomRegistry,
    pub limits: Limits,
}

impl CheckersServer {
    pub fn new(limits: Limits) -> Arc<Self> {
        Arc::new(CheckersServer {
            sessions: SessionRegistry::new(limits.max_sessions),
            rooms: RoomRegistry::new(limits.max_rooms),
            limits,
        })
    }

    /// Bind and accept connections until `SIGINT`/`SIGTERM` asks for
    /// graceful shutdown (spec §6).
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        let heartbeat_server = self.clone();
        tokio::spawn(async move {
            heartbeat_server.heartbeat_task().await;
        });

        loop {
            let (socket, addr) = tokio::select! {
                accepted = listener.accept() => accepted?,
                _ = shutdown_signal() => {
                    tracing::info!("shutdown signal received, no longer accepting connections");
                    return Ok(());
                }
            };
            tracing::info!(%addr, "accepted connection");

            let server = self.clone();
            tokio::spawn(async move {
                connection::handle_connection(server, socket, addr).await;
            });
        }
    }

    /// Send `op`/`data` to every current member of `room` (spec §4.4
    /// `broadcast`).
    pub async fn broadcast_room(&self, room: &Arc<Room>, op: OpCode, data: &str) {
        for member_id in room.members().await {
            if let Some(member) = self.sessions.find(&member_id) {
                member.send_frame(op, data).await;
            }
        }
    }
}

/// Resolves on `SIGINT` (any platform) or `SIGTERM` (unix only).
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = terminate.recv() => {}
        }
    }

    #[cfg(not(unix))]
    {
        let _ = ctrl_c.await;
    }
}
