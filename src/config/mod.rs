//! Server limits and timing configuration.
//!
//! There is no config file or environment-variable layer here (spec.md's
//! Non-goals: "no configuration file, no environment variable overrides").
//! Everything is a `Limits` value built from code defaults and optionally
//! overridden by `main`'s CLI arguments before the server is constructed.

use std::time::Duration;

/// Tunable limits and timings (spec §2.3, §4.6).
#[derive(Debug, Clone)]
pub struct Limits {
    /// Maximum number of concurrently logged-in sessions.
    pub max_sessions: usize,
    /// Maximum number of concurrently open rooms.
    pub max_rooms: usize,
    /// How often the heartbeat sweep issues a `PING` to idle sessions.
    pub ping_interval: Duration,
    /// How long a session has to answer a `PING` with `PONG` before it
    /// counts as a missed pong.
    pub pong_timeout: Duration,
    /// Consecutive missed pongs before a session is marked `Disconnected`.
    pub max_missed_pongs: u32,
    /// How long a paused room may wait for its absent player to reconnect
    /// before the game is forfeited.
    pub long_disconnect: Duration,
    /// Protocol violations (decode failures, whitelist rejections) a
    /// session may accumulate before eager disconnect.
    pub max_violations: u32,
    /// Capacity of each connection's outbound frame channel.
    pub outbox_capacity: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_sessions: 1000,
            max_rooms: 1000,
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(3),
            max_missed_pongs: 3,
            long_disconnect: Duration::from_secs(80),
            max_violations: 1,
            outbox_capacity: 64,
        }
    }
}
