#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::too_many_arguments
)]

//! # Checkers Server
//!
//! A stateful TCP game server hosting two-player checkers matches over a
//! framed line protocol, with a per-connection state machine, a heartbeat
//! that detects dead peers, and pause/reconnect support for a bounded
//! grace window.

/// Checkers board rules: layout, move validation/application, win check.
pub mod board;

/// Wire framing: `DENTCP|OP|LEN|DATA\n` encode/decode.
pub mod codec;

/// Server limits and timing configuration.
pub mod config;

/// Structured logging configuration.
pub mod logging;

/// A single two-seat game room and its lifecycle.
pub mod room;

/// The room registry.
pub mod room_registry;

/// Main server orchestration: acceptor, connection handler, heartbeat.
pub mod server;

/// Per-connection session record and the operation-whitelist state machine.
pub mod session;

/// The session registry.
pub mod session_registry;
