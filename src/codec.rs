//! Wire framing for the `DENTCP|OP|LEN|DATA\n` protocol (spec §4.1).
//!
//! A frame is one `\n`-terminated line. The emitter pads `OP` to two digits
//! and `LEN` to four, but the decoder accepts any digit width in either
//! field -- only the emitted form is fixed-width.

use std::fmt;
use thiserror::Error;

/// Fixed literal that opens every frame.
pub const PREFIX: &str = "DENTCP";

/// Maximum total frame length, including prefix, separators, and data.
pub const MAX_MESSAGE: usize = 8192;

/// Maximum payload length: `MAX_MESSAGE` minus the prefix and the three
/// `|` separators plus the two-digit op and four-digit len fields (7 bytes).
pub const MAX_DATA: usize = MAX_MESSAGE - PREFIX.len() - 7;

/// Size of the per-connection frame reassembly buffer; a single
/// accumulated frame exceeding twice this is a `BufferOverflow`.
pub const BUFFER_SIZE: usize = 8192;

/// Closed set of protocol operation codes (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCode {
    Login,
    LoginOk,
    LoginFail,
    CreateRoom,
    JoinRoom,
    RoomJoined,
    RoomFull,
    RoomFail,
    RoomCreated,
    LeaveRoom,
    RoomLeft,
    ListRooms,
    RoomsList,
    GameStart,
    Move,
    MultiMove,
    InvalidMove,
    GameState,
    GameEnd,
    GamePaused,
    GameResumed,
    Ping,
    Pong,
    PlayerDisconnected,
    PlayerReconnecting,
    PlayerReconnected,
    ReconnectRequest,
    ReconnectOk,
    ReconnectFail,
    Error,
}

impl OpCode {
    /// Numeric wire value for this opcode.
    pub const fn code(self) -> u16 {
        match self {
            OpCode::Login => 1,
            OpCode::LoginOk => 2,
            OpCode::LoginFail => 3,
            OpCode::CreateRoom => 4,
            OpCode::JoinRoom => 5,
            OpCode::RoomJoined => 6,
            OpCode::RoomFull => 7,
            OpCode::RoomFail => 8,
            OpCode::GameStart => 9,
            OpCode::Move => 10,
            OpCode::InvalidMove => 11,
            OpCode::GameState => 12,
            OpCode::GameEnd => 13,
            OpCode::LeaveRoom => 14,
            OpCode::RoomLeft => 15,
            OpCode::Ping => 16,
            OpCode::Pong => 17,
            OpCode::ListRooms => 18,
            OpCode::RoomsList => 19,
            OpCode::RoomCreated => 20,
            OpCode::MultiMove => 21,
            OpCode::PlayerDisconnected => 22,
            OpCode::PlayerReconnecting => 23,
            OpCode::PlayerReconnected => 24,
            OpCode::ReconnectRequest => 25,
            OpCode::ReconnectOk => 26,
            OpCode::ReconnectFail => 27,
            OpCode::GamePaused => 28,
            OpCode::GameResumed => 29,
            OpCode::Error => 500,
        }
    }

    /// Resolve a numeric wire value into an `OpCode`, rejecting anything
    /// outside the closed set (spec §4.1: unknown values are a violation).
    pub fn from_code(code: u16) -> Option<Self> {
        use OpCode::*;
        Some(match code {
            1 => Login,
            2 => LoginOk,
            3 => LoginFail,
            4 => CreateRoom,
            5 => JoinRoom,
            6 => RoomJoined,
            7 => RoomFull,
            8 => RoomFail,
            9 => GameStart,
            10 => Move,
            11 => InvalidMove,
            12 => GameState,
            13 => GameEnd,
            14 => LeaveRoom,
            15 => RoomLeft,
            16 => Ping,
            17 => Pong,
            18 => ListRooms,
            19 => RoomsList,
            20 => RoomCreated,
            21 => MultiMove,
            22 => PlayerDisconnected,
            23 => PlayerReconnecting,
            24 => PlayerReconnected,
            25 => ReconnectRequest,
            26 => ReconnectOk,
            27 => ReconnectFail,
            28 => GamePaused,
            29 => GameResumed,
            500 => Error,
            _ => return None,
        })
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

/// A decoded wire frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub op: OpCode,
    pub data: String,
}

/// Reasons a frame was rejected, each mapped to a disconnect policy by the
/// caller (spec §4.1, §7).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("invalid message prefix")]
    InvalidPrefix,
    #[error("invalid message format")]
    InvalidFormat,
    #[error("invalid operation code")]
    InvalidOpcode,
    #[error("invalid length field")]
    InvalidLength,
    #[error("data length mismatch")]
    DataMismatch,
    #[error("buffer overflow attempt")]
    BufferOverflow,
    #[error("too many protocol violations")]
    TooManyViolations,
    #[error("suspicious activity detected")]
    SuspiciousActivity,
}

/// Decode exactly one frame from `line` (the bytes of a single line, with
/// the trailing `\n` already stripped by the caller's frame reassembly).
pub fn decode(line: &[u8]) -> Result<Frame, DecodeError> {
    if line.len() > 2 * BUFFER_SIZE {
        return Err(DecodeError::BufferOverflow);
    }

    let text = std::str::from_utf8(line).map_err(|_| DecodeError::InvalidFormat)?;

    let rest = text
        .strip_prefix(PREFIX)
        .ok_or(DecodeError::InvalidPrefix)?;
    let rest = rest.strip_prefix('|').ok_or(DecodeError::InvalidFormat)?;

    let (op_field, rest) = rest.split_once('|').ok_or(DecodeError::InvalidFormat)?;
    if op_field.is_empty() || !is_numeric(op_field) {
        return Err(if op_field.is_empty() {
            DecodeError::InvalidFormat
        } else {
            DecodeError::InvalidOpcode
        });
    }
    let op_value: u16 = op_field.parse().map_err(|_| DecodeError::InvalidOpcode)?;
    let op = OpCode::from_code(op_value).ok_or(DecodeError::InvalidOpcode)?;

    let (len_field, data) = rest.split_once('|').ok_or(DecodeError::InvalidFormat)?;
    if len_field.is_empty() || !is_numeric(len_field) {
        return Err(DecodeError::InvalidLength);
    }
    let declared_len: usize = len_field.parse().map_err(|_| DecodeError::InvalidLength)?;
    if declared_len > MAX_DATA {
        return Err(DecodeError::InvalidLength);
    }

    if data.len() > MAX_DATA {
        return Err(DecodeError::BufferOverflow);
    }

    if declared_len != data.len() {
        return Err(DecodeError::DataMismatch);
    }

    Ok(Frame {
        op,
        data: data.to_string(),
    })
}

fn is_numeric(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

/// Encode a frame: `DENTCP|%02d|%04d|DATA\n`.
///
/// `data` must not contain `\n`; callers guarantee this (payloads are
/// CSV-like, JSON, or empty), but it is checked defensively here.
pub fn encode(op: OpCode, data: &str) -> Result<Vec<u8>, DecodeError> {
    if data.contains('\n') {
        return Err(DecodeError::InvalidFormat);
    }
    if data.len() > MAX_DATA {
        return Err(DecodeError::BufferOverflow);
    }
    let line = format!("{PREFIX}|{:02}|{:04}|{data}\n", op.code(), data.len());
    Ok(line.into_bytes())
}
