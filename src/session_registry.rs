//! The session registry: a singleton map from login id to `Session`,
//! guarding slot allocation and identifier uniqueness (spec §3, §4.5).
//!
//! The registry lock itself is `dashmap`'s internal sharded lock, held only
//! long enough to look up or insert an entry -- mutable session content is
//! guarded by each `Session`'s own lock, per the lock-order rule in spec §5.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::session::Session;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoginError {
    #[error("Name cannot be empty")]
    EmptyId,
    #[error("Client ID already in use")]
    AlreadyInUse,
    #[error("Server is full")]
    RegistryFull,
}

/// Singleton registry of logged-in sessions, keyed by their chosen id.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    max_sessions: usize,
}

impl SessionRegistry {
    pub fn new(max_sessions: usize) -> Self {
        SessionRegistry {
            sessions: DashMap::new(),
            max_sessions,
        }
    }

    /// Claim `id` for `session`. Fails if empty, already taken, or the
    /// registry is at capacity.
    pub fn login(&self, id: &str, session: Arc<Session>) -> Result<(), LoginError> {
        if id.is_empty() {
            return Err(LoginError::EmptyId);
        }
        if self.sessions.contains_key(id) {
            return Err(LoginError::AlreadyInUse);
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(LoginError::RegistryFull);
        }
        self.sessions.insert(id.to_string(), session);
        Ok(())
    }

    pub fn find(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Remove a session entirely (explicit logout, or timeout escalation
    /// marking it `Removed`).
    pub fn remove(&self, id: &str) {
        self.sessions.remove(id);
    }

    /// Snapshot of every logged-in session's id, for the heartbeat sweep.
    pub fn all_ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
