//! Session log storage.
//!
//! Mutation goes through the narrow [`SessionStore`] contract; the in-memory
//! implementation keeps one [`SessionLog`] per session identifier and forgets
//! everything on restart. A log lives as long as its cookie session: entries
//! idle longer than the session inactivity window are swept.

use crate::models::{LogEntry, SessionLog};
use async_trait::async_trait;
use dashmap::DashMap;
use service_core::error::AppError;
use std::time::{Duration, Instant};

/// Inactivity window shared with the cookie session expiry.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Keyed store of per-session logs.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Snapshot of a session's log; empty when the session has none yet.
    async fn get(&self, session_id: &str) -> Result<SessionLog, AppError>;

    /// Append an entry, keeping the log within its capacity.
    async fn append(&self, session_id: &str, entry: LogEntry) -> Result<(), AppError>;

    /// Drop logs whose session has been idle past the timeout. Returns how
    /// many were removed.
    async fn evict_idle(&self) -> Result<usize, AppError>;
}

struct StoredLog {
    log: SessionLog,
    last_touched: Instant,
}

/// Process-memory store. Each session's log is locked independently.
pub struct InMemorySessionStore {
    logs: DashMap<String, StoredLog>,
    idle_timeout: Duration,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            logs: DashMap::new(),
            idle_timeout,
        }
    }

    /// Number of sessions holding a log.
    pub fn session_count(&self) -> usize {
        self.logs.len()
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<SessionLog, AppError> {
        match self.logs.get_mut(session_id) {
            Some(mut stored) => {
                stored.last_touched = Instant::now();
                Ok(stored.log.clone())
            }
            None => Ok(SessionLog::new()),
        }
    }

    async fn append(&self, session_id: &str, entry: LogEntry) -> Result<(), AppError> {
        let mut stored = self
            .logs
            .entry(session_id.to_string())
            .or_insert_with(|| StoredLog {
                log: SessionLog::new(),
                last_touched: Instant::now(),
            });
        stored.log.push(entry);
        stored.last_touched = Instant::now();
        Ok(())
    }

    async fn evict_idle(&self) -> Result<usize, AppError> {
        let before = self.logs.len();
        let timeout = self.idle_timeout;
        self.logs
            .retain(|_, stored| stored.last_touched.elapsed() < timeout);
        Ok(before.saturating_sub(self.logs.len()))
    }
}
