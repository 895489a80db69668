//! In-process advisory lock server
//!
//! Mirrors the PostgreSQL session-level advisory lock semantics without a
//! database: locks are owned by sessions, reentrant within a session
//! (depth-counted), and released when the session ends. Useful for tests and
//! for single-host coordination between tasks that each own a session.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{AdvisorySession, Connector, Error, LockFunction, LockKey, Result};

/// Identifier of one in-memory session
pub type SessionId = u64;

/// A lock currently held in the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldLock {
    /// Key being held
    pub key: LockKey,
    /// Session holding it
    pub session: SessionId,
    /// Number of unreleased acquisitions by that session
    pub depth: u32,
}

#[derive(Debug, Default)]
struct Table {
    next_session: SessionId,
    sessions: Vec<SessionId>,
    locks: HashMap<LockKey, HeldLock>,
    failures: Vec<(LockFunction, String)>,
}

#[derive(Debug, Default)]
struct Shared {
    table: Mutex<Table>,
    released: Notify,
}

impl Shared {
    fn table(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Shared advisory lock table; clones refer to the same server
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    shared: Arc<Shared>,
    connect_failure: Option<String>,
    connect_delay: Option<Duration>,
}

impl MemoryServer {
    /// Create an empty server
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every handshake through this handle fail with `message`
    #[must_use]
    pub fn failing_connect(mut self, message: impl Into<String>) -> Self {
        self.connect_failure = Some(message.into());
        self
    }

    /// Delay every handshake through this handle
    #[must_use]
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = Some(delay);
        self
    }

    /// Connection target for one new session on this server
    #[must_use]
    pub fn connector(&self) -> MemoryConnector {
        MemoryConnector {
            server: self.clone(),
        }
    }

    /// Fail the next call of `function`, from any session, with `message`
    pub fn fail_next(&self, function: LockFunction, message: impl Into<String>) {
        self.shared.table().failures.push((function, message.into()));
    }

    /// Number of sessions that have connected and not yet ended
    pub fn active_sessions(&self) -> usize {
        self.shared.table().sessions.len()
    }

    /// Check if a key is held by any session
    pub fn is_locked(&self, key: LockKey) -> bool {
        self.shared.table().locks.contains_key(&key)
    }

    /// Get the session holding a key
    pub fn holder(&self, key: LockKey) -> Option<SessionId> {
        self.shared.table().locks.get(&key).map(|held| held.session)
    }

    /// Get all held locks
    pub fn active_locks(&self) -> Vec<HeldLock> {
        self.shared.table().locks.values().cloned().collect()
    }

    fn open_session(&self) -> SessionId {
        let mut table = self.shared.table();
        table.next_session += 1;
        let id = table.next_session;
        table.sessions.push(id);
        id
    }

    fn end_session(&self, id: SessionId) {
        {
            let mut table = self.shared.table();
            table.sessions.retain(|&s| s != id);
            table.locks.retain(|_, held| held.session != id);
        }
        self.shared.released.notify_waiters();
    }

    fn take_failure(&self, function: LockFunction) -> Option<Error> {
        let mut table = self.shared.table();
        let index = table.failures.iter().position(|(f, _)| *f == function)?;
        let (_, message) = table.failures.remove(index);
        Some(Error::database(function.sql_name(), message))
    }

    /// Grant `key` to `session` if free or already held by it.
    fn grant(&self, session: SessionId, key: LockKey) -> bool {
        let mut table = self.shared.table();
        let held = table.locks.entry(key).or_insert(HeldLock {
            key,
            session,
            depth: 0,
        });
        if held.session != session {
            return false;
        }
        held.depth += 1;
        true
    }

    fn release(&self, session: SessionId, key: LockKey) -> bool {
        let mut table = self.shared.table();
        let Some(held) = table
            .locks
            .get_mut(&key)
            .filter(|held| held.session == session)
        else {
            return false;
        };
        held.depth -= 1;
        let freed = held.depth == 0;
        if freed {
            table.locks.remove(&key);
        }
        drop(table);
        if freed {
            self.shared.released.notify_waiters();
        }
        true
    }

    async fn acquire(&self, session: SessionId, key: LockKey) {
        loop {
            let released = self.shared.released.notified();
            tokio::pin!(released);
            released.as_mut().enable();
            if self.grant(session, key) {
                return;
            }
            released.await;
        }
    }
}

/// Handshake target for [`MemoryServer`]
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    server: MemoryServer,
}

#[async_trait]
impl Connector for MemoryConnector {
    type Session = MemorySession;

    async fn connect(self) -> Result<MemorySession> {
        if let Some(delay) = self.server.connect_delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.server.connect_failure {
            return Err(Error::ConnectionFailed(message.clone()));
        }
        let id = self.server.open_session();
        Ok(MemorySession {
            id,
            server: self.server,
        })
    }
}

/// One session on a [`MemoryServer`]; ends (and frees its locks) on drop
#[derive(Debug)]
pub struct MemorySession {
    id: SessionId,
    server: MemoryServer,
}

impl MemorySession {
    /// Identifier of this session
    pub const fn id(&self) -> SessionId {
        self.id
    }
}

#[async_trait]
impl AdvisorySession for MemorySession {
    async fn execute(&mut self, function: LockFunction, key: LockKey) -> Result<bool> {
        if let Some(err) = self.server.take_failure(function) {
            return Err(err);
        }
        match function {
            LockFunction::Lock => {
                self.server.acquire(self.id, key).await;
                Ok(true)
            }
            LockFunction::Unlock => Ok(self.server.release(self.id, key)),
            LockFunction::TryLock => Ok(self.server.grant(self.id, key)),
        }
    }

    async fn close(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.server.end_session(self.id);
    }
}
