//! Primitive advisory lock operations and the backend seam
//!
//! A backend provides a [`Connector`] that performs the handshake and yields
//! one [`AdvisorySession`]. Each session call is a single round trip; nothing
//! here retries.

use async_trait::async_trait;
use strum::{EnumIter, IntoStaticStr};

use crate::{LockKey, Result};

/// The three advisory lock primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, IntoStaticStr)]
pub enum LockFunction {
    /// Block until the session holds the lock (reentrant per session)
    #[strum(serialize = "pg_advisory_lock")]
    Lock,
    /// Release one level of the lock held by this session
    #[strum(serialize = "pg_advisory_unlock")]
    Unlock,
    /// Take the lock only if it is free right now
    #[strum(serialize = "pg_try_advisory_lock")]
    TryLock,
}

impl LockFunction {
    /// SQL function name, e.g. `pg_advisory_lock`
    #[must_use]
    pub fn sql_name(self) -> &'static str {
        self.into()
    }

    /// Parameterised statement issuing this function
    #[must_use]
    pub const fn statement(self) -> &'static str {
        match self {
            Self::Lock => "SELECT pg_advisory_lock($1, $2)",
            Self::Unlock => "SELECT pg_advisory_unlock($1, $2)",
            Self::TryLock => "SELECT pg_try_advisory_lock($1, $2)",
        }
    }

    /// The statement with the key inlined, for logging
    #[must_use]
    pub fn describe(self, key: LockKey) -> String {
        format!("SELECT {}({}, {})", self.sql_name(), key.k1, key.k2)
    }
}

/// One dedicated database session able to issue advisory lock calls
#[async_trait]
pub trait AdvisorySession: Send + Sized + 'static {
    /// Issue `function` for `key` as a single round trip.
    ///
    /// Returns `true` for a granted `Lock`, the grant flag for `TryLock`, and
    /// whatever the database reports for `Unlock`.
    async fn execute(&mut self, function: LockFunction, key: LockKey) -> Result<bool>;

    /// Terminate the session, releasing every advisory lock it holds.
    async fn close(self) -> Result<()>;
}

/// Connection target able to open one session
#[async_trait]
pub trait Connector: Send + Sized + 'static {
    /// Session type produced by the handshake
    type Session: AdvisorySession;

    /// Perform the handshake.
    async fn connect(self) -> Result<Self::Session>;
}
