//! Mutex factory
//!
//! One factory owns one connection. Every handle it hands out shares that
//! connection, so handles for the same name are the same lock holder as far
//! as the database is concerned.

use std::sync::Arc;

use crate::{
    postgres::{PgConnector, PgSession},
    AdvisoryMutex, AdvisorySession, ConnectionGuard, Connector, LockKey, Readiness, Result,
};

/// Builds named mutex handles over one dedicated connection
#[derive(Debug)]
pub struct MutexFactory<S> {
    guard: Arc<ConnectionGuard<S>>,
}

impl<S> Clone for MutexFactory<S> {
    fn clone(&self) -> Self {
        Self {
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S: AdvisorySession> MutexFactory<S> {
    /// Open a connection through `connector` and start its handshake.
    ///
    /// Returns immediately; operations issued before the handshake completes
    /// are queued.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` when called outside a Tokio runtime.
    pub fn connect<C>(connector: C) -> Result<Self>
    where
        C: Connector<Session = S>,
    {
        ConnectionGuard::connect(connector).map(|guard| Self { guard })
    }

    /// Handle for `name`, either a lock name or a pre-derived key pair
    pub fn mutex(&self, name: impl Into<LockKey>) -> AdvisoryMutex<S> {
        AdvisoryMutex::new(name, Arc::clone(&self.guard))
    }

    /// The shared connection guard
    pub const fn guard(&self) -> &Arc<ConnectionGuard<S>> {
        &self.guard
    }

    /// Current readiness of the shared connection
    pub fn readiness(&self) -> Readiness {
        self.guard.readiness()
    }

    /// Number of lock calls in flight on the shared connection
    pub fn outstanding(&self) -> usize {
        self.guard.outstanding()
    }

    /// Close the shared connection, releasing every lock its session holds.
    pub async fn close(&self) -> Result<()> {
        self.guard.close().await
    }
}

/// Create a factory for the PostgreSQL database at `url`.
///
/// # Errors
///
/// Returns `Error::InvalidConfig` if `url` cannot be parsed or no Tokio
/// runtime is running. Handshake failures surface on the first operation.
pub fn create_mutex_factory(url: &str) -> Result<MutexFactory<PgSession>> {
    MutexFactory::connect(PgConnector::new(url)?)
}
