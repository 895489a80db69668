//! Mutex handle bound to one lock key
//!
//! A handle is just a key plus a shared [`ConnectionGuard`]. It keeps no
//! record of whether it holds the lock; the database session owns that.

use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;

use crate::{AdvisorySession, ConnectionGuard, Error, LockFunction, LockKey, Result};

/// Distributed mutex for one lock key on a shared connection
#[derive(Debug)]
pub struct AdvisoryMutex<S> {
    key: LockKey,
    guard: Arc<ConnectionGuard<S>>,
}

impl<S> Clone for AdvisoryMutex<S> {
    fn clone(&self) -> Self {
        Self {
            key: self.key,
            guard: Arc::clone(&self.guard),
        }
    }
}

impl<S: AdvisorySession> AdvisoryMutex<S> {
    /// Bind `key` to `guard`
    #[must_use]
    pub fn new(key: impl Into<LockKey>, guard: Arc<ConnectionGuard<S>>) -> Self {
        Self {
            key: key.into(),
            guard,
        }
    }

    /// Key this handle locks
    pub const fn key(&self) -> LockKey {
        self.key
    }

    /// Guard of the connection this handle runs on
    pub const fn guard(&self) -> &Arc<ConnectionGuard<S>> {
        &self.guard
    }

    /// Wait until this session holds the lock.
    ///
    /// Reentrant: a session that already holds the key is granted again
    /// immediately and must unlock once per lock.
    pub async fn lock(&self) -> Result<()> {
        self.guard
            .execute(LockFunction::Lock, self.key)
            .await
            .map(|_| ())
    }

    /// Release one level of the lock.
    ///
    /// Returns what the database reports: `false` when this session did not
    /// hold the key.
    pub async fn unlock(&self) -> Result<bool> {
        self.guard.execute(LockFunction::Unlock, self.key).await
    }

    /// Take the lock only if no other session holds it. Never waits for the
    /// lock itself.
    pub async fn try_lock(&self) -> Result<bool> {
        self.guard.execute(LockFunction::TryLock, self.key).await
    }

    /// Run `work` while holding the lock, then release it.
    ///
    /// Once the lock is held, the unlock is attempted exactly once, whatever
    /// `work` does (including panicking). Outcome precedence:
    ///
    /// - lock fails: that error, `work` never runs
    /// - unlock fails: the unlock error, replacing `work`'s result or error
    /// - otherwise: `work`'s result or error, unchanged
    ///
    /// A panic in `work` is resumed after a successful unlock.
    ///
    /// `work` is always an async closure returning a `Result`. Synchronous
    /// work or a plain value goes through an `async` block wrapping
    /// `Ok(value)`:
    ///
    /// ```no_run
    /// # async fn demo(mutex: advisory_lock::AdvisoryMutex<advisory_lock::PgSession>) {
    /// let answer = mutex
    ///     .with_lock(|| async { Ok::<_, advisory_lock::Error>(42) })
    ///     .await;
    /// # let _ = answer;
    /// # }
    /// ```
    pub async fn with_lock<F, Fut, T, E>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: From<Error>,
    {
        self.lock().await?;
        tracing::debug!(key = %self.key, "entered critical section");

        let outcome = AssertUnwindSafe(async move { work().await })
            .catch_unwind()
            .await;

        self.unlock().await?;
        tracing::debug!(key = %self.key, "left critical section");

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
