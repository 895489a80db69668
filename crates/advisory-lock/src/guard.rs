//! Connection guard
//!
//! Owns one dedicated session and mediates every call made on it:
//!
//! - Calls issued before the handshake completes are queued on a
//!   [`ReadySignal`] and released in order once it settles.
//! - A handshake failure is permanent: queued and future calls all fail with
//!   the captured error.
//! - Every call in flight, including the handshake itself, is counted so that
//!   the surrounding runtime can tell when the connection is idle.
//!
//! The guard does not serialise callers itself. The session sits behind an
//! async mutex because a single connection carries one request at a time.

use std::{
    future::Future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use tokio::sync::{Mutex, Notify};

use crate::{
    ready::{Readiness, ReadySignal},
    AdvisorySession, Connector, Error, LockFunction, LockKey, Result,
};

/// Readiness-gated access to one database session
#[derive(Debug)]
pub struct ConnectionGuard<S> {
    ready: ReadySignal,
    session: Mutex<SessionSlot<S>>,
    outstanding: AtomicUsize,
    idle: Notify,
}

#[derive(Debug)]
enum SessionSlot<S> {
    Pending,
    Open(S),
    Closed,
}

impl<S: AdvisorySession> ConnectionGuard<S> {
    /// Create a guard and start the handshake on the current Tokio runtime.
    ///
    /// The handshake starts exactly once per guard; this is the only way to
    /// construct one.
    pub fn connect<C>(connector: C) -> Result<Arc<Self>>
    where
        C: Connector<Session = S>,
    {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::InvalidConfig(format!("no Tokio runtime available: {e}")))?;

        let guard = Arc::new(Self {
            ready: ReadySignal::new(),
            session: Mutex::new(SessionSlot::Pending),
            outstanding: AtomicUsize::new(0),
            idle: Notify::new(),
        });

        tracing::debug!("connecting");
        runtime.spawn(Handshake(Arc::clone(&guard)).run(connector));

        Ok(guard)
    }

    async fn finish_handshake(&self, outcome: Result<S>) {
        match outcome {
            Ok(session) => {
                {
                    let mut slot = self.session.lock().await;
                    *slot = SessionSlot::Open(session);
                }
                tracing::debug!("connected");
                self.ready.settle(Ok(()));
            }
            Err(err) => {
                tracing::warn!("connection error: {err}");
                let err = match err {
                    Error::ConnectionFailed(_) => err,
                    other => Error::ConnectionFailed(other.to_string()),
                };
                self.ready.settle(Err(err));
            }
        }
    }

    /// Wait until the handshake has settled.
    pub async fn await_ready(&self) -> Result<()> {
        self.ready.wait().await
    }

    /// Current readiness of the connection
    pub fn readiness(&self) -> Readiness {
        self.ready.readiness()
    }

    /// Run `operation`, counting it as outstanding until it settles.
    ///
    /// The count is decremented exactly once whether the operation succeeds,
    /// fails, or is dropped before completion.
    pub async fn track<F, T>(&self, operation: F) -> T
    where
        F: Future<Output = T>,
    {
        let _ticket = Ticket::issue(self);
        operation.await
    }

    /// Number of calls currently in flight (including the handshake)
    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Whether no lock work is in flight
    pub fn is_idle(&self) -> bool {
        self.outstanding() == 0
    }

    /// Wait until no lock work is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Issue one advisory lock call once the connection is ready.
    pub async fn execute(&self, function: LockFunction, key: LockKey) -> Result<bool> {
        self.await_ready().await?;
        self.track(async {
            let mut slot = self.session.lock().await;
            let SessionSlot::Open(session) = &mut *slot else {
                return Err(Error::ConnectionClosed);
            };
            tracing::debug!("query: {}", function.describe(key));
            session.execute(function, key).await.inspect_err(|err| {
                tracing::warn!("{err}");
            })
        })
        .await
    }

    /// Close the session, releasing every advisory lock it holds.
    ///
    /// Waits for the handshake and for any round trip currently holding the
    /// connection. Closing twice, or closing a guard whose handshake failed,
    /// is a no-op.
    pub async fn close(&self) -> Result<()> {
        if self.await_ready().await.is_err() {
            return Ok(());
        }
        let session = {
            let mut slot = self.session.lock().await;
            match std::mem::replace(&mut *slot, SessionSlot::Closed) {
                SessionSlot::Open(session) => session,
                SessionSlot::Pending | SessionSlot::Closed => return Ok(()),
            }
        };
        tracing::debug!("closing connection");
        self.track(session.close()).await
    }
}

/// The spawned handshake.
///
/// Settles the signal with [`Error::ConnectionClosed`] if the task is dropped
/// or unwinds before deciding, so queued callers are never stranded.
struct Handshake<S>(Arc<ConnectionGuard<S>>);

impl<S: AdvisorySession> Handshake<S> {
    async fn run<C>(self, connector: C)
    where
        C: Connector<Session = S>,
    {
        let outcome = self.0.track(connector.connect()).await;
        self.0.finish_handshake(outcome).await;
    }
}

impl<S> Drop for Handshake<S> {
    fn drop(&mut self) {
        if self.0.ready.settle(Err(Error::ConnectionClosed)) {
            tracing::warn!("handshake task ended before connecting");
        }
    }
}

/// Outstanding-operation ticket; returns its count on drop
struct Ticket<'a> {
    outstanding: &'a AtomicUsize,
    idle: &'a Notify,
}

impl<'a> Ticket<'a> {
    fn issue<S>(guard: &'a ConnectionGuard<S>) -> Self {
        guard.outstanding.fetch_add(1, Ordering::SeqCst);
        Self {
            outstanding: &guard.outstanding,
            idle: &guard.idle,
        }
    }
}

impl Drop for Ticket<'_> {
    fn drop(&mut self) {
        if self.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.idle.notify_waiters();
        }
    }
}
