//! One-shot readiness signal
//!
//! Starts in `Connecting`, settles exactly once to `Ready` or `Failed`.
//! Waiters that arrive while connecting are queued and released in insertion
//! order at the moment the outcome is decided; later waiters never queue.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use crate::{Error, Result};

/// Observable readiness of a guarded connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// Handshake still in progress
    Connecting,
    /// Handshake succeeded
    Ready,
    /// Handshake failed; terminal
    Failed(Error),
}

type Waiter = oneshot::Sender<Result<()>>;

#[derive(Debug)]
enum State {
    Connecting(Vec<Waiter>),
    Ready,
    Failed(Error),
}

/// Single-assignment completion signal observed by any number of waiters
#[derive(Debug)]
pub struct ReadySignal {
    state: Mutex<State>,
}

impl Default for ReadySignal {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadySignal {
    /// Create an unsettled signal
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: Mutex::new(State::Connecting(Vec::new())),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Current readiness
    pub fn readiness(&self) -> Readiness {
        match &*self.state() {
            State::Connecting(_) => Readiness::Connecting,
            State::Ready => Readiness::Ready,
            State::Failed(err) => Readiness::Failed(err.clone()),
        }
    }

    /// Number of waiters currently queued
    pub fn pending(&self) -> usize {
        match &*self.state() {
            State::Connecting(queue) => queue.len(),
            State::Ready | State::Failed(_) => 0,
        }
    }

    /// Wait until the signal settles.
    ///
    /// Resolves immediately once settled. If the settling side is dropped
    /// without deciding, waiters see [`Error::ConnectionClosed`].
    pub async fn wait(&self) -> Result<()> {
        let receiver = {
            let mut state = self.state();
            match &mut *state {
                State::Ready => return Ok(()),
                State::Failed(err) => return Err(err.clone()),
                State::Connecting(queue) => {
                    let (tx, rx) = oneshot::channel();
                    queue.push(tx);
                    rx
                }
            }
        };
        tracing::debug!("waiting for connection");
        receiver.await.unwrap_or(Err(Error::ConnectionClosed))
    }

    /// Settle the signal and drain the queue in insertion order.
    ///
    /// Returns `false` if the signal had already settled; the first outcome
    /// always wins.
    pub fn settle(&self, outcome: Result<()>) -> bool {
        let next = match &outcome {
            Ok(()) => State::Ready,
            Err(err) => State::Failed(err.clone()),
        };
        let queue = {
            let mut state = self.state();
            if !matches!(*state, State::Connecting(_)) {
                return false;
            }
            match std::mem::replace(&mut *state, next) {
                State::Connecting(queue) => queue,
                State::Ready | State::Failed(_) => Vec::new(),
            }
        };
        for waiter in queue {
            // A waiter whose caller went away is simply skipped.
            let _ = waiter.send(outcome.clone());
        }
        true
    }
}
