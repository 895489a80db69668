//! Advisory-lock - Distributed mutex on PostgreSQL advisory locks
//!
//! This crate provides:
//! - Lock key derivation from names
//! - A readiness-gated connection guard with in-flight accounting
//! - Mutex handles (`lock`, `unlock`, `try_lock`, `with_lock`)
//! - A factory sharing one dedicated connection across handles
//! - PostgreSQL and in-memory backends
//!
//! The database owns mutual exclusion. Nothing here implements a locking
//! algorithm; the crate only sequences calls on one session.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod error;
pub mod factory;
pub mod guard;
pub mod key;
pub mod memory;
pub mod mutex;
pub mod ops;
pub mod postgres;
pub mod ready;

pub use error::{Error, Result};
pub use factory::{create_mutex_factory, MutexFactory};
pub use guard::ConnectionGuard;
pub use key::{derive_key, LockKey};
pub use memory::{MemoryConnector, MemoryServer, MemorySession};
pub use mutex::AdvisoryMutex;
pub use ops::{AdvisorySession, Connector, LockFunction};
pub use postgres::{PgConnector, PgSession};
pub use ready::{Readiness, ReadySignal};
