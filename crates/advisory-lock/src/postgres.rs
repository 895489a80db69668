//! PostgreSQL backend using `SQLx`
//!
//! One dedicated [`PgConnection`] per connector, never pooled: advisory locks
//! belong to the session, so the connection is part of the lock holder's
//! identity.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::{
    postgres::{PgConnectOptions, PgConnection},
    ConnectOptions, Connection,
};

use crate::{AdvisorySession, Connector, Error, LockFunction, LockKey, Result};

/// Default `application_name` reported in `pg_stat_activity`
pub const DEFAULT_APPLICATION_NAME: &str = "advisory-lock";

/// Connection target for one PostgreSQL session
#[derive(Debug, Clone)]
pub struct PgConnector {
    options: PgConnectOptions,
}

impl PgConnector {
    /// Parse a connection URI such as `postgres://user@host/db`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if the URI cannot be parsed.
    pub fn new(url: &str) -> Result<Self> {
        PgConnectOptions::from_str(url)
            .map(Self::from_options)
            .map_err(|e| Error::InvalidConfig(format!("invalid connection string: {e}")))
    }

    /// Use already-built connect options
    #[must_use]
    pub fn from_options(options: PgConnectOptions) -> Self {
        Self {
            options: options.application_name(DEFAULT_APPLICATION_NAME),
        }
    }
}

#[async_trait]
impl Connector for PgConnector {
    type Session = PgSession;

    async fn connect(self) -> Result<PgSession> {
        self.options
            .connect()
            .await
            .map(|conn| PgSession { conn })
            .map_err(|e| Error::ConnectionFailed(e.to_string()))
    }
}

/// An open PostgreSQL session
#[derive(Debug)]
pub struct PgSession {
    conn: PgConnection,
}

#[async_trait]
impl AdvisorySession for PgSession {
    async fn execute(&mut self, function: LockFunction, key: LockKey) -> Result<bool> {
        let outcome = match function {
            // pg_advisory_lock returns void; reaching the row means granted.
            LockFunction::Lock => sqlx::query(function.statement())
                .bind(key.k1)
                .bind(key.k2)
                .execute(&mut self.conn)
                .await
                .map(|_| true),
            LockFunction::Unlock | LockFunction::TryLock => {
                sqlx::query_scalar::<_, bool>(function.statement())
                    .bind(key.k1)
                    .bind(key.k2)
                    .fetch_one(&mut self.conn)
                    .await
            }
        };
        outcome.map_err(|e| Error::database(function.sql_name(), e.to_string()))
    }

    async fn close(self) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| Error::database("close", e.to_string()))
    }
}
