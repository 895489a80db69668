//! Run a child process inside the advisory lock
//!
//! The child inherits stdio. The lock is released and the connection closed
//! before the exit code is reported, even if the child could not be spawned.

use advisory_lock::{create_mutex_factory, AdvisoryMutex, AdvisorySession};
use anyhow::{Context, Result};
use tokio::process::Command;

use crate::Config;

/// Exit code reported when the child has no code (killed by a signal)
const SIGNALLED_EXIT_CODE: i32 = 1;

/// Hold the lock named in `config`, run its command, and return the child's
/// exit code.
///
/// # Errors
///
/// Returns an error if the connection or any lock call fails, or if the
/// child cannot be spawned.
pub async fn run(config: &Config) -> Result<i32> {
    let factory = create_mutex_factory(&config.database_url)
        .context("Failed to set up database connection")?;
    let mutex = factory.mutex(config.lock_name.as_str());

    let outcome = run_locked(&mutex, config).await;
    let closed = factory.close().await;

    let code = outcome?;
    closed.context("Failed to close database connection")?;
    Ok(code)
}

/// Run the configured command under `mutex`.
///
/// # Errors
///
/// Returns the lock error, the spawn error, or an unlock error that replaces
/// either.
pub async fn run_locked<S: AdvisorySession>(
    mutex: &AdvisoryMutex<S>,
    config: &Config,
) -> Result<i32> {
    mutex
        .with_lock(|| async {
            println!("Lock acquired");
            println!("{}", config.command);
            spawn_and_wait(config).await
        })
        .await
}

async fn spawn_and_wait(config: &Config) -> Result<i32> {
    let status = Command::new(&config.command)
        .args(&config.args)
        .status()
        .await
        .with_context(|| format!("Failed to spawn '{}'", config.command))?;
    tracing::debug!(%status, "child exited");
    Ok(status.code().unwrap_or(SIGNALLED_EXIT_CODE))
}
