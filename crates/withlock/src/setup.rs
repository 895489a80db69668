//! Global setup utilities for CLI initialization

use anyhow::Result;
use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is unset; keeps the child's output clean
const DEFAULT_FILTER: &str = "warn";

/// Initialize tracing subscriber for logging
///
/// Configures the tracing subscriber with:
/// - Environment filter from `RUST_LOG` (defaults to WARN)
/// - Stderr output (to avoid mixing with the child's stdout)
///
/// # Errors
/// Returns an error if the subscriber initialization fails
pub fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {e}"))
}
