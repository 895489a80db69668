//! Configuration resolution for withlock
//!
//! The connection string comes from `--db`, falling back to the
//! `PG_CONNECTION_STRING` environment variable.

use anyhow::{bail, Result};
use clap::ArgMatches;

/// Environment variable holding the default connection string
pub const DATABASE_URL_ENV: &str = "PG_CONNECTION_STRING";

/// Resolved invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Connection string for the lock database
    pub database_url: String,
    /// Name of the lock to hold
    pub lock_name: String,
    /// Program to run inside the lock
    pub command: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
}

impl Config {
    /// Build a config from parsed arguments and the environment value.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No lock name was given, or more than one
    /// - No command follows `--`
    /// - Neither `--db` nor the environment provides a connection string
    pub fn from_matches(matches: &ArgMatches, env_url: Option<String>) -> Result<Self> {
        let names: Vec<&String> = matches
            .get_many::<String>("lock_name")
            .map(Iterator::collect)
            .unwrap_or_default();
        let (lock_name, extra) = match names.split_first() {
            Some((first, rest)) => ((*first).clone(), rest),
            None => bail!("No <lockName> specified"),
        };
        if !extra.is_empty() {
            let extra: Vec<&str> = extra.iter().map(|s| s.as_str()).collect();
            bail!("Unknown arguments: {}", extra.join(","));
        }

        let mut command_line = matches
            .get_many::<String>("command")
            .map(|values| values.cloned().collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter();
        let Some(command) = command_line.next() else {
            bail!("No <command> specified");
        };

        let database_url = resolve_database_url(matches.get_one::<String>("db"), env_url)?;

        Ok(Self {
            database_url,
            lock_name,
            command,
            args: command_line.collect(),
        })
    }
}

/// Pick the connection string: explicit flag first, then the environment.
///
/// # Errors
///
/// Returns an error when neither source provides one.
pub fn resolve_database_url(flag: Option<&String>, env_url: Option<String>) -> Result<String> {
    match (flag, env_url) {
        (Some(url), _) => Ok(url.clone()),
        (None, Some(url)) => Ok(url),
        (None, None) => bail!("{DATABASE_URL_ENV} not found and no --db argument passed"),
    }
}
