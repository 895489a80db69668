//! Withlock - run a command inside a PostgreSQL advisory lock
//!
//! Thin CLI over the `advisory-lock` crate.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod runner;
pub mod setup;

pub use config::Config;
