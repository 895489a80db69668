//! withlock - Run a command while holding a PostgreSQL advisory lock
//!
//! Connects, takes the named lock, runs the command with inherited stdio,
//! releases the lock and exits with the command's exit code.

use std::process;

use withlock::{cli::build_cli, config::DATABASE_URL_ENV, runner, setup, Config};

#[tokio::main]
async fn main() {
    let code = match run().await {
        Ok(code) => code,
        Err(err) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Error: {err:#}");
            }
            1
        }
    };

    #[allow(clippy::exit)]
    process::exit(code);
}

async fn run() -> anyhow::Result<i32> {
    setup::init_tracing()?;
    let matches = build_cli().get_matches();
    let config = Config::from_matches(&matches, std::env::var(DATABASE_URL_ENV).ok())?;
    runner::run(&config).await
}
