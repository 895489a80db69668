use clap::{Arg, ArgAction, Command};

pub fn build_cli() -> Command {
    Command::new("withlock")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Run a command while holding a PostgreSQL advisory lock")
        .override_usage("withlock [--db <URL>] <LOCK_NAME> -- <COMMAND> [ARGS]...")
        .arg(
            Arg::new("db")
                .long("db")
                .value_name("URL")
                .help("Connection string (defaults to $PG_CONNECTION_STRING)"),
        )
        .arg(
            Arg::new("lock_name")
                .value_name("LOCK_NAME")
                .help("Name of the lock to hold")
                .action(ArgAction::Append)
                .num_args(1..),
        )
        .arg(
            Arg::new("command")
                .value_name("COMMAND")
                .help("Command to run while the lock is held")
                .last(true)
                .num_args(1..)
                .allow_hyphen_values(true),
        )
}
