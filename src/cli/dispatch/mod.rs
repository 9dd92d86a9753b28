//! Map parsed arguments to the action the binary runs.

use crate::cli::actions::{login, server, Action};
use crate::cli::commands;
use anyhow::{anyhow, Result};

/// # Errors
/// Returns an error if no subcommand was given or its arguments are invalid.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    match matches.subcommand() {
        Some((commands::server::NAME, sub)) => {
            let options = commands::server::Options::parse(sub)?;
            Ok(Action::Server(server::Args::from(options)))
        }
        Some((commands::login::NAME, sub)) => {
            let options = commands::login::Options::parse(sub);
            Ok(Action::Login(login::Args {
                url: options.url,
                session_file: options.session_file,
            }))
        }
        Some((name, _)) => Err(anyhow!("unknown subcommand: {name}")),
        None => Err(anyhow!("missing subcommand")),
    }
}
