//! `qrgate login` arguments.

use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;

pub const NAME: &str = "login";

pub const ARG_URL: &str = "url";
pub const ARG_SESSION_FILE: &str = "session-file";

const DEFAULT_URL: &str = "http://localhost:8080";

#[must_use]
pub fn subcommand() -> Command {
    Command::new(NAME)
        .about("Sign in against a running server from the terminal")
        .arg(
            Arg::new(ARG_URL)
                .short('u')
                .long(ARG_URL)
                .help("Base URL of the qrgate server")
                .env("QRGATE_URL")
                .default_value(DEFAULT_URL),
        )
        .arg(
            Arg::new(ARG_SESSION_FILE)
                .long(ARG_SESSION_FILE)
                .help("Write the session cookie to this file (kept in memory when unset)")
                .env("QRGATE_SESSION_FILE")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub url: String,
    pub session_file: Option<PathBuf>,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        Self {
            url: matches
                .get_one::<String>(ARG_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_URL.to_string()),
            session_file: matches.get_one::<PathBuf>(ARG_SESSION_FILE).cloned(),
        }
    }
}
