//! `qrgate server` arguments.

use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use secrecy::SecretString;

use crate::{
    api::DEFAULT_END_USER_IP,
    order::DEFAULT_AUTH_TIMEOUT_SECONDS,
    session::{DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS, MIN_SECRET_LEN},
};

pub const NAME: &str = "server";

pub const ARG_PORT: &str = "port";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";
pub const ARG_AUTH_TIMEOUT_SECONDS: &str = "auth-timeout-seconds";
pub const ARG_END_USER_IP: &str = "end-user-ip";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_SIM_SUBJECT: &str = "sim-subject";
pub const ARG_SIM_COMPLETE_AFTER: &str = "sim-complete-after";
pub const ARG_SIM_ORDER_TTL_SECONDS: &str = "sim-order-ttl-seconds";

#[must_use]
pub fn subcommand() -> Command {
    let command = Command::new(NAME)
        .about("Run the login service")
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long(ARG_PORT)
                .help("Port to listen on")
                .default_value("8080")
                .env("QRGATE_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("Secret used to sign session tokens")
                .long_help("Secret used to sign session tokens (HS512). Must be at least 32 bytes.")
                .env("QRGATE_JWT_SECRET")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Session token and cookie lifetime in seconds")
                .env("QRGATE_SESSION_TTL_SECONDS")
                .default_value("2592000")
                .value_parser(clap::value_parser!(i64).range(1..=MAX_SESSION_TTL_SECONDS)),
        )
        .arg(
            Arg::new(ARG_AUTH_TIMEOUT_SECONDS)
                .long(ARG_AUTH_TIMEOUT_SECONDS)
                .help("Login window shown to the user, in seconds")
                .env("QRGATE_AUTH_TIMEOUT_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
        .arg(
            Arg::new(ARG_END_USER_IP)
                .long(ARG_END_USER_IP)
                .help("End-user address sent to the provider when no proxy header has one")
                .env("QRGATE_END_USER_IP")
                .default_value(DEFAULT_END_USER_IP),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Mark the session cookie Secure")
                .env("QRGATE_COOKIE_SECURE")
                .default_value("true")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(bool)),
        );

    with_simulator_args(command)
}

fn with_simulator_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SIM_SUBJECT)
                .long(ARG_SIM_SUBJECT)
                .help("Personal number the simulated provider signs in")
                .env("QRGATE_SIM_SUBJECT")
                .default_value("199001011234"),
        )
        .arg(
            Arg::new(ARG_SIM_COMPLETE_AFTER)
                .long(ARG_SIM_COMPLETE_AFTER)
                .help("Collects before a simulated order completes (0 = never)")
                .env("QRGATE_SIM_COMPLETE_AFTER")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_SIM_ORDER_TTL_SECONDS)
                .long(ARG_SIM_ORDER_TTL_SECONDS)
                .help("Seconds before a simulated order lapses and must be renewed")
                .env("QRGATE_SIM_ORDER_TTL_SECONDS")
                .default_value("30")
                .value_parser(clap::value_parser!(u64).range(1..)),
        )
}

#[derive(Debug)]
pub struct Options {
    pub port: u16,
    pub jwt_secret: SecretString,
    pub session_ttl_seconds: i64,
    pub auth_timeout_seconds: u64,
    pub end_user_ip: String,
    pub cookie_secure: bool,
    pub sim_subject: String,
    pub sim_complete_after: u32,
    pub sim_order_ttl_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if a required argument is missing or the secret is too short.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let jwt_secret = matches
            .get_one::<String>(ARG_JWT_SECRET)
            .cloned()
            .context("missing required argument: --jwt-secret")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            return Err(anyhow!(
                "--jwt-secret must be at least {MIN_SECRET_LEN} bytes"
            ));
        }

        Ok(Self {
            port: matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(8080),
            jwt_secret: SecretString::from(jwt_secret),
            session_ttl_seconds: matches
                .get_one::<i64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
            auth_timeout_seconds: matches
                .get_one::<u64>(ARG_AUTH_TIMEOUT_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_AUTH_TIMEOUT_SECONDS),
            end_user_ip: matches
                .get_one::<String>(ARG_END_USER_IP)
                .cloned()
                .unwrap_or_else(|| DEFAULT_END_USER_IP.to_string()),
            cookie_secure: matches
                .get_one::<bool>(ARG_COOKIE_SECURE)
                .copied()
                .unwrap_or(true),
            sim_subject: matches
                .get_one::<String>(ARG_SIM_SUBJECT)
                .cloned()
                .unwrap_or_else(|| "199001011234".to_string()),
            sim_complete_after: matches
                .get_one::<u32>(ARG_SIM_COMPLETE_AFTER)
                .copied()
                .unwrap_or(5),
            sim_order_ttl_seconds: matches
                .get_one::<u64>(ARG_SIM_ORDER_TTL_SECONDS)
                .copied()
                .unwrap_or(30),
        })
    }
}
