use crate::{
    api::{self, ServerConfig},
    cli::commands::server::Options,
    order::{
        simulated::{SimulatedConfig, SimulatedProvider},
        OrderManager,
    },
    session::SessionTokenService,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

#[derive(Debug)]
pub struct Args {
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

impl From<Options> for Args {
    fn from(options: Options) -> Self {
        Self {
            port: options.port,
            jwt_secret: options.jwt_secret,
            session_ttl_seconds: options.session_ttl_seconds,
            auth_timeout_seconds: options.auth_timeout_seconds,
            end_user_ip: options.end_user_ip,
            cookie_secure: options.cookie_secure,
            sim_subject: options.sim_subject,
            sim_complete_after: options.sim_complete_after,
            sim_order_ttl_seconds: options.sim_order_ttl_seconds,
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if the token service rejects its secret or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let tokens = SessionTokenService::new(args.jwt_secret, args.session_ttl_seconds)
        .context("Failed to create session token service")?;

    let provider = SimulatedProvider::new(
        SimulatedConfig::default()
            .with_personal_number(args.sim_subject)
            .with_complete_after(args.sim_complete_after)
            .with_order_ttl(Duration::from_secs(args.sim_order_ttl_seconds)),
    );
    debug!(
        complete_after = args.sim_complete_after,
        order_ttl_seconds = args.sim_order_ttl_seconds,
        "using simulated identity provider"
    );

    let manager = Arc::new(OrderManager::new(
        Arc::new(provider),
        tokens,
        args.auth_timeout_seconds,
    ));

    info!(
        auth_timeout_seconds = args.auth_timeout_seconds,
        session_ttl_seconds = args.session_ttl_seconds,
        "starting qrgate"
    );

    api::new(
        args.port,
        manager,
        ServerConfig {
            end_user_ip: args.end_user_ip,
            cookie_secure: args.cookie_secure,
        },
    )
    .await
}
