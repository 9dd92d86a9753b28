//! # Qrgate (QR identity proofing login)
//!
//! `qrgate` signs end users in through a third-party mobile identity-proofing
//! provider. The user scans a rotating QR code with the provider's app; the
//! server polls the provider until the order completes and then mints a
//! stateless session token.
//!
//! ## Server
//!
//! - **Orders:** [`order::OrderManager`] creates provider orders, collects their
//!   status and renews them transparently when the provider-side order lapses
//!   (its QR challenge only lives for a short one-time window). Callers only ever
//!   see `qrCode`, `newOrderRef`, `complete` or `failed`.
//! - **Sessions:** [`session::SessionTokenService`] issues HS512-signed tokens
//!   and tells expired tokens apart from tampered ones. There is no server-side
//!   session store.
//! - **Gatekeeping:** [`api::middleware`] verifies the `accessToken` cookie (or a
//!   bearer header) on every protected route.
//!
//! ## Client
//!
//! [`client`] holds the login state machine (a pure reducer returning effects),
//! the countdown timer and the runtime that drives polling against the server.

pub mod api;
pub mod cli;
pub mod client;
pub mod order;
pub mod session;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
