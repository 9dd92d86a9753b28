//! Routes behind the session gate.

use axum::{
    extract::Extension,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::session::Session;

/// How to log in: the order endpoints and the poll cadence.
#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LoginInfo {
    pub init: String,
    pub poll: String,
    pub poll_interval_ms: u64,
}

impl Default for LoginInfo {
    fn default() -> Self {
        Self {
            init: "/api/auth/init".to_string(),
            poll: "/api/auth/poll?orderRef={orderRef}".to_string(),
            poll_interval_ms: 1000,
        }
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Authenticated landing page", body = Session),
        (status = 307, description = "No valid session, redirected to /auth")
    ),
    tag = "session"
)]
pub async fn root(Extension(session): Extension<Session>) -> impl IntoResponse {
    Json(session)
}

#[utoipa::path(
    get,
    path = "/api/me",
    responses(
        (status = 200, description = "Subject of the current session", body = Session),
        (status = 307, description = "No valid session, redirected to /auth")
    ),
    tag = "session"
)]
pub async fn me(Extension(session): Extension<Session>) -> impl IntoResponse {
    Json(session)
}

#[utoipa::path(
    get,
    path = "/auth",
    responses(
        (status = 200, description = "Login entry point", body = LoginInfo),
        (status = 307, description = "Already signed in, redirected to /")
    ),
    tag = "session"
)]
pub async fn login() -> impl IntoResponse {
    Json(LoginInfo::default())
}
