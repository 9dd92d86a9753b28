//! Stateless session tokens and the cookie that carries them.

mod cookie;
mod token;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use cookie::{
    clear_session_cookie, extract_session_token, SessionCookie, SESSION_COOKIE_NAME,
};
pub use token::{
    decode_unverified, SessionClaims, SessionTokenService, TokenError,
    DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS, MIN_SECRET_LEN,
};

/// Identity attached to a request once its token has been verified.
#[derive(ToSchema, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub subject_id: String,
}

impl From<SessionClaims> for Session {
    fn from(claims: SessionClaims) -> Self {
        Self {
            subject_id: claims.sub,
        }
    }
}
