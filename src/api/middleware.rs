//! Session gate for protected routes.
//!
//! The token comes from the `Authorization: Bearer` header or the
//! `accessToken` cookie, header first. Anything that does not verify sends the
//! browser back to the login entry point with the cookie cleared. The login
//! entry point itself stays reachable without a session, and a caller that
//! already holds a valid session is sent on to the landing page instead.

use axum::{
    extract::Request,
    http::{header::SET_COOKIE, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{debug, error};

use crate::session::{
    clear_session_cookie, decode_unverified, extract_session_token, Session, SessionTokenService,
    TokenError,
};

pub const LOGIN_PATH: &str = "/auth";
pub const LANDING_PATH: &str = "/";

/// What the gate needs to verify tokens, shared through an `Extension`.
#[derive(Clone, Debug)]
pub struct SessionGate {
    tokens: SessionTokenService,
    cookie_secure: bool,
}

impl SessionGate {
    #[must_use]
    pub fn new(tokens: SessionTokenService, cookie_secure: bool) -> Self {
        Self {
            tokens,
            cookie_secure,
        }
    }

    fn check(&self, token: &str) -> Result<Session, TokenError> {
        // Cheap structural decode first; garbage never reaches the HMAC.
        if decode_unverified(token).is_none() {
            return Err(TokenError::Invalid("encoding"));
        }
        self.tokens.verify(token).map(Session::from)
    }
}

pub async fn require_session(mut request: Request, next: Next) -> Response {
    let Some(gate) = request.extensions().get::<SessionGate>().cloned() else {
        error!("session gate not configured");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    };

    let on_login = request.uri().path() == LOGIN_PATH;

    let Some(token) = extract_session_token(request.headers()) else {
        if on_login {
            return next.run(request).await;
        }
        return redirect_to_login(gate.cookie_secure);
    };

    match gate.check(&token) {
        Ok(session) => {
            if on_login {
                return Redirect::temporary(LANDING_PATH).into_response();
            }
            request.extensions_mut().insert(session);
            next.run(request).await
        }
        Err(err) => {
            if err.is_expired() {
                debug!("session token expired");
            } else {
                debug!("session token rejected: {err}");
            }

            if on_login {
                let mut response = next.run(request).await;
                append_cleared_cookie(&mut response, gate.cookie_secure);
                return response;
            }
            redirect_to_login(gate.cookie_secure)
        }
    }
}

fn redirect_to_login(cookie_secure: bool) -> Response {
    let mut response = Redirect::temporary(LOGIN_PATH).into_response();
    append_cleared_cookie(&mut response, cookie_secure);
    response
}

fn append_cleared_cookie(response: &mut Response, cookie_secure: bool) {
    match clear_session_cookie(cookie_secure) {
        Ok(cookie) => {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        Err(err) => error!("Failed to build cleared session cookie: {err}"),
    }
}
