//! The `accessToken` cookie and token extraction from request headers.

use axum::http::{
    header::{InvalidHeaderValue, AUTHORIZATION, COOKIE},
    HeaderMap, HeaderValue,
};

pub const SESSION_COOKIE_NAME: &str = "accessToken";

/// Cookie holding a signed session token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionCookie {
    value: String,
    max_age_seconds: i64,
    secure: bool,
}

impl SessionCookie {
    #[must_use]
    pub fn new(token: impl Into<String>, max_age_seconds: i64, secure: bool) -> Self {
        Self {
            value: token.into(),
            max_age_seconds,
            secure,
        }
    }

    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    #[must_use]
    pub fn max_age_seconds(&self) -> i64 {
        self.max_age_seconds
    }

    /// Render as a `Set-Cookie` value.
    #[must_use]
    pub fn to_set_cookie(&self) -> String {
        let mut cookie = format!(
            "{SESSION_COOKIE_NAME}={}; Path=/; SameSite=Lax; Max-Age={}",
            self.value, self.max_age_seconds
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }

    /// # Errors
    /// Returns an error if the token contains bytes not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(&self.to_set_cookie())
    }
}

/// `Set-Cookie` value that removes the session cookie.
///
/// # Errors
/// Never fails in practice; the value is static ASCII.
pub fn clear_session_cookie(secure: bool) -> Result<HeaderValue, InvalidHeaderValue> {
    let mut cookie = format!("{SESSION_COOKIE_NAME}=; Path=/; SameSite=Lax; Max-Age=0");
    if secure {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Find the session token on a request. A bearer header wins over the cookie.
#[must_use]
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(token) = extract_bearer_token(headers) {
        return Some(token);
    }
    extract_cookie_token(headers)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let trimmed = value.trim();
    let token = trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))?
        .trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn extract_cookie_token(headers: &HeaderMap) -> Option<String> {
    // Browsers may send several Cookie headers over HTTP/2.
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}
