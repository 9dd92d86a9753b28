//! HS512 session tokens.
//!
//! A token is a compact JWS: `header.claims.signature`, each part base64url
//! without padding. Only the signature and the expiry are checked; there is no
//! server-side session record behind a token.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

type HmacSha512 = Hmac<Sha512>;

pub const DEFAULT_SESSION_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
pub const MIN_SECRET_LEN: usize = 32;
/// Ten years.
pub const MAX_SESSION_TTL_SECONDS: i64 = 10 * 365 * 24 * 60 * 60;
const TOKEN_ALG: &str = "HS512";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct TokenHeader {
    alg: String,
    typ: String,
}

impl TokenHeader {
    fn hs512() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Personal identifier returned by the identity provider.
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(&'static str),
    #[error("session secret must be at least {MIN_SECRET_LEN} bytes")]
    WeakSecret,
    #[error("session ttl must be between 1 and {MAX_SESSION_TTL_SECONDS} seconds")]
    InvalidTtl,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
}

impl TokenError {
    /// Expired tokens were genuine; everything else means the token cannot be trusted.
    #[must_use]
    pub const fn is_expired(&self) -> bool {
        matches!(self, Self::Expired)
    }
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str, part: &'static str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Invalid(part))?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Invalid(part))
}

fn split_token(token: &str) -> Result<(&str, &str, &str), TokenError> {
    let mut parts = token.trim().split('.');
    let header = parts.next().ok_or(TokenError::Invalid("format"))?;
    let claims = parts.next().ok_or(TokenError::Invalid("format"))?;
    let signature = parts.next().ok_or(TokenError::Invalid("format"))?;
    if parts.next().is_some() || header.is_empty() || claims.is_empty() || signature.is_empty() {
        return Err(TokenError::Invalid("format"));
    }
    Ok((header, claims, signature))
}

/// Issues and verifies session tokens with a shared secret.
#[derive(Clone, Debug)]
pub struct SessionTokenService {
    secret: SecretString,
    ttl_seconds: i64,
}

impl SessionTokenService {
    /// # Errors
    /// Returns [`TokenError::WeakSecret`] if the secret is shorter than
    /// [`MIN_SECRET_LEN`] and [`TokenError::InvalidTtl`] if the TTL is not
    /// positive or exceeds [`MAX_SESSION_TTL_SECONDS`].
    pub fn new(secret: SecretString, ttl_seconds: i64) -> Result<Self, TokenError> {
        if secret.expose_secret().len() < MIN_SECRET_LEN {
            return Err(TokenError::WeakSecret);
        }
        if !(1..=MAX_SESSION_TTL_SECONDS).contains(&ttl_seconds) {
            return Err(TokenError::InvalidTtl);
        }
        Ok(Self {
            secret,
            ttl_seconds,
        })
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    /// Sign a token for `subject_id` valid for the configured TTL.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded.
    pub fn issue(&self, subject_id: &str) -> Result<String, TokenError> {
        self.issue_at(subject_id, Utc::now().timestamp())
    }

    /// Same as [`Self::issue`] with an explicit clock.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or the expiry does not fit.
    pub fn issue_at(&self, subject_id: &str, now_unix_seconds: i64) -> Result<String, TokenError> {
        let exp = now_unix_seconds
            .checked_add(self.ttl_seconds)
            .ok_or(TokenError::InvalidTtl)?;
        let claims = SessionClaims {
            sub: subject_id.to_string(),
            iat: now_unix_seconds,
            exp,
        };
        let header_b64 = b64e_json(&TokenHeader::hs512())?;
        let claims_b64 = b64e_json(&claims)?;
        let signing_input = format!("{header_b64}.{claims_b64}");

        let signature = self.mac(&signing_input)?.finalize().into_bytes();
        let signature_b64 = Base64UrlUnpadded::encode_string(&signature);

        Ok(format!("{signing_input}.{signature_b64}"))
    }

    /// Verify the signature and expiry of `token`.
    ///
    /// # Errors
    /// Returns [`TokenError::Expired`] for a genuine token past its expiry and
    /// [`TokenError::Invalid`] for anything malformed or tampered with.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, TokenError> {
        self.verify_at(token, Utc::now().timestamp())
    }

    /// Same as [`Self::verify`] with an explicit clock.
    ///
    /// # Errors
    /// See [`Self::verify`].
    pub fn verify_at(&self, token: &str, now_unix_seconds: i64) -> Result<SessionClaims, TokenError> {
        let (header_b64, claims_b64, signature_b64) = split_token(token)?;

        let header: TokenHeader = b64d_json(header_b64, "header")?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::Invalid("unsupported algorithm"));
        }

        let signature = Base64UrlUnpadded::decode_vec(signature_b64)
            .map_err(|_| TokenError::Invalid("signature encoding"))?;
        self.mac(&format!("{header_b64}.{claims_b64}"))?
            .verify_slice(&signature)
            .map_err(|_| TokenError::Invalid("signature"))?;

        // Expiry is only meaningful once the signature holds.
        let claims: SessionClaims = b64d_json(claims_b64, "claims")?;
        if claims.sub.is_empty() {
            return Err(TokenError::Invalid("subject"));
        }
        if claims.exp <= now_unix_seconds {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }

    /// Read the claims without checking anything. Diagnostics only, never an
    /// authorization decision.
    #[must_use]
    pub fn decode(&self, token: &str) -> Option<SessionClaims> {
        decode_unverified(token)
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha512, TokenError> {
        let mut mac = HmacSha512::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|_| TokenError::WeakSecret)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

/// Decode the claims segment of a token without a secret.
#[must_use]
pub fn decode_unverified(token: &str) -> Option<SessionClaims> {
    let (_, claims_b64, _) = split_token(token).ok()?;
    b64d_json(claims_b64, "claims").ok()
}
