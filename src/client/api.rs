//! HTTP client for the order endpoints and `/api/me`.

use reqwest::{header::AUTHORIZATION, redirect::Policy, Client, Response};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::machine::PollOutcome;
use crate::{
    api::handlers::ErrorResponse,
    order::{InitAuthResponse, PollResult, PollStatus},
    session::Session,
    APP_USER_AGENT,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid server url: {0}")]
    Url(#[from] url::ParseError),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Status { status: u16, message: String },
    #[error("session rejected by server")]
    Unauthenticated,
}

#[derive(Clone, Debug)]
pub struct AuthApi {
    client: Client,
    base: Url,
}

impl AuthApi {
    /// # Errors
    /// Returns an error if `base_url` does not parse or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base = Url::parse(base_url)?;
        // Keep any path prefix when joining relative endpoints.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        // The session gate answers with redirects; surface them instead of following.
        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .redirect(Policy::none())
            .build()?;

        Ok(Self { client, base })
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// # Errors
    /// Returns an error if the request fails or the server cannot start an order.
    pub async fn init(&self) -> Result<InitAuthResponse, ApiError> {
        let url = self.base.join("api/auth/init")?;
        let response = self.client.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// # Errors
    /// Returns an error if the request fails or the server rejects the poll.
    pub async fn poll(&self, order_ref: &str) -> Result<PollResult, ApiError> {
        let mut url = self.base.join("api/auth/poll")?;
        url.query_pairs_mut().append_pair("orderRef", order_ref);
        let response = self.client.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Resolve the subject behind `token`.
    ///
    /// # Errors
    /// Returns [`ApiError::Unauthenticated`] when the server redirects to the login page.
    pub async fn me(&self, token: &str) -> Result<Session, ApiError> {
        let url = self.base.join("api/me")?;
        let response = self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .send()
            .await?;
        if response.status().is_redirection() {
            return Err(ApiError::Unauthenticated);
        }
        Ok(check(response).await?.json().await?)
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|error| error.error)
        .unwrap_or(body);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

impl From<PollResult> for PollOutcome {
    /// A status missing the field it promises is treated as a failure.
    fn from(result: PollResult) -> Self {
        match (result.status, result.qr_code, result.order_ref, result.token) {
            (PollStatus::QrCode, Some(qr_code), _, _) => Self::QrCode { qr_code },
            (PollStatus::NewOrderRef, Some(qr_code), Some(order_ref), _) => {
                Self::NewOrderRef { order_ref, qr_code }
            }
            (PollStatus::Complete, _, _, Some(token)) => Self::Complete { token },
            _ => Self::Failed,
        }
    }
}
