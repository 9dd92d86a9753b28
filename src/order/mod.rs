//! Order lifecycle: start provider orders, collect them, renew lapsed ones.
//!
//! The provider's QR challenge is only valid for a short one-time window
//! (around 30 seconds), much shorter than the user-facing login window. When a
//! collect reports that the provider-side order lapsed, a replacement order is
//! started and the caller is told to switch to the new reference. Callers only
//! ever see the four statuses of [`PollStatus`]; provider errors are logged
//! here and normalized to `failed`.
//!
//! The manager keeps no state of its own. A lapsed order is gone from the
//! provider once it has been collected as failed, so a late poll of its old
//! reference answers `failed` instead of starting another replacement.

pub mod provider;
pub mod simulated;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::session::{SessionTokenService, TokenError};
use provider::{CollectStatus, IdentityProvider};

pub const DEFAULT_AUTH_TIMEOUT_SECONDS: u64 = 300;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("identity provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("order not found: {0}")]
    OrderNotFound(String),
    #[error("order {0} completed without an identity")]
    MissingIdentity(String),
    #[error("renewal of order {0} returned the same reference")]
    RenewalNotNew(String),
    #[error("failed to issue session token")]
    Token(#[from] TokenError),
}

/// A live provider order as seen by the manager.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthOrder {
    pub order_ref: String,
    pub provider_qr: String,
    pub created_at: DateTime<Utc>,
    pub validity_seconds: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InitAuthResponse {
    pub order_ref: String,
    pub auth_countdown: u64,
}

#[derive(ToSchema, Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PollStatus {
    QrCode,
    NewOrderRef,
    Complete,
    Failed,
}

/// Wire shape of a poll answer. Absent fields serialize as `null`.
#[derive(ToSchema, Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub status: PollStatus,
    pub qr_code: Option<String>,
    pub order_ref: Option<String>,
    pub token: Option<String>,
}

impl PollResult {
    #[must_use]
    pub fn qr_code(order_ref: &str, qr_code: String) -> Self {
        Self {
            status: PollStatus::QrCode,
            qr_code: Some(qr_code),
            order_ref: Some(order_ref.to_string()),
            token: None,
        }
    }

    #[must_use]
    pub fn new_order_ref(order_ref: String, qr_code: String) -> Self {
        Self {
            status: PollStatus::NewOrderRef,
            qr_code: Some(qr_code),
            order_ref: Some(order_ref),
            token: None,
        }
    }

    #[must_use]
    pub fn complete(order_ref: &str, token: String) -> Self {
        Self {
            status: PollStatus::Complete,
            qr_code: None,
            order_ref: Some(order_ref.to_string()),
            token: Some(token),
        }
    }

    #[must_use]
    pub fn failed() -> Self {
        Self {
            status: PollStatus::Failed,
            qr_code: None,
            order_ref: None,
            token: None,
        }
    }
}

pub struct OrderManager {
    provider: Arc<dyn IdentityProvider>,
    tokens: SessionTokenService,
    auth_timeout_seconds: u64,
}

impl OrderManager {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        tokens: SessionTokenService,
        auth_timeout_seconds: u64,
    ) -> Self {
        Self {
            provider,
            tokens,
            auth_timeout_seconds,
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &SessionTokenService {
        &self.tokens
    }

    /// Start a login: create an order and hand back its reference and the
    /// user-facing validity window.
    ///
    /// # Errors
    /// Returns [`OrderError::ProviderUnavailable`] if the provider cannot start
    /// an order or issue a QR challenge for it.
    #[instrument(skip(self))]
    pub async fn init_auth(&self, end_user_ip: &str) -> Result<InitAuthResponse, OrderError> {
        let order = self.create_order(end_user_ip).await?;
        info!(order_ref = %order.order_ref, created_at = %order.created_at, "order created");
        Ok(InitAuthResponse {
            order_ref: order.order_ref,
            auth_countdown: order.validity_seconds,
        })
    }

    /// Report where the order stands. Never errors: anything that goes wrong
    /// is logged and answered with `failed`.
    #[instrument(skip(self))]
    pub async fn poll_auth(&self, order_ref: &str, end_user_ip: &str) -> PollResult {
        match self.try_poll(order_ref, end_user_ip).await {
            Ok(result) => result,
            Err(OrderError::OrderNotFound(order_ref)) => {
                debug!(order_ref = %order_ref, "no cached QR artifact for order");
                PollResult::failed()
            }
            Err(err) => {
                warn!(order_ref = %order_ref, error = %err, "poll failed");
                PollResult::failed()
            }
        }
    }

    async fn try_poll(&self, order_ref: &str, end_user_ip: &str) -> Result<PollResult, OrderError> {
        // Without a cached artifact the order is unknown or long gone.
        if self.provider.latest_qr(order_ref).await.is_none() {
            return Err(OrderError::OrderNotFound(order_ref.to_string()));
        }

        let response = self
            .provider
            .collect(order_ref)
            .await
            .map_err(|err| OrderError::ProviderUnavailable(err.to_string()))?;

        match response.status {
            CollectStatus::Complete => {
                let subject = response
                    .completion_data
                    .map(|data| data.user.personal_number)
                    .filter(|personal_number| !personal_number.is_empty())
                    .ok_or_else(|| OrderError::MissingIdentity(order_ref.to_string()))?;
                let token = self.tokens.issue(&subject)?;
                info!(order_ref = %order_ref, "order complete, session token issued");
                Ok(PollResult::complete(order_ref, token))
            }
            CollectStatus::Failed => {
                debug!(
                    order_ref = %order_ref,
                    hint_code = response.hint_code.as_deref().unwrap_or("none"),
                    "provider order lapsed, renewing"
                );
                self.renew(order_ref, end_user_ip).await
            }
            CollectStatus::Pending => {
                let qr_code = self
                    .provider
                    .latest_qr(order_ref)
                    .await
                    .ok_or_else(|| OrderError::OrderNotFound(order_ref.to_string()))?;
                Ok(PollResult::qr_code(order_ref, qr_code))
            }
        }
    }

    async fn renew(&self, lapsed_ref: &str, end_user_ip: &str) -> Result<PollResult, OrderError> {
        let order = self.create_order(end_user_ip).await?;
        if order.order_ref == lapsed_ref {
            return Err(OrderError::RenewalNotNew(order.order_ref));
        }

        info!(
            lapsed_ref = %lapsed_ref,
            order_ref = %order.order_ref,
            created_at = %order.created_at,
            "order renewed"
        );
        // The challenge handed out with the order is its first QR artifact.
        Ok(PollResult::new_order_ref(order.order_ref, order.provider_qr))
    }

    async fn create_order(&self, end_user_ip: &str) -> Result<AuthOrder, OrderError> {
        let order = self
            .provider
            .authenticate(end_user_ip)
            .await
            .map_err(|err| OrderError::ProviderUnavailable(err.to_string()))?;

        let Some(provider_qr) = order.qr else {
            return Err(OrderError::ProviderUnavailable(format!(
                "no QR challenge for order {}",
                order.order_ref
            )));
        };

        Ok(AuthOrder {
            order_ref: order.order_ref,
            provider_qr,
            created_at: Utc::now(),
            validity_seconds: self.auth_timeout_seconds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::provider::{
        CollectResponse, CompletionUser, ProviderError, ProviderFuture, ProviderOrder,
    };
    use super::*;
    use secrecy::SecretString;
    use std::collections::{HashMap, VecDeque};
    use std::sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    };

    const SECRET: &str = "order-manager-test-secret-0123456789abcdef";

    /// Provider that replays queued answers.
    #[derive(Default)]
    struct ScriptedProvider {
        orders: Mutex<VecDeque<Result<ProviderOrder, ProviderError>>>,
        collects: Mutex<VecDeque<Result<CollectResponse, ProviderError>>>,
        qr_cache: Mutex<HashMap<String, String>>,
        collect_calls: AtomicUsize,
        skip_cache: AtomicBool,
    }

    impl ScriptedProvider {
        fn push_order(&self, order_ref: &str, qr: Option<&str>) {
            if let Ok(mut orders) = self.orders.lock() {
                orders.push_back(Ok(ProviderOrder {
                    order_ref: order_ref.to_string(),
                    qr: qr.map(ToString::to_string),
                }));
            }
        }

        fn push_order_error(&self) {
            if let Ok(mut orders) = self.orders.lock() {
                orders.push_back(Err(ProviderError::Unreachable("timeout".to_string())));
            }
        }

        fn push_collect(&self, response: Result<CollectResponse, ProviderError>) {
            if let Ok(mut collects) = self.collects.lock() {
                collects.push_back(response);
            }
        }

        fn cache_qr(&self, order_ref: &str, qr: &str) {
            if let Ok(mut cache) = self.qr_cache.lock() {
                cache.insert(order_ref.to_string(), qr.to_string());
            }
        }

        fn collect_calls(&self) -> usize {
            self.collect_calls.load(Ordering::SeqCst)
        }
    }

    impl IdentityProvider for ScriptedProvider {
        fn authenticate<'a>(
            &'a self,
            _end_user_ip: &'a str,
        ) -> ProviderFuture<'a, Result<ProviderOrder, ProviderError>> {
            Box::pin(async move {
                let next = self
                    .orders
                    .lock()
                    .ok()
                    .and_then(|mut orders| orders.pop_front())
                    .unwrap_or_else(|| Err(ProviderError::Rejected("no order queued".into())));
                if let Ok(ProviderOrder {
                    order_ref,
                    qr: Some(qr),
                }) = &next
                {
                    if !self.skip_cache.load(Ordering::SeqCst) {
                        self.cache_qr(order_ref, qr);
                    }
                }
                next
            })
        }

        fn collect<'a>(
            &'a self,
            _order_ref: &'a str,
        ) -> ProviderFuture<'a, Result<CollectResponse, ProviderError>> {
            Box::pin(async move {
                self.collect_calls.fetch_add(1, Ordering::SeqCst);
                self.collects
                    .lock()
                    .ok()
                    .and_then(|mut collects| collects.pop_front())
                    .unwrap_or_else(|| Err(ProviderError::Rejected("no collect queued".into())))
            })
        }

        fn latest_qr<'a>(&'a self, order_ref: &'a str) -> ProviderFuture<'a, Option<String>> {
            Box::pin(async move {
                self.qr_cache
                    .lock()
                    .ok()
                    .and_then(|cache| cache.get(order_ref).cloned())
            })
        }
    }

    fn tokens() -> SessionTokenService {
        match SessionTokenService::new(SecretString::from(SECRET.to_string()), 3600) {
            Ok(tokens) => tokens,
            Err(err) => panic!("token service: {err}"),
        }
    }

    fn manager(provider: &Arc<ScriptedProvider>) -> OrderManager {
        let provider: Arc<dyn IdentityProvider> = provider.clone();
        OrderManager::new(provider, tokens(), DEFAULT_AUTH_TIMEOUT_SECONDS)
    }

    fn user(personal_number: &str) -> CompletionUser {
        CompletionUser {
            personal_number: personal_number.to_string(),
            name: "Test Testsson".to_string(),
            given_name: "Test".to_string(),
            surname: "Testsson".to_string(),
        }
    }

    #[tokio::test]
    async fn init_returns_order_ref_and_validity() -> Result<(), OrderError> {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_order("order-a", Some("qr-a-0"));

        let response = manager(&provider).init_auth("127.0.0.1").await?;
        assert_eq!(response.order_ref, "order-a");
        assert_eq!(response.auth_countdown, DEFAULT_AUTH_TIMEOUT_SECONDS);
        Ok(())
    }

    #[tokio::test]
    async fn init_fails_when_provider_unreachable() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_order_error();

        let result = manager(&provider).init_auth("127.0.0.1").await;
        assert!(matches!(result, Err(OrderError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn init_fails_without_qr_challenge() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_order("order-a", None);

        let result = manager(&provider).init_auth("127.0.0.1").await;
        assert!(matches!(result, Err(OrderError::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn poll_without_cached_artifact_fails_without_collecting() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.push_collect(Ok(CollectResponse::complete(
            "order-x",
            Some(user("199001011234")),
        )));

        let result = manager(&provider).poll_auth("order-x", "127.0.0.1").await;
        assert_eq!(result, PollResult::failed());
        assert_eq!(provider.collect_calls(), 0);
    }

    #[tokio::test]
    async fn poll_pending_returns_latest_qr() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-7");
        provider.push_collect(Ok(CollectResponse::pending(
            "order-a",
            "outstandingTransaction",
        )));

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(
            result,
            PollResult::qr_code("order-a", "qr-a-7".to_string())
        );
    }

    #[tokio::test]
    async fn poll_complete_issues_token_for_subject() -> Result<(), TokenError> {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-7");
        provider.push_collect(Ok(CollectResponse::complete(
            "order-a",
            Some(user("199001011234")),
        )));
        let manager = manager(&provider);

        let result = manager.poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(result.status, PollStatus::Complete);
        assert_eq!(result.order_ref.as_deref(), Some("order-a"));
        assert_eq!(result.qr_code, None);

        let token = result.token.unwrap_or_default();
        let claims = manager.tokens().verify(&token)?;
        assert_eq!(claims.sub, "199001011234");
        Ok(())
    }

    #[tokio::test]
    async fn poll_complete_without_identity_fails() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-7");
        provider.push_collect(Ok(CollectResponse::complete("order-a", None)));

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(result, PollResult::failed());
    }

    #[tokio::test]
    async fn lapsed_order_is_renewed_with_new_reference() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-30");
        provider.push_collect(Ok(CollectResponse::failed(
            "order-a",
            "expiredTransaction",
        )));
        provider.push_order("order-b", Some("qr-b-0"));

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(
            result,
            PollResult::new_order_ref("order-b".to_string(), "qr-b-0".to_string())
        );
    }

    #[tokio::test]
    async fn renewal_hands_out_the_new_order_challenge() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-30");
        provider.push_collect(Ok(CollectResponse::failed(
            "order-a",
            "expiredTransaction",
        )));
        provider.push_order("order-b", Some("qr-b-0"));
        provider.skip_cache.store(true, Ordering::SeqCst);

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(
            result,
            PollResult::new_order_ref("order-b".to_string(), "qr-b-0".to_string())
        );
    }

    #[tokio::test]
    async fn failed_renewal_fails_the_poll() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-30");
        provider.push_collect(Ok(CollectResponse::failed(
            "order-a",
            "expiredTransaction",
        )));
        provider.push_order_error();

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(result, PollResult::failed());
    }

    #[tokio::test]
    async fn renewal_with_same_reference_fails_the_poll() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-30");
        provider.push_collect(Ok(CollectResponse::failed(
            "order-a",
            "expiredTransaction",
        )));
        provider.push_order("order-a", Some("qr-a-31"));

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(result, PollResult::failed());
    }

    #[tokio::test]
    async fn collect_error_fails_the_poll() {
        let provider = Arc::new(ScriptedProvider::default());
        provider.cache_qr("order-a", "qr-a-1");
        provider.push_collect(Err(ProviderError::Unreachable("reset".to_string())));

        let result = manager(&provider).poll_auth("order-a", "127.0.0.1").await;
        assert_eq!(result, PollResult::failed());
    }

    #[test]
    fn poll_result_wire_format() -> Result<(), serde_json::Error> {
        let failed = serde_json::to_value(PollResult::failed())?;
        assert_eq!(
            failed,
            serde_json::json!({"status": "failed", "qrCode": null, "orderRef": null, "token": null})
        );

        let renewed = serde_json::to_value(PollResult::new_order_ref(
            "order-b".to_string(),
            "qr-b".to_string(),
        ))?;
        assert_eq!(
            renewed,
            serde_json::json!({"status": "newOrderRef", "qrCode": "qr-b", "orderRef": "order-b", "token": null})
        );
        Ok(())
    }
}
