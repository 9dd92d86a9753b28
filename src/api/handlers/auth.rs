//! Order endpoints: start a login and poll it.
//!
//! Both are thin translations of [`OrderManager`] results into HTTP. A poll
//! always answers `200` with one of the four poll statuses; only a missing
//! `orderRef` is a client error.

use axum::{
    extract::{Extension, Query},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::error;
use utoipa::IntoParams;

use super::{extract_client_ip, ErrorResponse};
use crate::{
    api::ServerConfig,
    order::{InitAuthResponse, OrderManager, PollResult},
};

#[derive(Deserialize, IntoParams, Debug, Default)]
#[into_params(parameter_in = Query)]
pub struct PollQuery {
    /// Reference of the order to poll
    #[serde(rename = "orderRef")]
    pub order_ref: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/auth/init",
    responses(
        (status = 200, description = "Order created", body = InitAuthResponse),
        (status = 503, description = "Identity provider unavailable", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn init(
    headers: HeaderMap,
    manager: Extension<Arc<OrderManager>>,
    config: Extension<ServerConfig>,
) -> impl IntoResponse {
    let end_user_ip = extract_client_ip(&headers).unwrap_or_else(|| config.end_user_ip.clone());

    match manager.init_auth(&end_user_ip).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => {
            error!("Failed to start order: {err}");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ErrorResponse::new("identity provider unavailable")),
            )
                .into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/auth/poll",
    params(PollQuery),
    responses(
        (status = 200, description = "Current order status", body = PollResult),
        (status = 400, description = "Missing orderRef", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn poll(
    headers: HeaderMap,
    Query(query): Query<PollQuery>,
    manager: Extension<Arc<OrderManager>>,
    config: Extension<ServerConfig>,
) -> impl IntoResponse {
    let Some(order_ref) = query
        .order_ref
        .as_deref()
        .map(str::trim)
        .filter(|order_ref| !order_ref.is_empty())
    else {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse::new("orderRef is required")),
        )
            .into_response();
    };

    let end_user_ip = extract_client_ip(&headers).unwrap_or_else(|| config.end_user_ip.clone());
    let result = manager.poll_auth(order_ref, &end_user_ip).await;

    (StatusCode::OK, Json(result)).into_response()
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{test_app, tokens};
    use crate::order::simulated::SimulatedConfig;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn get_json(app: &Router, uri: &str) -> anyhow::Result<(StatusCode, Value)> {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty())?)
            .await?;
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await?;
        Ok((status, serde_json::from_slice(&body)?))
    }

    #[tokio::test]
    async fn poll_requires_order_ref() -> anyhow::Result<()> {
        let app = test_app(SimulatedConfig::default());
        for uri in ["/api/auth/poll", "/api/auth/poll?orderRef="] {
            let (status, body) = get_json(&app, uri).await?;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body, serde_json::json!({"error": "orderRef is required"}));
        }
        Ok(())
    }

    #[tokio::test]
    async fn poll_unknown_order_is_failed() -> anyhow::Result<()> {
        let app = test_app(SimulatedConfig::default());
        let (status, body) = get_json(&app, "/api/auth/poll?orderRef=nope").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"status": "failed", "qrCode": null, "orderRef": null, "token": null})
        );
        Ok(())
    }

    #[tokio::test]
    async fn init_then_poll_until_complete() -> anyhow::Result<()> {
        let app = test_app(SimulatedConfig::default().with_complete_after(2));

        let (status, init) = get_json(&app, "/api/auth/init").await?;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(init["authCountdown"], 300);
        let order_ref = init["orderRef"].as_str().unwrap_or_default().to_string();
        assert!(!order_ref.is_empty());

        let uri = format!("/api/auth/poll?orderRef={order_ref}");
        let (_, first) = get_json(&app, &uri).await?;
        assert_eq!(first["status"], "qrCode");
        assert_eq!(first["orderRef"], order_ref.as_str());
        assert!(first["qrCode"].is_string());

        let (_, done) = get_json(&app, &uri).await?;
        assert_eq!(done["status"], "complete");
        assert!(done["qrCode"].is_null());
        let token = done["token"].as_str().unwrap_or_default();
        assert_eq!(tokens().verify(token)?.sub, "199001011234");
        Ok(())
    }
}
