use crate::{
    api::{
        handlers::{auth, health, pages},
        middleware::{require_session, SessionGate},
    },
    order::OrderManager,
};
use anyhow::{Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::from_fn,
    routing::get,
    Extension, Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::PropagateRequestIdLayer, set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod handlers;
pub mod middleware;
mod openapi;

pub use openapi::openapi;

pub const DEFAULT_END_USER_IP: &str = "127.0.0.1";

/// Per-deployment settings the handlers need besides the order manager.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Liveness address handed to the provider when no proxy header carries one.
    pub end_user_ip: String,
    pub cookie_secure: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            end_user_ip: DEFAULT_END_USER_IP.to_string(),
            cookie_secure: true,
        }
    }
}

/// Build the application router.
///
/// `/`, `/api/me` and the login entry point `/auth` sit behind the session
/// gate; the order endpoints and `/health` are public.
#[must_use]
pub fn app(manager: Arc<OrderManager>, config: ServerConfig) -> Router {
    let gate = SessionGate::new(manager.tokens().clone(), config.cookie_secure);

    let protected = Router::new()
        .route("/", get(pages::root))
        .route("/api/me", get(pages::me))
        .route(middleware::LOGIN_PATH, get(pages::login))
        .route_layer(from_fn(require_session));

    let public = Router::new()
        .route("/api/auth/init", get(auth::init))
        .route("/api/auth/poll", get(auth::poll))
        .route("/health", get(health::health).options(health::health));

    Router::new().merge(protected).merge(public).layer(
        ServiceBuilder::new()
            .layer(SetRequestHeaderLayer::if_not_present(
                HeaderName::from_static("x-request-id"),
                |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
            ))
            .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                "x-request-id",
            )))
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(Extension(manager))
            .layer(Extension(config))
            .layer(Extension(gate)),
    )
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, manager: Arc<OrderManager>, config: ServerConfig) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}"))
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    info!("Listening on [::]:{}", port);

    serve(listener, manager, config).await
}

/// Serve on an already bound listener until ctrl-c.
/// # Errors
/// Return error if the server fails
pub async fn serve(
    listener: TcpListener,
    manager: Arc<OrderManager>,
    config: ServerConfig,
) -> Result<()> {
    let app = app(manager, config);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Gracefully shutdown");
            }
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
