//! Dashboard REST API.
//!
//! Thin axum handlers over the ledger and the dispatcher. Everything under
//! `/api` requires a bearer token; `/health` does not.

pub mod auth;
pub mod broadcasts;
pub mod dashboard;
pub mod error;
pub mod scheduled;
pub mod settings;
pub mod users;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::middleware::from_fn_with_state;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;

use castcore::dispatch::BroadcastDispatcher;
use castcore::gateway::MessagingGateway;
use castcore::storage::DbPool;

use auth::{auth_middleware, Authenticator};
use error::{ApiError, ApiResult};

/// Shared state for the dashboard handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub dispatcher: BroadcastDispatcher,
    pub auth: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(db: Arc<DbPool>, dispatcher: BroadcastDispatcher, auth: Arc<dyn Authenticator>) -> Self {
        Self { db, dispatcher, auth }
    }

    pub fn gateway(&self) -> &Arc<dyn MessagingGateway> {
        self.dispatcher.gateway()
    }
}

/// `{"message": "..."}` acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Json<Self> {
        Json(Self {
            message: message.into(),
        })
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Parses a numeric path id.
pub fn parse_id(raw: &str) -> ApiResult<i64> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: {}", raw)))
}

/// Builds the full dashboard router.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/api/auth/me", get(auth_me))
        .route("/api/dashboard/stats", get(dashboard::stats))
        .route("/api/bot/status", get(dashboard::bot_status))
        .route("/api/users", get(users::list))
        .route("/api/users/stats", get(users::stats))
        .route(
            "/api/users/{id}",
            get(users::get_one).patch(users::set_status).delete(users::delete),
        )
        .route("/api/users/{id}/status", patch(users::set_status))
        .route("/api/broadcasts", get(broadcasts::list).post(broadcasts::create))
        .route("/api/broadcasts/quick", post(broadcasts::quick))
        .route(
            "/api/broadcasts/{id}",
            get(broadcasts::get_one).delete(broadcasts::delete),
        )
        .route("/api/broadcasts/{id}/send", post(broadcasts::send))
        .route("/api/broadcasts/{id}/deliveries", get(broadcasts::deliveries))
        .route(
            "/api/scheduled-messages",
            get(scheduled::list).post(scheduled::create),
        )
        .route(
            "/api/scheduled-messages/{id}",
            get(scheduled::get_one).patch(scheduled::update).delete(scheduled::delete),
        )
        .route("/api/scheduled-messages/{id}/cancel", patch(scheduled::cancel))
        .route(
            "/api/settings/welcome",
            get(settings::get_welcome).post(settings::save_welcome),
        )
        .route("/api/settings/{key}", get(settings::get_one))
        .route("/api/settings", post(settings::set_one))
        .route("/api/test/welcome-message", post(settings::test_welcome))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state);

    Router::new()
        .route("/health", get(health_handler))
        .merge(api)
        .layer(CorsLayer::permissive())
}

/// Address the dashboard listens on.
pub fn listen_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Binds the dashboard port. Called before anything is spawned so a port
/// conflict fails startup.
pub async fn bind(port: u16) -> anyhow::Result<TcpListener> {
    let addr = listen_addr(port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind dashboard port {}: {}", port, e))?;
    log::info!("Dashboard API listening on http://{}", addr);
    Ok(listener)
}

/// Serves `app` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
    Ok(())
}

/// GET /health
async fn health_handler() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

/// GET /api/auth/me, reached only with a valid token.
async fn auth_me() -> impl IntoResponse {
    Json(json!({"authenticated": true}))
}
