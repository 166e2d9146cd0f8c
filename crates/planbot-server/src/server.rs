use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use planbot_core::Clock;
use planbot_engine::RolloverEngine;
use planbot_store::PlanStore;
use planbot_telegram::Update;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::handlers::UpdateHandler;
use crate::health::{self, HealthResponse};

pub const SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub webhook_path: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 10000,
            webhook_path: "/webhook".into(),
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub handler: Arc<UpdateHandler>,
    pub engine: Arc<RolloverEngine>,
    pub store: Arc<PlanStore>,
    pub clock: Arc<dyn Clock>,
    pub webhook_secret: Option<SecretString>,
    pub cleanup_token: Option<SecretString>,
}

/// Build the Axum router with all routes.
pub fn build_router(webhook_path: &str, state: AppState) -> Router {
    Router::new()
        .route(webhook_path, post(webhook_handler))
        .route("/trigger-cleanup", get(cleanup_handler))
        .route("/health", get(health_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Bind and start serving. Returns a handle to shut it down.
pub async fn start(config: &ServerConfig, state: AppState) -> Result<ServerHandle, std::io::Error> {
    let router = build_router(&config.webhook_path, state);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    info!(%local_addr, webhook_path = %config.webhook_path, "planbot server started");

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(async move {
        let shutdown = async {
            let _ = shutdown_rx.await;
        };
        if let Err(e) = axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
        {
            warn!(error = %e, "server stopped with error");
        }
    });

    Ok(ServerHandle {
        local_addr,
        shutdown_tx: Some(shutdown_tx),
        server,
    })
}

/// Handle returned by `start()`; keeps the server task alive.
pub struct ServerHandle {
    pub local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
}

impl ServerHandle {
    /// Stop accepting connections and wait for in-flight requests.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.server.await {
            warn!(error = %e, "server task panicked");
        }
    }
}

/// POST <webhook_path>
///
/// Malformed updates are acknowledged too; Telegram would otherwise redeliver
/// them forever.
async fn webhook_handler(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
    if let Some(expected) = &state.webhook_secret {
        let given = headers.get(SECRET_HEADER).and_then(|v| v.to_str().ok());
        if given != Some(expected.expose_secret()) {
            warn!("webhook call with missing or wrong secret token");
            return StatusCode::UNAUTHORIZED;
        }
    }

    match serde_json::from_slice::<Update>(&body) {
        Ok(update) => state.handler.handle_update(update).await,
        Err(e) => warn!(error = %e, "undecodable update, dropping"),
    }
    StatusCode::OK
}

/// GET /trigger-cleanup
async fn cleanup_handler(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Some(expected) = &state.cleanup_token {
        if params.get("token").map(String::as_str) != Some(expected.expose_secret()) {
            return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
        }
    }

    let today = state.clock.today();
    let engine = Arc::clone(&state.engine);
    match tokio::task::spawn_blocking(move || engine.run(today)).await {
        Ok(report) => report.to_string().into_response(),
        Err(e) => {
            warn!(error = %e, "rollover task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("rollover task failed: {e}")).into_response()
        }
    }
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, StatusCode> {
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || store.user_count()).await {
        Ok(users) => Ok(Json(health::health_check(users))),
        Err(e) => {
            warn!(error = %e, "health task failed");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
