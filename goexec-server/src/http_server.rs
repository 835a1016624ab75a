//! HTTP surface for the execution engine
//!
//! Exposes `POST /api/execute` and `POST /api/format`, both taking
//! `{"code": "..."}` and answering with the engine's result shapes, plus a
//! `GET /health` probe.

use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use goexec_sandbox::{
    ExecutionRequest, ExecutionResult, FormatResult, SandboxService, ServiceError,
};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Shared state for the HTTP server
#[derive(Clone)]
pub struct AppState {
    service: Arc<SandboxService>,
}

impl AppState {
    pub fn new(service: SandboxService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }

    pub fn service(&self) -> &SandboxService {
        &self.service
    }
}

/// Errors surfaced at the transport level. Anything that happened to the
/// submitted code itself is reported inside a 200 result body instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::InvalidBody(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::Service(ServiceError::Busy { .. } | ServiceError::Closed) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
        };
        warn!(status = status.as_u16(), "Rejected request: {}", self);

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// Create the HTTP router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/api/execute", post(handle_execute))
        .route("/api/format", post(handle_format))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until `shutdown` resolves. From then on the engine admits no new
/// work while in-flight requests drain.
pub async fn start_server(
    listener: tokio::net::TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let closing = state.clone();
    let shutdown = async move {
        shutdown.await;
        closing.service().close();
    };
    let app = create_router(state);

    let bind_addr = listener
        .local_addr()
        .context("Failed to obtain HTTP server bind address")?;
    info!("Starting HTTP server on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn handle_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "runtime": state.service().runtime_name(),
        "availableSlots": state.service().available_slots(),
    }))
}

async fn handle_execute(
    State(state): State<AppState>,
    body: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<ExecutionResult>, ApiError> {
    let Json(request) = body?;
    let result = state.service().execute(request).await?;
    Ok(Json(result))
}

async fn handle_format(
    State(state): State<AppState>,
    body: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Result<Json<FormatResult>, ApiError> {
    let Json(request) = body?;
    let result = state.service().format(request).await?;
    Ok(Json(result))
}
