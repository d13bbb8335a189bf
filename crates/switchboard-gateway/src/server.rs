//! Gateway HTTP server — Axum front end for the routing engine

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use uuid::Uuid;

use switchboard_core::Router as LlmRouter;
use switchboard_core::{GenerationRequest, RouteError};

use crate::protocol::{GenerateReply, RouteFailure};

/// Shared state for all request handlers
#[derive(Clone)]
pub struct GatewayState {
    pub router: Arc<LlmRouter>,
    pub start_time: std::time::Instant,
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    /// Create a new gateway server around a configured routing engine
    pub fn new(bind: SocketAddr, router: Arc<LlmRouter>) -> Self {
        let state = GatewayState {
            router,
            start_time: std::time::Instant::now(),
        };
        Self { state, bind }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route("/v1/generate", post(generate_handler))
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/status", get(status_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router).await?;

        Ok(())
    }

    /// Start the server in the background, returning a handle
    pub fn spawn(self) -> tokio::task::JoinHandle<anyhow::Result<()>> {
        tokio::spawn(async move { self.run().await })
    }
}

// ── HTTP Handlers ──

async fn generate_handler(
    State(state): State<GatewayState>,
    axum::Json(request): axum::Json<GenerationRequest>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();
    info!(
        "Request {}: {} messages, provider hint {:?}",
        request_id,
        request.messages.len(),
        request.provider
    );

    // Nothing to generate from; reject before touching any backend
    if request.messages.is_empty() {
        warn!("Request {} rejected: empty message list", request_id);
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(serde_json::json!({
                "request_id": request_id,
                "error": "empty_request",
                "message": "messages must not be empty",
            })),
        )
            .into_response();
    }

    match state.router.route(&request).await {
        Ok(completion) => {
            info!(
                "Request {} served by {} in {}ms",
                request_id,
                completion.provider,
                completion.latency.as_millis()
            );
            axum::Json(GenerateReply {
                request_id,
                completion,
            })
            .into_response()
        }
        Err(err) => {
            warn!("Request {} failed: {}", request_id, err);
            let status = match &err {
                RouteError::Exhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
                RouteError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            };
            let body = RouteFailure::from_route_error(request_id, err);
            (status, axum::Json(body)).into_response()
        }
    }
}

async fn health_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    axum::Json(serde_json::json!({
        "status": "ok",
        "uptime_secs": uptime,
        "providers": state.router.provider_count(),
    }))
}

/// Ready while at least one provider's breaker would admit a call
async fn ready_handler(State(state): State<GatewayState>) -> Response {
    if state.router.has_available_provider() {
        axum::Json(serde_json::json!({ "ready": true })).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            axum::Json(serde_json::json!({ "ready": false })),
        )
            .into_response()
    }
}

async fn status_handler(State(state): State<GatewayState>) -> impl IntoResponse {
    axum::Json(state.router.snapshot())
}
