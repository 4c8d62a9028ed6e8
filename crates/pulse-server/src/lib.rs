//! # pulse-server
//!
//! HTTP server exposing the Pulse tools:
//!
//! - `POST /mcp` JSON-RPC 2.0 (`initialize`, `ping`, `tools/list`, `tools/call`)
//! - `GET /api/v1/tools` tool descriptors
//! - `GET /health` and Prometheus `GET /metrics`
//!
//! Lifecycle events `server.start` and `server.stop` go to telemetry.

pub mod jsonrpc;
pub mod metrics;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use pulse_config::ServerConfig;
use pulse_core::{PulseError, Tool, ToolExecutor};
use pulse_telemetry::TelemetryDispatcher;
use pulse_tools::ToolRegistry;
use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use jsonrpc::{PARSE_ERROR, RpcRequest, RpcResponse};

/// Shared server state.
pub struct AppState {
    pub config: ServerConfig,
    pub registry: ToolRegistry,
    pub telemetry: TelemetryDispatcher,
    pub metrics: metrics::Metrics,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: u64,
}

/// Build the Axum router.
pub fn build_router(
    config: ServerConfig,
    registry: ToolRegistry,
    telemetry: TelemetryDispatcher,
) -> Router {
    let state = Arc::new(AppState {
        config: config.clone(),
        registry,
        telemetry,
        metrics: metrics::Metrics::new(),
    });

    let api_routes = Router::new()
        .route("/api/v1/tools", get(tools_handler))
        .route("/mcp", post(mcp_handler));

    let api_routes = if config.api_key.is_some() {
        api_routes.layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
    } else {
        api_routes
    };

    let mut router = Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            count_requests,
        ))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if config.cors {
        router = router.layer(CorsLayer::permissive());
    }

    router
}

/// Count every request, and every 4xx/5xx response.
async fn count_requests(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    state.metrics.inc_http_requests();
    let response = next.run(request).await;
    let status = response.status();
    if status.is_client_error() || status.is_server_error() {
        state.metrics.inc_http_errors();
    }
    response
}

/// Middleware that checks the Authorization header against the configured API key.
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(ref expected_key) = state.config.api_key {
        let provided = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        match provided {
            Some(key) if key == expected_key => {}
            _ => {
                warn!("unauthorized API request, invalid or missing API key");
                return Err(StatusCode::UNAUTHORIZED);
            }
        }
    }
    Ok(next.run(request).await)
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.metrics.uptime_secs(),
    })
}

/// Prometheus-compatible metrics endpoint.
async fn metrics_handler(
    State(state): State<Arc<AppState>>,
) -> (
    StatusCode,
    [(axum::http::header::HeaderName, &'static str); 1],
    String,
) {
    let body = state
        .metrics
        .render_prometheus(&state.telemetry.stats());
    (
        StatusCode::OK,
        [(
            axum::http::header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        body,
    )
}

async fn tools_handler(State(state): State<Arc<AppState>>) -> Json<Vec<Tool>> {
    Json(state.registry.tools())
}

async fn mcp_handler(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    state.metrics.inc_mcp_requests();

    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return Json(RpcResponse::err(Value::Null, PARSE_ERROR, format!("parse error: {e}")))
                .into_response();
        }
    };
    let request = match RpcRequest::from_value(value) {
        Ok(r) => r,
        Err(reply) => return Json(reply).into_response(),
    };

    match jsonrpc::handle(&state.registry, &state.metrics, request).await {
        Some(reply) => Json(reply).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    }
}

/// Bind `config.listen`, serve until Ctrl-C, then drain telemetry for up to `grace`.
pub async fn start_server(
    config: ServerConfig,
    registry: ToolRegistry,
    telemetry: TelemetryDispatcher,
    grace: Duration,
) -> pulse_core::Result<()> {
    let listener = tokio::net::TcpListener::bind(&config.listen)
        .await
        .map_err(|e| PulseError::Server(format!("failed to bind {}: {}", config.listen, e)))?;

    serve(listener, config, registry, telemetry, grace, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    })
    .await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Emits `server.start` once serving and `server.stop` after the server
/// has stopped, then drains telemetry for up to `grace`.
pub async fn serve(
    listener: tokio::net::TcpListener,
    config: ServerConfig,
    registry: ToolRegistry,
    telemetry: TelemetryDispatcher,
    grace: Duration,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> pulse_core::Result<()> {
    let start_payload = json!({"host": config.host(), "port": config.port()});
    let router = build_router(config, registry, telemetry.clone());

    if let Ok(addr) = listener.local_addr() {
        info!(listen = %addr, "starting HTTP server");
    }
    telemetry.track("server.start", Some(start_payload));

    let served = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await;

    telemetry.track("server.stop", Some(json!({})));
    if !telemetry.shutdown(grace).await {
        warn!("telemetry did not drain before the grace period ended");
    }

    served.map_err(|e| PulseError::Server(format!("server error: {}", e)))?;
    info!("server stopped");
    Ok(())
}
