//! Worker HTTP surface: greeting, health probes, metrics.
//!
//! The relay is queue-driven; this server exists for operators and the
//! platform. Any path without a dedicated handler answers with a fixed
//! greeting.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tower_http::trace::TraceLayer;

use vbridge_queue::NotificationQueue;

use crate::context::RelayContext;
use crate::error::WorkerResult;

/// Fixed greeting for paths without a dedicated handler.
const GREETING: &str = "Hello World!";

/// Shared state for the HTTP handlers.
#[derive(Clone)]
pub struct HttpState {
    context: RelayContext,
    queue: Arc<NotificationQueue>,
    metrics: Option<PrometheusHandle>,
}

/// Liveness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Readiness response with dependency checks.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
}

#[derive(Debug, Serialize)]
pub struct ReadinessChecks {
    pub queue: CheckStatus,
    pub storage: CheckStatus,
    pub stream: CheckStatus,
    pub kv: CheckStatus,
}

#[derive(Debug, Serialize)]
pub struct CheckStatus {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            ok: true,
            latency_ms: Some(latency_ms),
            error: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            latency_ms: None,
            error: Some(message.into()),
        }
    }
}

/// Build the router for the worker's HTTP surface.
pub fn router(
    context: RelayContext,
    queue: Arc<NotificationQueue>,
    metrics: Option<PrometheusHandle>,
) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/readyz", get(ready))
        .route("/metrics", get(render_metrics))
        .fallback(greeting)
        .layer(TraceLayer::new_for_http())
        .with_state(HttpState {
            context,
            queue,
            metrics,
        })
}

/// Serve the router until the process exits.
pub async fn serve(addr: SocketAddr, router: Router) -> WorkerResult<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;
    Ok(())
}

async fn greeting() -> &'static str {
    GREETING
}

/// GET /healthz - basic liveness
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// GET /readyz - readiness with dependency checks
async fn ready(
    State(state): State<HttpState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let queue_check = {
        let start = Instant::now();
        match state.queue.len().await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let storage_check = {
        let start = Instant::now();
        match state.context.storage.check_connectivity().await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    // Stream exposes no side-effect-free probe; holding a validated client
    // is the check.
    let stream_check = CheckStatus {
        ok: true,
        latency_ms: None,
        error: None,
    };

    // get_value returns Ok(None) when the probe key is absent, which still
    // proves the namespace is reachable.
    let kv_check = {
        let start = Instant::now();
        match state.context.kv.get_value("_health").await {
            Ok(_) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let all_ok = queue_check.ok && storage_check.ok && stream_check.ok && kv_check.ok;

    let response = ReadinessResponse {
        status: if all_ok { "ready" } else { "not_ready" }.to_string(),
        checks: ReadinessChecks {
            queue: queue_check,
            storage: storage_check,
            stream: stream_check,
            kv: kv_check,
        },
    };

    if all_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

/// GET /metrics - Prometheus exposition
async fn render_metrics(State(state): State<HttpState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics disabled").into_response(),
    }
}
