//! Web server module for the exporter.
//!
//! Serves the Prometheus scrape endpoint, probes and collector status.

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, TraceLayer};

use crate::collector::{Scheduler, TaskStatus};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub scheduler: Arc<Scheduler>,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pending: Vec<String>,
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .route("/readyz", get(readyz_handler))
        .route("/api/collectors", get(collectors_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .with_state(app_state)
}

/// Prometheus scrape endpoint.
///
/// Collection failures never surface here; the last published rows are served.
async fn metrics_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.scheduler.render().await {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Metrics render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {}", e)).into_response()
        }
    }
}

/// Liveness probe.
async fn healthz_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        pending: Vec::new(),
    })
}

/// Readiness probe: every enabled collector has published at least once.
async fn readyz_handler(State(state): State<Arc<AppState>>) -> Response {
    if state.scheduler.is_ready().await {
        return Json(HealthResponse {
            status: "ok".to_string(),
            pending: Vec::new(),
        })
        .into_response();
    }

    let pending = state.scheduler.pending().await;
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(HealthResponse {
            status: "not_ready".to_string(),
            pending,
        }),
    )
        .into_response()
}

/// Collector status API endpoint.
async fn collectors_handler(State(state): State<Arc<AppState>>) -> Json<Vec<TaskStatus>> {
    Json(state.scheduler.statuses().await)
}
