// Handlers: control commands, destination edits, scrape output.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use crate::control::{ControlPlane, ControlReport};
use crate::error::BookError;
use crate::models::DestinationTarget;
use crate::sink::ScrapeSink;

/// Package name and version (from Cargo.toml).
const NAME: &str = env!("CARGO_PKG_NAME");
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// GET /version: service name and version.
pub(super) async fn version_handler() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": NAME,
        "version": VERSION,
    }))
}

/// GET /status: pid per role.
pub(super) async fn status_handler(State(plane): State<Arc<ControlPlane>>) -> impl IntoResponse {
    Json(plane.status().await)
}

pub(super) async fn start_handler(State(plane): State<Arc<ControlPlane>>) -> Response {
    command_response(plane.start_all().await)
}

pub(super) async fn stop_handler(State(plane): State<Arc<ControlPlane>>) -> Response {
    command_response(plane.stop_all().await)
}

pub(super) async fn restart_handler(State(plane): State<Arc<ControlPlane>>) -> Response {
    command_response(plane.restart_all().await)
}

// 500 only when every role failed; partial failures are reported in the body.
fn command_response(report: ControlReport) -> Response {
    let status = if !report.roles.is_empty() && report.roles.iter().all(|r| r.error.is_some()) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(report)).into_response()
}

pub(super) async fn list_destinations_handler(
    State(plane): State<Arc<ControlPlane>>,
) -> impl IntoResponse {
    Json(plane.destinations().await)
}

pub(super) async fn add_destination_handler(
    State(plane): State<Arc<ControlPlane>>,
    Json(target): Json<DestinationTarget>,
) -> Response {
    match plane.add_destination(target).await {
        Ok(outcome) => Json(serde_json::json!({ "outcome": outcome })).into_response(),
        Err(e @ BookError::Invalid(_)) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "destination not saved");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct IntervalUpdate {
    interval_secs: u64,
}

pub(super) async fn update_interval_handler(
    State(plane): State<Arc<ControlPlane>>,
    Json(update): Json<IntervalUpdate>,
) -> Response {
    match plane.update_interval(update.interval_secs).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

pub(super) async fn delete_destination_handler(
    State(plane): State<Arc<ControlPlane>>,
    Path(address): Path<String>,
) -> Response {
    match plane.remove_destination(&address).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => {
            (StatusCode::NOT_FOUND, format!("unknown destination '{address}'")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// GET /metrics: Prometheus text exposition.
pub(super) async fn metrics_handler(State(sink): State<Arc<ScrapeSink>>) -> Response {
    match sink.render() {
        Ok(body) => ([(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)], body).into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// GET /stats: latest statistics per destination as JSON.
pub(super) async fn stats_handler(State(sink): State<Arc<ScrapeSink>>) -> impl IntoResponse {
    Json(sink.snapshot())
}
