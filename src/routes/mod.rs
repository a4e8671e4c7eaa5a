// HTTP routes: control surface (serve) and scrape endpoint (collect)

mod http;

use std::sync::Arc;

use axum::{
    Router,
    routing::{delete, get, post, put},
};
use tower_http::cors::{Any, CorsLayer};

use crate::control::ControlPlane;
use crate::sink::ScrapeSink;

pub fn control_app(plane: Arc<ControlPlane>) -> Router {
    Router::new()
        .route("/", get(|| async { "pingwatch control" })) // GET /
        .route("/version", get(http::version_handler)) // GET /version
        .route("/status", get(http::status_handler)) // GET /status
        .route("/start", post(http::start_handler)) // POST /start
        .route("/stop", post(http::stop_handler)) // POST /stop
        .route("/restart", post(http::restart_handler)) // POST /restart
        .route(
            "/destinations",
            get(http::list_destinations_handler).post(http::add_destination_handler),
        ) // GET, POST /destinations
        .route(
            "/destinations/{address}",
            delete(http::delete_destination_handler),
        ) // DELETE /destinations/{address}
        .route("/interval", put(http::update_interval_handler)) // PUT /interval
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(plane)
}

pub fn scrape_app(sink: Arc<ScrapeSink>) -> Router {
    Router::new()
        .route("/metrics", get(http::metrics_handler)) // GET /metrics
        .route("/stats", get(http::stats_handler)) // GET /stats
        .route("/version", get(http::version_handler)) // GET /version
        .with_state(sink)
}
