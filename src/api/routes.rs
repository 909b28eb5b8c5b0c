//! API route table.

use axum::routing::get;
use axum::Router;

use super::handlers::{self, DashboardState};

/// Build the `/api` router.
pub fn api_routes(state: DashboardState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/status", get(handlers::status))
        .route("/config", get(handlers::get_config))
        .route("/devices", get(handlers::devices))
        .route("/devices/analysis", get(handlers::devices_analysis))
        .route("/devices/:id/overview", get(handlers::device_overview))
        .route("/devices/:id/readings", get(handlers::device_readings))
        .route("/devices/:id/chart", get(handlers::device_chart))
        .route("/devices/:id/analysis", get(handlers::device_analysis))
        .route(
            "/devices/:id/analysis/stream",
            get(handlers::device_analysis_stream),
        )
        .with_state(state)
}
