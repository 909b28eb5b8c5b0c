//! REST API module using Axum
//!
//! HTTP surface of the dashboard:
//! - `/api/*` endpoints with a consistent envelope
//! - SSE streaming for analysis reports
//! - static dashboard served via `rust-embed` (compiled into the binary)

pub mod envelope;
pub mod handlers;
mod routes;

pub use handlers::DashboardState;

use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use rust_embed::Embed;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Dashboard assets compiled from `static/`.
#[derive(Embed)]
#[folder = "static/"]
struct DashboardAssets;

/// Serve a static asset or fall back to `index.html`.
async fn serve_asset(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if let Some(content) = DashboardAssets::get(path) {
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, mime.as_ref())],
            content.data.into_owned(),
        )
            .into_response();
    }

    if let Some(index) = DashboardAssets::get("index.html") {
        return (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/html")],
            index.data.into_owned(),
        )
            .into_response();
    }

    (StatusCode::OK, "thermowatch is running.").into_response()
}

/// Build a CORS layer that is restrictive by default (same-origin only).
///
/// Set `THERMOWATCH_CORS_ORIGINS` to a comma-separated list of allowed
/// origins for development.
fn build_cors_layer() -> CorsLayer {
    match std::env::var("THERMOWATCH_CORS_ORIGINS") {
        Ok(origins) => {
            let allowed: Vec<_> = origins
                .split(',')
                .filter_map(|o| o.trim().parse().ok())
                .collect();
            tracing::info!(origins = %origins, "CORS: allowing configured origins");
            CorsLayer::new()
                .allow_origin(allowed)
                .allow_methods([Method::GET])
                .allow_headers([header::CONTENT_TYPE])
        }
        Err(_) => CorsLayer::new()
            .allow_methods([Method::GET])
            .allow_headers([header::CONTENT_TYPE]),
    }
}

/// Create the complete application router with API and dashboard serving.
pub fn create_app(state: DashboardState) -> Router {
    Router::new()
        .nest("/api", routes::api_routes(state))
        .fallback(serve_asset)
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(build_cors_layer())
}
