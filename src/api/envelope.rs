//! Consistent response envelope for all API endpoints.
//!
//! Every JSON response is wrapped in either [`ApiResponse`] (success) or
//! [`ApiErrorResponse`] (error), ensuring a uniform shape the dashboard can
//! rely on.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::analyzer::AnalyzerError;
use crate::source::SourceError;
use crate::stats::StatsError;

/// Metadata included in every response.
#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub timestamp: String,
    pub version: &'static str,
}

impl Default for ResponseMeta {
    fn default() -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            version: "1",
        }
    }
}

/// Successful response: `{ "data": T, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Response {
        let body = Self {
            data,
            meta: ResponseMeta::default(),
        };
        (StatusCode::OK, axum::Json(body)).into_response()
    }
}

/// Error detail inside [`ApiErrorResponse`].
#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

/// Error response: `{ "error": { "code": "...", "message": "..." }, "meta": { ... } }`
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub error: ErrorDetail,
    pub meta: ResponseMeta,
}

impl ApiErrorResponse {
    fn build(status: StatusCode, code: &str, msg: impl Into<String>) -> Response {
        let body = Self {
            error: ErrorDetail {
                code: code.to_string(),
                message: msg.into(),
            },
            meta: ResponseMeta::default(),
        };
        (status, axum::Json(body)).into_response()
    }

    pub fn not_found(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::NOT_FOUND, "NOT_FOUND", msg)
    }

    pub fn no_data(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::NOT_FOUND, "NO_DATA", msg)
    }

    pub fn bad_request(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg)
    }

    pub fn internal(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
    }

    pub fn service_unavailable(msg: impl Into<String>) -> Response {
        Self::build(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", msg)
    }
}

/// Map analyzer errors onto the envelope.
///
/// Source outages become 503 so load balancers and the dashboard can tell
/// "backend down" apart from "no such device".
pub fn error_response(err: &AnalyzerError) -> Response {
    match err {
        AnalyzerError::Source(SourceError::Unavailable(msg)) => {
            ApiErrorResponse::service_unavailable(msg.clone())
        }
        AnalyzerError::Source(SourceError::UnknownDevice(id)) => {
            ApiErrorResponse::not_found(format!("unknown device: {id}"))
        }
        AnalyzerError::Source(SourceError::Malformed(msg)) => {
            ApiErrorResponse::internal(msg.clone())
        }
        AnalyzerError::Stats(StatsError::EmptyInput) => {
            ApiErrorResponse::no_data("no readings in the selected range")
        }
    }
}
