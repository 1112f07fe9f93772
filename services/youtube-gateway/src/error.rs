//! Route-level error types
//!
//! Handlers run their upstream work as `Result<T, GatewayError>` and turn a
//! failure into an `ApiFailure`, which is all the caller ever sees: a static
//! message and a status. Details stay in the logs.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Why a gateway operation failed.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("authorization failed: {0}")]
    Auth(#[from] google_auth::Error),

    #[error("upstream call failed: {0}")]
    Upstream(#[from] youtube::Error),

    #[error("video not found")]
    VideoNotFound,

    #[error("video {0} has no snippet to update")]
    MissingVideo(String),
}

impl GatewayError {
    /// Classification label for `gateway_upstream_errors_total`.
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Auth(_) => "auth",
            GatewayError::Upstream(e) => e.kind(),
            GatewayError::VideoNotFound | GatewayError::MissingVideo(_) => "not_found",
        }
    }
}

/// Client-facing failure: `{"error": <message>}` with a status.
#[derive(Debug)]
pub struct ApiFailure {
    status: StatusCode,
    message: &'static str,
}

impl ApiFailure {
    /// Map an error to its response. Only a failed video lookup is a 404;
    /// everything else collapses to 500 with the route's message.
    pub fn from_error(route_message: &'static str, error: &GatewayError) -> Self {
        match error {
            GatewayError::VideoNotFound => Self {
                status: StatusCode::NOT_FOUND,
                message: "Video not found",
            },
            _ => Self {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: route_message,
            },
        }
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}
