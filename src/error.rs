use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;

/// Error taxonomy for the console backend. Every failure a client can see
/// belongs to exactly one kind; none of them trigger automatic retries.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// Bad request content (empty prompt, malformed snapshot). Rejected
    /// before any upstream call.
    Input(String),
    /// Missing, invalid, or expired session credential.
    Auth(String),
    /// The model-serving API failed or returned an unusable response.
    Upstream(String),
    /// The snapshot store could not be read or written.
    Persistence(String),
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Input(_) => "input_error",
            ApiError::Auth(_) => "auth_error",
            ApiError::Upstream(_) => "upstream_error",
            ApiError::Persistence(_) => "persistence_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Input(_) => StatusCode::BAD_REQUEST,
            ApiError::Auth(_) => StatusCode::UNAUTHORIZED,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ApiError::Input(m)
            | ApiError::Auth(m)
            | ApiError::Upstream(m)
            | ApiError::Persistence(m) => m,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(json!({"error": self.kind(), "message": self.message()})),
        )
            .into_response()
    }
}
