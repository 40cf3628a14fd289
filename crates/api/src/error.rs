//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use recommendation::RecommendationError;
use upstream::UpstreamError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// The caller identity header is missing.
    Unauthorized,
    /// Bad request from the client.
    BadRequest(String),
    /// Recommendation or venue status lookup failed.
    Recommendation(RecommendationError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Recommendation(err) => recommendation_error_to_response(err),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn recommendation_error_to_response(err: RecommendationError) -> (StatusCode, String) {
    let status = match &err {
        RecommendationError::UserNotFound(_) => StatusCode::NOT_FOUND,
        RecommendationError::InvalidRegion(_) => StatusCode::BAD_REQUEST,
        RecommendationError::Upstream(UpstreamError::CircuitOpen { .. })
        | RecommendationError::PolicyUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        RecommendationError::Upstream(_) => StatusCode::BAD_GATEWAY,
        RecommendationError::Store(_) | RecommendationError::Policy(_) => {
            tracing::error!(error = %err, "internal server error");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, err.to_string())
}

impl From<RecommendationError> for ApiError {
    fn from(err: RecommendationError) -> Self {
        ApiError::Recommendation(err)
    }
}
