//! Mapping from domain errors to HTTP responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::domain::foundation::GatewayError;

/// Wrapper giving `GatewayError` an HTTP shape.
#[derive(Debug)]
pub struct ApiError(pub GatewayError);

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            GatewayError::Authentication(_) => StatusCode::UNAUTHORIZED,
            GatewayError::AccessDenied => StatusCode::FORBIDDEN,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::InvalidState(_) => StatusCode::CONFLICT,
            GatewayError::Dependency(msg) => {
                tracing::error!(error = %msg, "Dependency failure serving request");
                StatusCode::SERVICE_UNAVAILABLE
            }
        };

        // Dependency details stay in the log, not the response body.
        let message = match &self.0 {
            GatewayError::Dependency(_) => "Service temporarily unavailable".to_string(),
            other => other.client_message(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
