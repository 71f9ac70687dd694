use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::error::GatewayError;

/// JSON error body returned by every handler: `{error, message?}`
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Handler-boundary error carrying the HTTP status and client-facing label
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: error.into(),
                message: None,
            },
        }
    }

    pub fn with_message(mut self, message: impl ToString) -> Self {
        self.body.message = Some(message.to_string());
        self
    }

    /// Callback failures are always reported as a failed login
    pub fn authentication_failed(err: impl ToString) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Authentication failed").with_message(err)
    }

    /// Upstream catalog failures
    pub fn bad_gateway(label: &str, err: &GatewayError) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, label).with_message(err)
    }

    pub fn not_found(label: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, label)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }
}

impl From<GatewayError> for ApiError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Unauthorized(label) => Self::new(StatusCode::UNAUTHORIZED, label),
            GatewayError::NotFound(label) => Self::not_found(label),
            GatewayError::InvalidState
            | GatewayError::UpstreamExchange(_)
            | GatewayError::UpstreamProfile(_) => Self::authentication_failed(err),
            GatewayError::InvalidRequest(_) => {
                Self::new(StatusCode::BAD_REQUEST, "Invalid request").with_message(err)
            }
            GatewayError::Upstream { .. } => Self::new(StatusCode::BAD_GATEWAY, "Upstream error").with_message(err),
            GatewayError::Config(_) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal error").with_message(err)
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
