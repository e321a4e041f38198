//! HTTP error mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pledgeguard_common::ProtocolError;

/// Error returned by every handler
#[derive(Debug)]
pub enum ApiError {
    Protocol(ProtocolError),
    /// No `x-identity` header on a call that needs one
    MissingIdentity,
    /// Malformed path or query input
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Protocol(e) => match e {
                ProtocolError::Validation(_) => StatusCode::BAD_REQUEST,
                ProtocolError::Authorization(_) => StatusCode::FORBIDDEN,
                ProtocolError::NotFound(_) => StatusCode::NOT_FOUND,
                ProtocolError::State(_) => StatusCode::CONFLICT,
                ProtocolError::Resource(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ProtocolError::Internal(_) | ProtocolError::Config(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::MissingIdentity => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Protocol(e) => e.kind(),
            ApiError::MissingIdentity => "unauthenticated",
            ApiError::BadRequest(_) => "bad_request",
        }
    }
}

impl From<ProtocolError> for ApiError {
    fn from(e: ProtocolError) -> Self {
        ApiError::Protocol(e)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Protocol(e) => write!(f, "{e}"),
            ApiError::MissingIdentity => write!(f, "missing x-identity header"),
            ApiError::BadRequest(msg) => write!(f, "{msg}"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }));
        (status, body).into_response()
    }
}
