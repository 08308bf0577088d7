//! API Error Types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hub::HubError;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Request body unusable
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Hub(#[from] HubError),

    /// Listener or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Logging setup failed: {0}")]
    Logging(String),

    #[error("Metrics setup failed: {0}")]
    Metrics(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Hub(HubError::Malformed(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotFound(_) | ApiError::Hub(HubError::UnknownHistory(_)) => {
                StatusCode::NOT_FOUND
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!("Request failed: {}", self);
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::BadRequest("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::Hub(HubError::UnknownHistory("tyres".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Metrics("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
