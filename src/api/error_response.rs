//! HTTP error response handling for the API
//!
//! This module provides conversions from domain errors to HTTP responses
//! with appropriate status codes and the JSON error envelope.

use crate::error::{Error, ErrorEnvelope, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status_code.is_server_error() {
            tracing::error!(error = %self, status = status_code.as_u16(), "request failed");
        } else {
            tracing::debug!(error = %self, status = status_code.as_u16(), "request rejected");
        }

        let envelope: ErrorEnvelope = self.into();

        (status_code, Json(envelope)).into_response()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    async fn envelope_of(response: Response) -> ErrorEnvelope {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn not_found_becomes_404_envelope() {
        let response = Error::NotFound("File not found".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let envelope = envelope_of(response).await;
        assert_eq!(envelope.status, "error");
        assert_eq!(envelope.message, "File not found");
        assert_eq!(envelope.code.as_deref(), Some("not_found"));
    }

    #[tokio::test]
    async fn validation_error_becomes_400_with_user_message() {
        let response = Error::from(ValidationError::NotTikTok).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            envelope_of(response).await.message,
            "Please enter a valid TikTok URL"
        );
    }

    #[tokio::test]
    async fn upstream_error_becomes_bad_gateway() {
        let response = Error::Upstream {
            message: "Url parsing is failed!".to_string(),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(envelope_of(response).await.code.as_deref(), Some("upstream_error"));
    }
}
