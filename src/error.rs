//! Error types for tiktok-dl
//!
//! This module provides the error taxonomy shared by the orchestrator and the backend server:
//! - Validation errors (bad or missing URL, no network call issued)
//! - Upstream errors (non-success status or transport failure from a backend endpoint)
//! - Rate-limit errors (upstream errors that carry a throttling marker)
//! - HTTP status code mapping for the backend server

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Result type alias for tiktok-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message shown when a transport failure carries no usable text
const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Main error type for tiktok-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "backend.base_url")
        key: Option<String>,
    },

    /// The submitted URL was rejected before any network call
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A backend endpoint answered with a non-success status
    #[error("{message}")]
    Upstream {
        /// Server-supplied message, or a generic fallback
        message: String,
    },

    /// A backend endpoint reported that its API limit was hit
    #[error("{message}")]
    RateLimited {
        /// Server-supplied message containing the rate-limit marker
        message: String,
    },

    /// Download was requested before any preview was fetched
    #[error("no video preview available, fetch video information first")]
    NoPreview,

    /// A backend call did not finish within the request timeout
    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Requested resource does not exist
    #[error("{0}")]
    NotFound(String),

    /// Malformed request body sent to the backend server
    #[error("{0}")]
    BadRequest(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Reasons a submitted URL is rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Nothing was entered
    #[error("Please enter a TikTok URL")]
    Empty,

    /// The URL does not mention the platform domain
    #[error("Please enter a valid TikTok URL")]
    NotTikTok,

    /// The URL is not an http(s) URL
    #[error("Please enter a valid TikTok URL starting with http:// or https://")]
    UnsupportedScheme,
}

impl Error {
    /// Build an upstream error, falling back to `fallback` when the server sent no message
    pub fn upstream(message: Option<String>, fallback: &str) -> Self {
        let message = message
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| fallback.to_string());
        Error::Upstream { message }
    }

    /// Re-tag an upstream error as rate-limited when its message contains one of `markers`
    ///
    /// Matching is case-insensitive. Errors of any other kind are returned unchanged.
    pub fn classify_rate_limit(self, markers: &[String]) -> Self {
        match self {
            Error::Upstream { message } if contains_marker(&message, markers) => {
                Error::RateLimited { message }
            }
            other => other,
        }
    }

    /// True for rate-limit errors
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Error::RateLimited { .. })
    }

    /// True for every failure that originates at or on the way to a backend endpoint
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Error::Upstream { .. }
                | Error::RateLimited { .. }
                | Error::Timeout(_)
                | Error::Network(_)
                | Error::Serialization(_)
        )
    }

    /// Message suitable for showing to the user; never empty
    pub fn user_message(&self) -> String {
        let message = self.to_string();
        if message.trim().is_empty() {
            GENERIC_FAILURE.to_string()
        } else {
            message
        }
    }
}

fn contains_marker(message: &str, markers: &[String]) -> bool {
    let lowered = message.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| lowered.contains(&m.to_lowercase()))
}

/// JSON envelope returned by every backend endpoint
///
/// ```json
/// { "status": "error", "message": "URL is required", "code": "validation_error" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// Always `"error"`
    pub status: String,

    /// Human-readable error message
    pub message: String,

    /// Machine-readable error code (e.g., "not_found", "rate_limited")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorEnvelope {
    /// Create a new error envelope with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
            code: Some(code.into()),
        }
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - Client error (invalid input)
            Error::Config { .. } => 400,
            Error::Validation(_) => 400,
            Error::BadRequest(_) => 400,
            Error::NoPreview => 409,

            // 404 Not Found
            Error::NotFound(_) => 404,

            // 429 Too Many Requests
            Error::RateLimited { .. } => 429,

            // 502 Bad Gateway - External service errors
            Error::Upstream { .. } => 502,
            Error::Network(_) => 502,

            // 504 Gateway Timeout
            Error::Timeout(_) => 504,

            // 500 Internal Server Error - Server-side issues
            Error::Serialization(_) => 500,
            Error::Io(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Other(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Validation(_) => "validation_error",
            Error::BadRequest(_) => "bad_request",
            Error::NoPreview => "no_preview",
            Error::NotFound(_) => "not_found",
            Error::RateLimited { .. } => "rate_limited",
            Error::Upstream { .. } => "upstream_error",
            Error::Network(_) => "network_error",
            Error::Timeout(_) => "timeout",
            Error::Serialization(_) => "serialization_error",
            Error::Io(_) => "io_error",
            Error::ApiServerError(_) => "api_server_error",
            Error::Other(_) => "internal_error",
        }
    }
}

impl From<Error> for ErrorEnvelope {
    fn from(error: Error) -> Self {
        ErrorEnvelope::new(error.error_code(), error.user_message())
    }
}
