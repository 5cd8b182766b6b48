//! # Error Handling
//!
//! Custom error types and their HTTP mappings.
//!
//! ## Error Categories:
//! - **NotFound**: unknown sound name (404)
//! - **AlreadyPlaying**: play requested while a sound is streaming (400)
//! - **InvalidInput**: unparseable or out-of-range volume value (400)
//! - **Playback**: a stream failed to start, e.g. an undecodable file (400)
//! - **Internal / Config**: server-side problems (500)
//!
//! Connection-level failures (server disconnect, unresolvable channel) are
//! fatal and never reach this mapping; they terminate the process with
//! status 1 from `main`.

use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    /// Requested sound name is not in the library
    NotFound(String),

    /// A sound is already streaming; playback is single-slot, no queueing
    AlreadyPlaying,

    /// Client sent an invalid volume value
    InvalidInput(String),

    /// The stream could not be started (decode or encoder failure)
    Playback(String),

    /// Internal server errors
    Internal(String),

    /// Configuration problems
    Config(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::AlreadyPlaying => write!(f, "already playing a sound"),
            AppError::InvalidInput(msg) => write!(f, "Invalid input: {}", msg),
            AppError::Playback(msg) => write!(f, "Playback failed: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

/// Converts errors into the JSON error responses the control surface
/// returns.
///
/// ## HTTP Status Code Mapping:
/// - NotFound → 404
/// - AlreadyPlaying/InvalidInput/Playback → 400
/// - Internal/Config → 500
impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let (status, error_type, message) = match self {
            AppError::NotFound(msg) => (
                actix_web::http::StatusCode::NOT_FOUND,
                "not_found",
                msg.clone(),
            ),
            AppError::AlreadyPlaying => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "already_playing",
                self.to_string(),
            ),
            AppError::InvalidInput(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "invalid_input",
                msg.clone(),
            ),
            AppError::Playback(msg) => (
                actix_web::http::StatusCode::BAD_REQUEST,
                "playback_error",
                msg.clone(),
            ),
            AppError::Internal(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                msg.clone(),
            ),
            AppError::Config(msg) => (
                actix_web::http::StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                msg.clone(),
            ),
        };

        HttpResponse::build(status).json(json!({
            "error": {
                "type": error_type,
                "message": message,
                "timestamp": chrono::Utc::now().to_rfc3339()
            }
        }))
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

/// Shorthand for `Result<T, AppError>`.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            AppError::NotFound("x".into()).error_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::AlreadyPlaying.error_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidInput("x".into()).error_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Playback("x".into()).error_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal("x".into()).error_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_display_includes_reason() {
        let err = AppError::NotFound("boing.mp3: file not found".into());
        assert!(err.to_string().contains("boing.mp3"));
    }
}
