//! Error types for RepoKeeper
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// This enum represents all possible errors that can occur
/// in the application. It implements `IntoResponse` to
/// automatically convert errors to appropriate HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// No valid session presented (401)
    #[error("Authentication required")]
    Unauthorized,

    /// Session is valid but no GitHub token is held for the user (401)
    #[error("GitHub token not found. Please re-authenticate.")]
    ProviderTokenMissing,

    /// GitHub rejected the stored token (401)
    #[error("GitHub token expired. Please re-authenticate.")]
    TokenExpired,

    /// Session signature verification failed (401)
    #[error("Invalid signature")]
    InvalidSignature,

    /// Validation error (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Non-2xx answer from the GitHub API
    #[error("GitHub API error: {status} - {message}")]
    Upstream { status: u16, message: String },

    /// Authorization code could not be exchanged (502)
    #[error("OAuth exchange failed: {0}")]
    OAuthExchange(String),

    /// HTTP client error (502)
    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Encryption/decryption error (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status this error is reported with.
    ///
    /// Upstream client errors that make sense to the caller are relayed as-is;
    /// everything else from GitHub becomes a gateway error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Unauthorized
            | AppError::ProviderTokenMissing
            | AppError::TokenExpired
            | AppError::InvalidSignature => StatusCode::UNAUTHORIZED,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream { status, .. } => match *status {
                403 | 404 | 409 | 422 => {
                    StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
                }
                _ => StatusCode::BAD_GATEWAY,
            },
            AppError::OAuthExchange(_) | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::ProviderTokenMissing => "provider_token_missing",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidSignature => "invalid_signature",
            AppError::Validation(_) => "validation",
            AppError::Upstream { .. } => "upstream",
            AppError::OAuthExchange(_) => "oauth_exchange",
            AppError::HttpClient(_) => "http_client",
            AppError::Config(_) => "config",
            AppError::Encryption(_) => "encryption",
            AppError::Internal(_) => "internal",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        AppError::Validation("Invalid request body".to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to appropriate HTTP status code
    /// and JSON error body.
    fn into_response(self) -> Response {
        use axum::Json;

        let status = self.status_code();
        let error_message = match &self {
            AppError::Validation(msg) => msg.clone(),
            AppError::Upstream { status, message } if message.is_empty() => {
                format!("GitHub API error: {status}")
            }
            AppError::OAuthExchange(_) => "Failed to exchange authorization code".to_string(),
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[self.error_type()]).inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}
