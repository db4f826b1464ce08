//! Custom error types for the auth service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::otp::DeliveryError;

/// Custom error type for the auth service
#[derive(Error, Debug)]
pub enum AuthError {
    /// Missing or malformed request field
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Submitted code did not match, or the user is unknown
    #[error("Verification failed: {0}")]
    VerificationFailed(String),

    /// Too many verification attempts for this phone
    #[error("Too many attempts")]
    TooManyAttempts,

    /// Code was generated but not delivered
    #[error(transparent)]
    Delivery(#[from] DeliveryError),

    /// Missing, invalid or expired session token
    #[error("Unauthorized")]
    Unauthorized,

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::VerificationFailed(msg) => (StatusCode::BAD_REQUEST, msg),
            AuthError::TooManyAttempts => (
                StatusCode::TOO_MANY_REQUESTS,
                "Too many attempts. Please try again later.".to_string(),
            ),
            AuthError::Delivery(_) => (
                StatusCode::BAD_GATEWAY,
                "Failed to send OTP. Try again.".to_string(),
            ),
            AuthError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            AuthError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "success": false,
            "message": message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for auth handler results
pub type AuthResult<T> = Result<T, AuthError>;
