//! Custom error types for the common library
//!
//! This module defines the error types shared by the kiosk and the auth
//! service when handling session tokens.

use thiserror::Error;

/// Custom error type for session token operations
#[derive(Error, Debug)]
pub enum TokenError {
    /// Token signature, structure or algorithm did not check out
    #[error("Invalid session token: {0}")]
    Invalid(String),

    /// Token was well formed but its validity window has passed
    #[error("Session token expired")]
    Expired,

    /// Token could not be signed
    #[error("Failed to sign session token: {0}")]
    Signing(String),

    /// Configuration error
    #[error("Session token configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with TokenError
pub type TokenResult<T> = Result<T, TokenError>;
