//! Custom error types for the kiosk login flow

use common::error::TokenError;
use thiserror::Error;

/// Custom error type for the kiosk login flow
#[derive(Error, Debug)]
pub enum LoginError {
    /// Missing phone or code
    #[error("Input error: {0}")]
    Input(String),

    /// The gesture window elapsed without motion
    #[error("No hand motion detected")]
    GestureTimeout,

    /// Face not recognized; the attempt must restart from idle
    #[error("Face not recognized")]
    NoMatch,

    /// A code was generated but could not be delivered
    #[error("Failed to deliver code: {0}")]
    Delivery(String),

    /// The auth service rejected the submitted code
    #[error("Code rejected: {0}")]
    VerificationMismatch(String),

    /// Too many attempts for this phone; wait for the lock-out to end
    #[error("Locked out: {0}")]
    LockedOut(String),

    /// The auth service could not be reached, failed, or answered garbage
    #[error("Auth service unavailable: {0}")]
    Transport(String),

    /// The session token could not be persisted or read back
    #[error("Token storage error: {0}")]
    Storage(String),

    /// The session token could not be issued
    #[error(transparent)]
    Token(#[from] TokenError),

    /// The event makes no sense in the current state
    #[error("Cannot handle {event} while {state}")]
    IllegalTransition {
        state: &'static str,
        event: &'static str,
    },
}

/// Type alias for kiosk login results
pub type LoginResult<T> = Result<T, LoginError>;
