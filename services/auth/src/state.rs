//! Application state shared across handlers

use common::SessionTokens;

use crate::{otp::OtpManager, rate_limiter::RateLimiter, repositories::AttendanceLogger};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub otp_manager: OtpManager,
    pub attendance: AttendanceLogger,
    pub session_tokens: SessionTokens,
    pub attempt_limiter: RateLimiter,
}
