//! Pending one-time code model

use chrono::{DateTime, Duration, Utc};

/// A code waiting to be verified for one phone number
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCode {
    pub phone: String,
    pub code: u32,
    pub created_at: DateTime<Utc>,
}

impl PendingCode {
    pub fn new(phone: &str, code: u32) -> Self {
        Self {
            phone: phone.to_string(),
            code,
            created_at: Utc::now(),
        }
    }

    /// Whether the code is past its time to live at `now`
    pub fn is_expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        now >= self.created_at + ttl
    }
}
