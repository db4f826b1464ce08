//! Per-phone limiter for one-time code verification attempts

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Rate limiter configuration
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of attempts allowed within the window
    pub max_attempts: u32,
    /// Time window in seconds
    pub window_seconds: u64,
    /// Lock-out duration in seconds once the limit is hit
    pub ban_duration_seconds: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_seconds: 300,       // 5 minutes
            ban_duration_seconds: 900, // 15 minutes
        }
    }
}

impl RateLimiterConfig {
    /// Create a new RateLimiterConfig from environment variables
    ///
    /// # Environment Variables
    /// - `OTP_MAX_ATTEMPTS`: attempts per phone within the window (default: 5)
    /// - `OTP_ATTEMPT_WINDOW_SECONDS`: window length (default: 300)
    /// - `OTP_LOCKOUT_SECONDS`: lock-out once the limit is hit (default: 900)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: u64| {
            std::env::var(key)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };

        Self {
            max_attempts: read("OTP_MAX_ATTEMPTS", defaults.max_attempts as u64) as u32,
            window_seconds: read("OTP_ATTEMPT_WINDOW_SECONDS", defaults.window_seconds),
            ban_duration_seconds: read("OTP_LOCKOUT_SECONDS", defaults.ban_duration_seconds),
        }
    }
}

#[derive(Debug)]
struct RateLimiterEntry {
    attempts: u32,
    window_start: Instant,
    ban_expires: Option<Instant>,
}

/// Counts verification attempts per phone and locks a phone out once it
/// exceeds the configured limit
#[derive(Debug, Clone)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    entries: Arc<Mutex<HashMap<String, RateLimiterEntry>>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register one attempt for `key`; false when the key is locked out
    pub async fn is_allowed(&self, key: &str) -> bool {
        self.is_allowed_at(key, Instant::now()).await
    }

    async fn is_allowed_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock().await;

        let entry = entries.entry(key.to_string()).or_insert(RateLimiterEntry {
            attempts: 0,
            window_start: now,
            ban_expires: None,
        });

        if let Some(ban_expires) = entry.ban_expires {
            if now < ban_expires {
                return false;
            }
            entry.attempts = 0;
            entry.ban_expires = None;
            entry.window_start = now;
        }

        if now.duration_since(entry.window_start) >= Duration::from_secs(self.config.window_seconds)
        {
            entry.attempts = 0;
            entry.window_start = now;
        }

        if entry.attempts >= self.config.max_attempts {
            entry.ban_expires = Some(now + Duration::from_secs(self.config.ban_duration_seconds));
            warn!(
                "Locked out {} for {} seconds after {} attempts",
                key, self.config.ban_duration_seconds, entry.attempts
            );
            return false;
        }

        entry.attempts += 1;
        true
    }

    /// Forget the attempts recorded for `key`
    pub async fn reset(&self, key: &str) {
        if self.entries.lock().await.remove(key).is_some() {
            info!("Cleared attempt counter for {}", key);
        }
    }

    /// Drop entries whose window and lock-out have both ended
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(Instant::now()).await
    }

    async fn purge_expired_at(&self, now: Instant) -> usize {
        let window = Duration::from_secs(self.config.window_seconds);
        let mut entries = self.entries.lock().await;
        let before = entries.len();

        entries.retain(|_, entry| {
            let banned = entry.ban_expires.is_some_and(|ban_expires| now < ban_expires);
            banned || now.duration_since(entry.window_start) < window
        });

        before - entries.len()
    }
}
