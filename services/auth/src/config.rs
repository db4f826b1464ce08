//! Auth service configuration

use anyhow::Result;
use std::str::FromStr;

/// Longest accepted pending-code lifetime (one day)
pub const MAX_OTP_TTL_SECONDS: u64 = 86_400;

/// Where pending codes live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeStoreBackend {
    Memory,
    Redis,
}

/// Where profiles and attendance entries live
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceBackend {
    Postgres,
    Memory,
}

/// How codes reach the user's phone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmsProvider {
    Twilio,
    Log,
}

impl FromStr for CodeStoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "redis" => Ok(Self::Redis),
            other => anyhow::bail!("Unknown CODE_STORE: {}", other),
        }
    }
}

impl FromStr for AttendanceBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(Self::Postgres),
            "memory" => Ok(Self::Memory),
            other => anyhow::bail!("Unknown ATTENDANCE_STORE: {}", other),
        }
    }
}

impl FromStr for SmsProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "twilio" => Ok(Self::Twilio),
            "log" => Ok(Self::Log),
            other => anyhow::bail!("Unknown SMS_PROVIDER: {}", other),
        }
    }
}

/// Auth service configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// Lifetime of a pending code in seconds
    pub otp_ttl_seconds: u64,
    /// Interval between expired-code sweeps in seconds
    pub purge_interval_seconds: u64,
    pub code_store: CodeStoreBackend,
    pub attendance_store: AttendanceBackend,
    pub sms_provider: SmsProvider,
}

impl AuthConfig {
    /// Create a new AuthConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_BIND_ADDR`: listen address (default: "0.0.0.0:5000")
    /// - `OTP_TTL_SECONDS`: pending code lifetime (default: 300)
    /// - `OTP_PURGE_INTERVAL_SECONDS`: expired-code sweep interval (default: 60)
    /// - `CODE_STORE`: `memory` or `redis` (default: memory)
    /// - `ATTENDANCE_STORE`: `postgres` or `memory` (default: postgres)
    /// - `SMS_PROVIDER`: `twilio` or `log` (default: twilio)
    pub fn from_env() -> Result<Self> {
        let bind_addr =
            std::env::var("AUTH_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:5000".to_string());

        let otp_ttl_seconds = std::env::var("OTP_TTL_SECONDS")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);

        let purge_interval_seconds = std::env::var("OTP_PURGE_INTERVAL_SECONDS")
            .unwrap_or_else(|_| "60".to_string())
            .parse()
            .unwrap_or(60);

        let code_store = std::env::var("CODE_STORE")
            .unwrap_or_else(|_| "memory".to_string())
            .parse()?;

        let attendance_store = std::env::var("ATTENDANCE_STORE")
            .unwrap_or_else(|_| "postgres".to_string())
            .parse()?;

        let sms_provider = std::env::var("SMS_PROVIDER")
            .unwrap_or_else(|_| "twilio".to_string())
            .parse()?;

        if otp_ttl_seconds == 0 {
            anyhow::bail!("OTP_TTL_SECONDS must be positive");
        }
        if otp_ttl_seconds > MAX_OTP_TTL_SECONDS {
            anyhow::bail!(
                "OTP_TTL_SECONDS must not exceed {} seconds",
                MAX_OTP_TTL_SECONDS
            );
        }

        Ok(AuthConfig {
            bind_addr,
            otp_ttl_seconds,
            purge_interval_seconds: purge_interval_seconds.max(1),
            code_store,
            attendance_store,
            sms_provider,
        })
    }
}
