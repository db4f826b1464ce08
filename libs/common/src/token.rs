//! Session token issuing and verification
//!
//! A session token is a self-contained HS256 JWT embedding the matched
//! profile. Nothing is stored server side: verification is purely a
//! signature and expiry check, so a token stays valid until it expires.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, warn};

use crate::{
    error::{TokenError, TokenResult},
    profile::Profile,
};

const MIN_SECRET_LEN: usize = 32;

/// Session token configuration
#[derive(Clone)]
pub struct TokenConfig {
    /// Shared HMAC secret
    pub secret: String,
    /// Token validity in seconds (default: 1 hour)
    pub ttl_seconds: u64,
}

impl std::fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"<redacted>")
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl TokenConfig {
    /// Create a new TokenConfig from environment variables
    ///
    /// # Environment Variables
    /// - `SESSION_TOKEN_SECRET`: shared signing secret, at least 32 bytes (required)
    /// - `SESSION_TOKEN_TTL`: token validity in seconds (default: 3600)
    pub fn from_env() -> TokenResult<Self> {
        let secret = std::env::var("SESSION_TOKEN_SECRET").map_err(|_| {
            TokenError::Configuration("SESSION_TOKEN_SECRET environment variable not set".into())
        })?;

        let ttl_seconds = std::env::var("SESSION_TOKEN_TTL")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(3600);

        let config = TokenConfig {
            secret,
            ttl_seconds,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> TokenResult<()> {
        if self.secret.len() < MIN_SECRET_LEN {
            return Err(TokenError::Configuration(format!(
                "SESSION_TOKEN_SECRET must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.ttl_seconds == 0 {
            return Err(TokenError::Configuration(
                "SESSION_TOKEN_TTL must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Claims carried by a session token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Matched profile snapshot
    pub profile: Profile,
    /// Issued at time
    pub iat: u64,
    /// Expiration time
    pub exp: u64,
}

/// Session token issuer and verifier
#[derive(Clone)]
pub struct SessionTokens {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_seconds: u64,
}

impl SessionTokens {
    /// Build the issuer/verifier pair from one configuration
    pub fn new(config: &TokenConfig) -> TokenResult<Self> {
        config.validate()?;

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `verify_at`.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(SessionTokens {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            ttl_seconds: config.ttl_seconds,
        })
    }

    /// Token validity in seconds
    pub fn ttl_seconds(&self) -> u64 {
        self.ttl_seconds
    }

    /// Issue a token for a profile, valid from now
    pub fn issue(&self, profile: &Profile) -> TokenResult<String> {
        self.issue_at(profile, unix_now()?)
    }

    /// Issue a token for a profile as if the current time were `now`
    pub fn issue_at(&self, profile: &Profile, now: u64) -> TokenResult<String> {
        let claims = SessionClaims {
            profile: profile.clone(),
            iat: now,
            exp: now + self.ttl_seconds,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;
        debug!("Issued session token for profile {}", profile.id);
        Ok(token)
    }

    /// Verify a token against the current time
    pub fn verify(&self, token: &str) -> TokenResult<SessionClaims> {
        self.verify_at(token, unix_now()?)
    }

    /// Verify a token as if the current time were `now`
    pub fn verify_at(&self, token: &str, now: u64) -> TokenResult<SessionClaims> {
        let data = decode::<SessionClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                warn!("Rejected session token: {}", e);
                TokenError::Invalid(e.to_string())
            },
        )?;

        if now >= data.claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(data.claims)
    }
}

fn unix_now() -> TokenResult<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| TokenError::Signing(format!("Failed to get current time: {}", e)))
}
