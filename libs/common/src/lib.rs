//! Common library for the facegate kiosk authentication services
//!
//! This crate provides functionality shared by the kiosk client and the
//! auth service: the profile snapshot, session token issuing and
//! verification, and Redis connectivity.

pub mod cache;
pub mod error;
pub mod profile;
pub mod token;

pub use profile::{Profile, Role};
pub use token::{SessionClaims, SessionTokens, TokenConfig};

/// Example usage of the token module
///
/// ```rust,no_run
/// use common::{Profile, SessionTokens, TokenConfig};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = TokenConfig::from_env()?;
///     let tokens = SessionTokens::new(&config)?;
///     let profile: Profile = serde_json::from_str(
///         r#"{"id":1,"name":"Asha","phone_number":"5551234567","isAdmin":0}"#,
///     )?;
///     let token = tokens.issue(&profile)?;
///     println!("Verified profile: {}", tokens.verify(&token)?.profile.name);
///     Ok(())
/// }
/// ```
pub fn example_usage() {}
