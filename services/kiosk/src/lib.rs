//! Kiosk client for liveness-gated, code-confirmed logins
//!
//! A login attempt waits for a hand wave in front of the camera, sends a
//! still to the face-match capability, has a one-time code delivered to
//! the matched profile's phone and, once the auth service accepts the
//! code, issues and keeps a session token for the profile.

pub mod backend;
pub mod config;
pub mod error;
pub mod frames;
pub mod gesture;
pub mod matcher;
pub mod orchestrator;
pub mod state;
pub mod token_store;

pub use error::{LoginError, LoginResult};
pub use orchestrator::{GestureTiming, LoginOrchestrator};
pub use state::{LoginEvent, LoginState};
