use anyhow::Result;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use common::{SessionTokens, TokenConfig};
use kiosk::{
    GestureTiming, LoginError, LoginOrchestrator, LoginState,
    backend::HttpAuthBackend,
    config::KioskConfig,
    frames::DirectoryFrameSource,
    gesture::{GestureDetector, SampleRect},
    matcher::HttpFaceMatcher,
    token_store::FileTokenStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_max_level(Level::INFO)
        .init();

    info!("Starting kiosk");

    let config = KioskConfig::from_env()?;
    let session_tokens = SessionTokens::new(&TokenConfig::from_env()?)?;

    let mut orchestrator = LoginOrchestrator::new(
        Box::new(DirectoryFrameSource::open(&config.frames_dir)?),
        GestureDetector::new(SampleRect::default(), config.motion_threshold),
        Arc::new(HttpFaceMatcher::new(config.face_match_url.clone())),
        Arc::new(HttpAuthBackend::new(config.auth_service_url.clone())),
        session_tokens,
        Arc::new(FileTokenStore::new(config.token_path.clone())),
        GestureTiming {
            window: config.gesture_window,
            poll: config.gesture_poll,
        },
    );

    if let Some(profile) = orchestrator.restore_session().await? {
        println!("Welcome back, {}!", profile.name);
        return Ok(());
    }

    println!("{}", orchestrator.message());

    match orchestrator.start_login().await {
        Ok(()) => {}
        // Delivery can be retried from the prompt below
        Err(LoginError::Delivery(reason)) => warn!("Code delivery failed: {}", reason),
        Err(e) => {
            println!("{}", orchestrator.message());
            info!("Login attempt ended: {}", e);
            return Ok(());
        }
    }
    println!("{}", orchestrator.message());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("Enter the OTP (or 'resend'):");

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();

        let result = if input.eq_ignore_ascii_case("resend") {
            orchestrator.resend_code().await
        } else {
            orchestrator.submit_code(input).await.map(|_| ())
        };
        println!("{}", orchestrator.message());

        match result {
            Ok(()) => {
                if let LoginState::CodeVerified { profile } = orchestrator.state() {
                    println!("Signed in as {}", profile.name);
                    return Ok(());
                }
            }
            Err(e @ LoginError::Storage(_)) | Err(e @ LoginError::Token(_)) => {
                return Err(e.into());
            }
            Err(e) => info!("Code not accepted: {}", e),
        }
    }

    Ok(())
}
