//! Kiosk configuration

use anyhow::Result;
use std::{path::PathBuf, time::Duration};

/// Kiosk configuration
#[derive(Debug, Clone)]
pub struct KioskConfig {
    /// Base URL of the auth service
    pub auth_service_url: String,
    /// Face-match endpoint receiving captured stills
    pub face_match_url: String,
    /// How long the user has to wave after pressing login
    pub gesture_window: Duration,
    /// Interval between gesture polls
    pub gesture_poll: Duration,
    /// Mean per-pixel difference above which a poll counts as motion
    pub motion_threshold: f64,
    /// Where the session token is kept between runs
    pub token_path: PathBuf,
    /// Directory of frames replayed as the camera feed
    pub frames_dir: PathBuf,
}

impl Default for KioskConfig {
    fn default() -> Self {
        Self {
            auth_service_url: "http://localhost:5000".to_string(),
            face_match_url: "http://localhost:9000/compare-image".to_string(),
            gesture_window: Duration::from_millis(5000),
            gesture_poll: Duration::from_millis(200),
            motion_threshold: 30.0,
            token_path: PathBuf::from(".kiosk/auth_token"),
            frames_dir: PathBuf::from("frames"),
        }
    }
}

impl KioskConfig {
    /// Create a new KioskConfig from environment variables
    ///
    /// # Environment Variables
    /// - `AUTH_SERVICE_URL`: auth service base URL (default: "http://localhost:5000")
    /// - `FACE_MATCH_URL`: face-match endpoint (default: "http://localhost:9000/compare-image")
    /// - `GESTURE_WINDOW_MS`: gesture wait window (default: 5000)
    /// - `GESTURE_POLL_MS`: gesture poll interval (default: 200)
    /// - `MOTION_THRESHOLD`: motion threshold (default: 30)
    /// - `TOKEN_PATH`: session token file (default: ".kiosk/auth_token")
    /// - `KIOSK_FRAMES_DIR`: replayed frames directory (default: "frames")
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let auth_service_url = std::env::var("AUTH_SERVICE_URL")
            .unwrap_or(defaults.auth_service_url)
            .trim_end_matches('/')
            .to_string();

        let face_match_url = std::env::var("FACE_MATCH_URL").unwrap_or(defaults.face_match_url);

        let gesture_window = std::env::var("GESTURE_WINDOW_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.gesture_window);

        let gesture_poll = std::env::var("GESTURE_POLL_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.gesture_poll);

        let motion_threshold = std::env::var("MOTION_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.motion_threshold);

        let token_path = std::env::var("TOKEN_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.token_path);

        let frames_dir = std::env::var("KIOSK_FRAMES_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.frames_dir);

        if gesture_poll.is_zero() {
            anyhow::bail!("GESTURE_POLL_MS must be positive");
        }
        if gesture_poll > gesture_window {
            anyhow::bail!("GESTURE_POLL_MS must not exceed GESTURE_WINDOW_MS");
        }

        Ok(KioskConfig {
            auth_service_url,
            face_match_url,
            gesture_window,
            gesture_poll,
            motion_threshold,
            token_path,
            frames_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const KEYS: [&str; 7] = [
        "AUTH_SERVICE_URL",
        "FACE_MATCH_URL",
        "GESTURE_WINDOW_MS",
        "GESTURE_POLL_MS",
        "MOTION_THRESHOLD",
        "TOKEN_PATH",
        "KIOSK_FRAMES_DIR",
    ];

    fn clear() {
        for key in KEYS {
            unsafe {
                std::env::remove_var(key);
            }
        }
    }

    #[test]
    #[serial]
    fn test_kiosk_config_defaults() {
        clear();

        let config = KioskConfig::from_env().unwrap();
        assert_eq!(config.auth_service_url, "http://localhost:5000");
        assert_eq!(config.face_match_url, "http://localhost:9000/compare-image");
        assert_eq!(config.gesture_window, Duration::from_secs(5));
        assert_eq!(config.gesture_poll, Duration::from_millis(200));
        assert_eq!(config.motion_threshold, 30.0);
        assert_eq!(config.token_path, PathBuf::from(".kiosk/auth_token"));
    }

    #[test]
    #[serial]
    fn test_kiosk_config_custom_values() {
        clear();
        unsafe {
            std::env::set_var("AUTH_SERVICE_URL", "http://auth.local:8080/");
            std::env::set_var("GESTURE_WINDOW_MS", "3000");
            std::env::set_var("MOTION_THRESHOLD", "12.5");
        }

        let config = KioskConfig::from_env().unwrap();
        assert_eq!(config.auth_service_url, "http://auth.local:8080");
        assert_eq!(config.gesture_window, Duration::from_secs(3));
        assert_eq!(config.motion_threshold, 12.5);

        unsafe {
            std::env::set_var("GESTURE_POLL_MS", "0");
        }
        assert!(KioskConfig::from_env().is_err());

        clear();
    }
}
