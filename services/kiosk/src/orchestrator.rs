//! Kiosk login orchestration
//!
//! Drives one login attempt through gesture detection, face match, code
//! delivery and code verification. Every network call is awaited before
//! the state advances, so an attempt never has overlapping requests.

use common::{Profile, SessionTokens};
use image::RgbaImage;
use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::{
    backend::AuthBackend,
    error::{LoginError, LoginResult},
    frames::{FrameSource, capture_data_url},
    gesture::GestureDetector,
    matcher::FaceMatcher,
    state::{LoginEvent, LoginState},
    token_store::TokenStore,
};

pub const MSG_READY: &str = "Click 'Login' and wave your hand in front of the camera.";
pub const MSG_WAVE: &str = "Please wave your hand in front of the camera within 5 seconds...";
pub const MSG_NO_MOTION: &str = "No hand motion detected. Please try again.";
pub const MSG_GESTURE: &str = "Hand gesture detected! Proceeding with face recognition...";
pub const MSG_MATCHING: &str = "Checking if you're a registered user...";
pub const MSG_RECOGNIZED: &str = "Face recognized! Sending OTP...";
pub const MSG_NOT_RECOGNIZED: &str = "Face not recognized. Please register.";
pub const MSG_MATCH_FAILED: &str = "Invalid User, try again";
pub const MSG_CODE_SENT: &str = "OTP sent to your registered phone number. Please enter it below.";
pub const MSG_SEND_REJECTED: &str = "Failed to send OTP. Try again.";
pub const MSG_SEND_FAILED: &str = "An error occurred while sending OTP.";
pub const MSG_CODE_MISSING: &str = "Please enter the OTP.";
pub const MSG_VERIFIED: &str = "OTP verified! Redirecting to your profile...";
pub const MSG_CODE_REJECTED: &str = "Incorrect OTP. Please try again.";
pub const MSG_LOCKED_OUT: &str = "Too many attempts. Please try again later.";
pub const MSG_VERIFY_FAILED: &str = "An error occurred while verifying OTP.";

/// Gesture window and poll interval
#[derive(Debug, Clone, Copy)]
pub struct GestureTiming {
    pub window: Duration,
    pub poll: Duration,
}

impl Default for GestureTiming {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(5000),
            poll: Duration::from_millis(200),
        }
    }
}

/// Drives the kiosk through a login attempt
pub struct LoginOrchestrator {
    frames: Box<dyn FrameSource>,
    detector: GestureDetector,
    matcher: Arc<dyn FaceMatcher>,
    backend: Arc<dyn AuthBackend>,
    session_tokens: SessionTokens,
    token_store: Arc<dyn TokenStore>,
    timing: GestureTiming,
    state: LoginState,
    message: String,
}

impl LoginOrchestrator {
    pub fn new(
        frames: Box<dyn FrameSource>,
        detector: GestureDetector,
        matcher: Arc<dyn FaceMatcher>,
        backend: Arc<dyn AuthBackend>,
        session_tokens: SessionTokens,
        token_store: Arc<dyn TokenStore>,
        timing: GestureTiming,
    ) -> Self {
        Self {
            frames,
            detector,
            matcher,
            backend,
            session_tokens,
            token_store,
            timing,
            state: LoginState::Idle,
            message: MSG_READY.to_string(),
        }
    }

    pub fn state(&self) -> &LoginState {
        &self.state
    }

    /// Latest user-facing message
    pub fn message(&self) -> &str {
        &self.message
    }

    fn apply(&mut self, event: LoginEvent) -> LoginResult<()> {
        let current = std::mem::replace(&mut self.state, LoginState::Idle);
        match current.clone().on(event) {
            Ok(next) => {
                self.state = next;
                Ok(())
            }
            Err(e) => {
                self.state = current;
                Err(e)
            }
        }
    }

    fn say(&mut self, message: &str) {
        info!("{}", message);
        self.message = message.to_string();
    }

    /// Run one login attempt up to the point where a code has been sent
    pub async fn start_login(&mut self) -> LoginResult<()> {
        self.apply(LoginEvent::LoginRequested)?;
        self.say(MSG_WAVE);

        let Some(still) = self.wait_for_gesture().await else {
            self.apply(LoginEvent::GestureTimedOut)?;
            self.say(MSG_NO_MOTION);
            return Err(LoginError::GestureTimeout);
        };

        self.apply(LoginEvent::MotionDetected)?;
        self.say(MSG_GESTURE);

        let data_url = capture_data_url(&still);
        self.apply(LoginEvent::StillCaptured)?;
        self.say(MSG_MATCHING);

        let outcome = match data_url {
            Ok(data_url) => self.matcher.match_face(&data_url).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(Some(profile)) => {
                info!("Matched profile {}", profile.id);
                self.apply(LoginEvent::FaceMatched(profile))?;
                self.say(MSG_RECOGNIZED);
                self.request_code().await
            }
            Ok(None) => {
                self.apply(LoginEvent::FaceNotMatched)?;
                self.say(MSG_NOT_RECOGNIZED);
                Err(LoginError::NoMatch)
            }
            Err(e) => {
                warn!("Face match failed: {:#}", e);
                self.apply(LoginEvent::FaceNotMatched)?;
                self.say(MSG_MATCH_FAILED);
                Err(LoginError::NoMatch)
            }
        }
    }

    /// Poll the detector until motion or the end of the window
    ///
    /// Returns the frame on which motion was seen. The ticker lives only
    /// inside this call, so no poll outlives the wait.
    async fn wait_for_gesture(&mut self) -> Option<RgbaImage> {
        self.detector.reset();
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.timing.poll);

        loop {
            ticker.tick().await;

            let frame = self.frames.next_frame();
            if self.detector.evaluate(frame.as_ref()) {
                return frame;
            }

            if started.elapsed() >= self.timing.window {
                return None;
            }
        }
    }

    async fn request_code(&mut self) -> LoginResult<()> {
        let phone = self
            .state
            .profile()
            .map(|p| p.phone_number.clone())
            .unwrap_or_default();

        match self.backend.send_code(&phone).await {
            Ok(reply) if reply.success => {
                self.say(MSG_CODE_SENT);
                Ok(())
            }
            Ok(reply) => {
                self.say(MSG_SEND_REJECTED);
                Err(LoginError::Delivery(reply.message))
            }
            Err(e) => {
                error!("Error sending OTP: {:#}", e);
                self.say(MSG_SEND_FAILED);
                Err(LoginError::Delivery(e.to_string()))
            }
        }
    }

    /// Ask for a fresh code for the matched profile
    pub async fn resend_code(&mut self) -> LoginResult<()> {
        self.apply(LoginEvent::ResendRequested)?;
        self.request_code().await
    }

    /// Submit a code; on success the session token is issued and stored
    pub async fn submit_code(&mut self, code: &str) -> LoginResult<String> {
        let LoginState::CodeSent { profile } = &self.state else {
            return Err(LoginError::IllegalTransition {
                state: self.state.name(),
                event: LoginEvent::CodeAccepted.name(),
            });
        };
        let profile = profile.clone();

        let code = code.trim();
        if code.is_empty() {
            self.say(MSG_CODE_MISSING);
            return Err(LoginError::Input("OTP is required".to_string()));
        }

        let reply = match self
            .backend
            .verify_code(profile.id, &profile.phone_number, code)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                error!("Error verifying OTP: {:#}", e);
                self.say(MSG_VERIFY_FAILED);
                return Err(LoginError::Transport(e.to_string()));
            }
        };

        if !reply.success {
            if reply.is_locked_out() {
                warn!("Phone {} is locked out", profile.phone_number);
                self.say(MSG_LOCKED_OUT);
                return Err(LoginError::LockedOut(reply.message));
            }
            if reply.is_server_error() {
                error!("Auth service failed to verify OTP: {}", reply.message);
                self.say(MSG_VERIFY_FAILED);
                return Err(LoginError::Transport(reply.message));
            }
            self.apply(LoginEvent::CodeRejected)?;
            self.say(MSG_CODE_REJECTED);
            return Err(LoginError::VerificationMismatch(reply.message));
        }

        self.apply(LoginEvent::CodeAccepted)?;

        match self.persist_session(&profile).await {
            Ok(token) => {
                self.say(MSG_VERIFIED);
                Ok(token)
            }
            Err(e) => {
                // The code is spent; the user has to start over
                error!("Failed to establish session: {}", e);
                self.apply(LoginEvent::LoggedOut)?;
                self.say(MSG_VERIFY_FAILED);
                Err(e)
            }
        }
    }

    async fn persist_session(&self, profile: &Profile) -> LoginResult<String> {
        let token = self.session_tokens.issue(profile)?;
        self.token_store
            .save(&token)
            .await
            .map_err(|e| LoginError::Storage(e.to_string()))?;
        Ok(token)
    }

    /// Resume a stored session, discarding a token that no longer verifies
    pub async fn restore_session(&mut self) -> LoginResult<Option<Profile>> {
        let stored = self
            .token_store
            .load()
            .await
            .map_err(|e| LoginError::Storage(e.to_string()))?;

        let Some(token) = stored else {
            return Ok(None);
        };

        match self.session_tokens.verify(&token) {
            Ok(claims) => {
                self.apply(LoginEvent::SessionRestored(claims.profile.clone()))?;
                info!("Restored session for profile {}", claims.profile.id);
                Ok(Some(claims.profile))
            }
            Err(e) => {
                warn!("Discarding stored session token: {}", e);
                self.token_store
                    .clear()
                    .await
                    .map_err(|e| LoginError::Storage(e.to_string()))?;
                self.apply(LoginEvent::LoggedOut)?;
                self.message = MSG_READY.to_string();
                Ok(None)
            }
        }
    }

    /// Drop the session and return to idle
    pub async fn logout(&mut self) -> LoginResult<()> {
        self.token_store
            .clear()
            .await
            .map_err(|e| LoginError::Storage(e.to_string()))?;
        self.apply(LoginEvent::LoggedOut)?;
        self.message = MSG_READY.to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::ServerReply, gesture::tests::solid, token_store::MemoryTokenStore,
    };
    use anyhow::Result;
    use async_trait::async_trait;
    use common::{Role, TokenConfig};
    use std::{
        collections::VecDeque,
        sync::{
            Mutex as StdMutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn profile() -> Profile {
        Profile {
            id: 1,
            name: "Asha".to_string(),
            phone_number: "5551234567".to_string(),
            email: "asha@example.com".to_string(),
            designation: None,
            photo: None,
            role: Role::User,
        }
    }

    fn tokens(ttl_seconds: u64) -> SessionTokens {
        SessionTokens::new(&TokenConfig {
            secret: SECRET.to_string(),
            ttl_seconds,
        })
        .unwrap()
    }

    /// Plays queued frames, then repeats the last one
    struct ScriptedFrames {
        queue: VecDeque<Option<RgbaImage>>,
        last: Option<RgbaImage>,
        polls: Arc<AtomicUsize>,
    }

    impl ScriptedFrames {
        fn new(frames: Vec<Option<RgbaImage>>) -> (Self, Arc<AtomicUsize>) {
            let polls = Arc::new(AtomicUsize::new(0));
            let source = Self {
                queue: frames.into(),
                last: None,
                polls: polls.clone(),
            };
            (source, polls)
        }
    }

    impl FrameSource for ScriptedFrames {
        fn next_frame(&mut self) -> Option<RgbaImage> {
            self.polls.fetch_add(1, Ordering::SeqCst);
            match self.queue.pop_front() {
                Some(frame) => {
                    self.last = frame.clone();
                    frame
                }
                None => self.last.clone(),
            }
        }
    }

    enum MatchScript {
        Profile,
        NoMatch,
        Failure,
    }

    struct ScriptedMatcher {
        script: MatchScript,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FaceMatcher for ScriptedMatcher {
        async fn match_face(&self, image_data_url: &str) -> Result<Option<Profile>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(image_data_url.starts_with("data:image/png;base64,"));
            match self.script {
                MatchScript::Profile => Ok(Some(profile())),
                MatchScript::NoMatch => Ok(None),
                MatchScript::Failure => anyhow::bail!("connection refused"),
            }
        }
    }

    /// Accepts one code, once; a forced status fails every verification with it
    struct FakeBackend {
        code: StdMutex<Option<String>>,
        deliver: bool,
        forced_status: StdMutex<Option<u16>>,
        sends: AtomicUsize,
        verifications: StdMutex<Vec<(i64, String, String)>>,
    }

    impl FakeBackend {
        fn new(code: &str, deliver: bool) -> Self {
            Self {
                code: StdMutex::new(Some(code.to_string())),
                deliver,
                forced_status: StdMutex::new(None),
                sends: AtomicUsize::new(0),
                verifications: StdMutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AuthBackend for FakeBackend {
        async fn send_code(&self, _phone: &str) -> Result<ServerReply> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(ServerReply {
                success: self.deliver,
                message: String::new(),
                status: if self.deliver { 200 } else { 502 },
            })
        }

        async fn verify_code(&self, user_id: i64, phone: &str, code: &str) -> Result<ServerReply> {
            self.verifications.lock().unwrap().push((
                user_id,
                phone.to_string(),
                code.to_string(),
            ));
            if let Some(status) = *self.forced_status.lock().unwrap() {
                return Ok(ServerReply {
                    success: false,
                    message: "forced".to_string(),
                    status,
                });
            }
            let mut pending = self.code.lock().unwrap();
            let success = pending.as_deref() == Some(code);
            if success {
                *pending = None;
            }
            Ok(ServerReply {
                success,
                message: if success { "OTP verified successfully" } else { "Invalid OTP" }
                    .to_string(),
                status: if success { 200 } else { 400 },
            })
        }
    }

    struct Harness {
        orchestrator: LoginOrchestrator,
        polls: Arc<AtomicUsize>,
        matcher: Arc<ScriptedMatcher>,
        backend: Arc<FakeBackend>,
        store: MemoryTokenStore,
    }

    fn harness(frames: Vec<Option<RgbaImage>>, script: MatchScript, deliver: bool) -> Harness {
        let (frames, polls) = ScriptedFrames::new(frames);
        let matcher = Arc::new(ScriptedMatcher {
            script,
            calls: AtomicUsize::new(0),
        });
        let backend = Arc::new(FakeBackend::new("482913", deliver));
        let store = MemoryTokenStore::new();

        let orchestrator = LoginOrchestrator::new(
            Box::new(frames),
            GestureDetector::default(),
            matcher.clone(),
            backend.clone(),
            tokens(3600),
            Arc::new(store.clone()),
            GestureTiming::default(),
        );

        Harness {
            orchestrator,
            polls,
            matcher,
            backend,
            store,
        }
    }

    fn waving() -> Vec<Option<RgbaImage>> {
        vec![Some(solid(10)), Some(solid(10)), Some(solid(200))]
    }

    #[tokio::test(start_paused = true)]
    async fn test_gesture_timeout_never_calls_matcher() {
        let mut h = harness(vec![Some(solid(10))], MatchScript::Profile, true);
        let started = Instant::now();

        let err = h.orchestrator.start_login().await.unwrap_err();

        assert!(matches!(err, LoginError::GestureTimeout));
        assert_eq!(h.orchestrator.state(), &LoginState::Idle);
        assert_eq!(h.orchestrator.message(), MSG_NO_MOTION);
        assert_eq!(h.matcher.calls.load(Ordering::SeqCst), 0);
        assert_eq!(started.elapsed(), Duration::from_millis(5000));
        // Polls at 0, 200, ..., 5000 ms
        assert_eq!(h.polls.load(Ordering::SeqCst), 26);

        // No dangling poll after the window
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(h.polls.load(Ordering::SeqCst), 26);
    }

    #[tokio::test(start_paused = true)]
    async fn test_camera_not_ready_times_out() {
        let mut h = harness(vec![None], MatchScript::Profile, true);

        let err = h.orchestrator.start_login().await.unwrap_err();
        assert!(matches!(err, LoginError::GestureTimeout));
        assert_eq!(h.matcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_motion_wins_and_code_is_sent() {
        let mut h = harness(waving(), MatchScript::Profile, true);
        let started = Instant::now();

        h.orchestrator.start_login().await.unwrap();

        assert_eq!(started.elapsed(), Duration::from_millis(400));
        assert_eq!(h.polls.load(Ordering::SeqCst), 3);
        assert_eq!(h.matcher.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.backend.sends.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.orchestrator.state(),
            &LoginState::CodeSent { profile: profile() }
        );
        assert_eq!(h.orchestrator.message(), MSG_CODE_SENT);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrecognized_face_ends_attempt() {
        let mut h = harness(waving(), MatchScript::NoMatch, true);

        let err = h.orchestrator.start_login().await.unwrap_err();
        assert!(matches!(err, LoginError::NoMatch));
        assert_eq!(h.orchestrator.state(), &LoginState::NoMatch);
        assert_eq!(h.orchestrator.message(), MSG_NOT_RECOGNIZED);
        assert_eq!(h.backend.sends.load(Ordering::SeqCst), 0);

        assert!(matches!(
            h.orchestrator.submit_code("482913").await,
            Err(LoginError::IllegalTransition { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_failure_is_no_match() {
        let mut h = harness(waving(), MatchScript::Failure, true);

        let err = h.orchestrator.start_login().await.unwrap_err();
        assert!(matches!(err, LoginError::NoMatch));
        assert_eq!(h.orchestrator.message(), MSG_MATCH_FAILED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_failure_can_be_resent() {
        let mut h = harness(waving(), MatchScript::Profile, false);

        let err = h.orchestrator.start_login().await.unwrap_err();
        assert!(matches!(err, LoginError::Delivery(_)));
        assert_eq!(h.orchestrator.message(), MSG_SEND_REJECTED);
        assert_eq!(h.orchestrator.state().name(), "CodeSent");

        assert!(h.orchestrator.resend_code().await.is_err());
        assert_eq!(h.backend.sends.load(Ordering::SeqCst), 2);

        // The stored code still verifies
        h.orchestrator.submit_code("482913").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_code_stays_in_code_sent() {
        let mut h = harness(waving(), MatchScript::Profile, true);
        h.orchestrator.start_login().await.unwrap();

        let err = h.orchestrator.submit_code("111111").await.unwrap_err();
        assert!(matches!(err, LoginError::VerificationMismatch(_)));
        assert_eq!(h.orchestrator.message(), MSG_CODE_REJECTED);
        assert_eq!(h.orchestrator.state().name(), "CodeSent");
        assert!(h.store.load().await.unwrap().is_none());

        let err = h.orchestrator.submit_code("   ").await.unwrap_err();
        assert!(matches!(err, LoginError::Input(_)));
        assert_eq!(h.backend.verifications.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_and_server_errors_are_not_reported_as_wrong_code() {
        let mut h = harness(waving(), MatchScript::Profile, true);
        h.orchestrator.start_login().await.unwrap();

        *h.backend.forced_status.lock().unwrap() = Some(429);
        let err = h.orchestrator.submit_code("482913").await.unwrap_err();
        assert!(matches!(err, LoginError::LockedOut(_)));
        assert_eq!(h.orchestrator.message(), MSG_LOCKED_OUT);
        assert_eq!(h.orchestrator.state().name(), "CodeSent");

        *h.backend.forced_status.lock().unwrap() = Some(500);
        let err = h.orchestrator.submit_code("482913").await.unwrap_err();
        assert!(matches!(err, LoginError::Transport(_)));
        assert_eq!(h.orchestrator.message(), MSG_VERIFY_FAILED);
        assert_eq!(h.orchestrator.state().name(), "CodeSent");

        // Once the service recovers the pending code still works
        *h.backend.forced_status.lock().unwrap() = None;
        h.orchestrator.submit_code("482913").await.unwrap();
        assert_eq!(h.orchestrator.message(), MSG_VERIFIED);
    }

    #[tokio::test(start_paused = true)]
    async fn test_accepted_code_issues_and_stores_token() {
        let mut h = harness(waving(), MatchScript::Profile, true);
        h.orchestrator.start_login().await.unwrap();

        let token = h.orchestrator.submit_code(" 482913 ").await.unwrap();

        assert_eq!(
            h.orchestrator.state(),
            &LoginState::CodeVerified { profile: profile() }
        );
        assert_eq!(h.orchestrator.message(), MSG_VERIFIED);
        assert_eq!(h.store.load().await.unwrap(), Some(token.clone()));
        assert_eq!(tokens(3600).verify(&token).unwrap().profile, profile());
        assert_eq!(
            h.backend.verifications.lock().unwrap()[0],
            (1, "5551234567".to_string(), "482913".to_string())
        );
    }

    #[tokio::test]
    async fn test_restore_session_with_valid_token() {
        let h = harness(vec![], MatchScript::Profile, true);
        let mut orchestrator = h.orchestrator;
        h.store
            .save(&tokens(3600).issue(&profile()).unwrap())
            .await
            .unwrap();

        let restored = orchestrator.restore_session().await.unwrap();
        assert_eq!(restored, Some(profile()));
        assert_eq!(orchestrator.state().name(), "CodeVerified");

        orchestrator.logout().await.unwrap();
        assert_eq!(orchestrator.state(), &LoginState::Idle);
        assert_eq!(orchestrator.message(), MSG_READY);
        assert!(h.store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_session_discards_invalid_token() {
        let h = harness(vec![], MatchScript::Profile, true);
        let mut orchestrator = h.orchestrator;

        let expired = tokens(60).issue_at(&profile(), 1_000).unwrap();
        h.store.save(&expired).await.unwrap();
        assert_eq!(orchestrator.restore_session().await.unwrap(), None);
        assert!(h.store.load().await.unwrap().is_none());

        h.store.save("not-a-token").await.unwrap();
        assert_eq!(orchestrator.restore_session().await.unwrap(), None);
        assert!(h.store.load().await.unwrap().is_none());
        assert_eq!(orchestrator.state(), &LoginState::Idle);

        assert_eq!(orchestrator.restore_session().await.unwrap(), None);
    }
}
