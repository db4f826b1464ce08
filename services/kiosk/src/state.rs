//! Login states and the events that move between them

use common::Profile;

use crate::error::LoginError;

/// Where a kiosk login attempt stands
#[derive(Debug, Clone, PartialEq)]
pub enum LoginState {
    Idle,
    AwaitingGesture,
    GestureConfirmed,
    MatchingFace,
    /// Terminal for the attempt; a new one starts from here like from idle
    NoMatch,
    CodeSent {
        profile: Profile,
    },
    CodeVerified {
        profile: Profile,
    },
}

/// Something that happened during a login attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LoginEvent {
    LoginRequested,
    GestureTimedOut,
    MotionDetected,
    StillCaptured,
    FaceNotMatched,
    FaceMatched(Profile),
    ResendRequested,
    CodeRejected,
    CodeAccepted,
    SessionRestored(Profile),
    LoggedOut,
}

impl LoginState {
    pub fn name(&self) -> &'static str {
        match self {
            LoginState::Idle => "Idle",
            LoginState::AwaitingGesture => "AwaitingGesture",
            LoginState::GestureConfirmed => "GestureConfirmed",
            LoginState::MatchingFace => "MatchingFace",
            LoginState::NoMatch => "NoMatch",
            LoginState::CodeSent { .. } => "CodeSent",
            LoginState::CodeVerified { .. } => "CodeVerified",
        }
    }

    /// Profile matched in this attempt, if any
    pub fn profile(&self) -> Option<&Profile> {
        match self {
            LoginState::CodeSent { profile } | LoginState::CodeVerified { profile } => {
                Some(profile)
            }
            _ => None,
        }
    }

    /// Apply an event, rejecting pairs that have no transition
    pub fn on(self, event: LoginEvent) -> Result<LoginState, LoginError> {
        use LoginEvent as E;
        use LoginState as S;

        match (self, event) {
            (S::Idle | S::NoMatch, E::LoginRequested) => Ok(S::AwaitingGesture),
            (S::AwaitingGesture, E::GestureTimedOut) => Ok(S::Idle),
            (S::AwaitingGesture, E::MotionDetected) => Ok(S::GestureConfirmed),
            (S::GestureConfirmed, E::StillCaptured) => Ok(S::MatchingFace),
            (S::MatchingFace, E::FaceNotMatched) => Ok(S::NoMatch),
            (S::MatchingFace, E::FaceMatched(profile)) => Ok(S::CodeSent { profile }),
            (S::CodeSent { profile }, E::ResendRequested | E::CodeRejected) => {
                Ok(S::CodeSent { profile })
            }
            (S::CodeSent { profile }, E::CodeAccepted) => Ok(S::CodeVerified { profile }),
            (S::Idle, E::SessionRestored(profile)) => Ok(S::CodeVerified { profile }),
            (_, E::LoggedOut) => Ok(S::Idle),
            (state, event) => Err(LoginError::IllegalTransition {
                state: state.name(),
                event: event.name(),
            }),
        }
    }
}

impl LoginEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LoginEvent::LoginRequested => "LoginRequested",
            LoginEvent::GestureTimedOut => "GestureTimedOut",
            LoginEvent::MotionDetected => "MotionDetected",
            LoginEvent::StillCaptured => "StillCaptured",
            LoginEvent::FaceNotMatched => "FaceNotMatched",
            LoginEvent::FaceMatched(_) => "FaceMatched",
            LoginEvent::ResendRequested => "ResendRequested",
            LoginEvent::CodeRejected => "CodeRejected",
            LoginEvent::CodeAccepted => "CodeAccepted",
            LoginEvent::SessionRestored(_) => "SessionRestored",
            LoginEvent::LoggedOut => "LoggedOut",
        }
    }
}
