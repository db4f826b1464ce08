//! Auth service routes

use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware,
    response::IntoResponse,
    routing::{get, post},
};
use common::Profile;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::{
    error::{AuthError, AuthResult},
    middleware::session_middleware,
    models::{AttendanceStatus, LogFilter},
    state::AppState,
    validation::{normalize_phone, same_phone, validate_code_present},
};

/// Request for code delivery
#[derive(Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub phone: String,
}

/// Request for code verification
#[derive(Deserialize)]
pub struct VerifyOtpRequest {
    pub id: Option<i64>,
    #[serde(default)]
    pub phone: String,
    /// Accepted as a JSON string or number
    pub otp: Option<serde_json::Value>,
}

impl VerifyOtpRequest {
    /// Split into user id, normalised phone and submitted code text
    fn into_parts(self) -> AuthResult<(i64, String, String)> {
        let id = self
            .id
            .ok_or_else(|| AuthError::BadRequest("User id is required".to_string()))?;

        let phone = normalize_phone(&self.phone).map_err(AuthError::BadRequest)?;

        let otp = match self.otp {
            Some(serde_json::Value::String(s)) => s,
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        };
        validate_code_present(&otp).map_err(AuthError::BadRequest)?;

        Ok((id, phone, otp.trim().to_string()))
    }
}

/// Response shared by the code endpoints
#[derive(Serialize)]
pub struct OtpResponse {
    pub success: bool,
    pub message: String,
}

impl OtpResponse {
    fn ok(message: &str) -> Self {
        Self {
            success: true,
            message: message.to_string(),
        }
    }
}

/// Create the router for the auth service
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/session", get(current_session))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
        .route("/api/logs", get(list_logs))
        .merge(protected_routes)
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "auth-service"
    }))
}

/// Generate, store and deliver a code for a phone
pub async fn send_otp(
    State(state): State<AppState>,
    Json(payload): Json<SendOtpRequest>,
) -> AuthResult<impl IntoResponse> {
    let phone = normalize_phone(&payload.phone).map_err(AuthError::BadRequest)?;
    let phone = phone.as_str();

    info!("Code requested for {}", phone);

    let code = state
        .otp_manager
        .generate_and_store(phone)
        .await
        .map_err(|e| {
            error!("Failed to store one-time code: {}", e);
            AuthError::InternalServerError
        })?;

    state.otp_manager.deliver(phone, code).await?;

    Ok(Json(OtpResponse::ok("OTP sent successfully")))
}

/// Verify a submitted code and log the attempt
///
/// Once the request carries an id, a phone and a code, every path below
/// appends exactly one attendance entry.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(payload): Json<VerifyOtpRequest>,
) -> AuthResult<impl IntoResponse> {
    let (user_id, phone, otp) = payload.into_parts()?;

    if !state.attempt_limiter.is_allowed(&phone).await {
        record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Failed).await;
        return Err(AuthError::TooManyAttempts);
    }

    match state.attendance.find_profile(user_id).await {
        Ok(Some(profile)) if !same_phone(&profile.phone_number, &phone) => {
            warn!(
                "Phone {} does not belong to user {}; code left pending",
                phone, user_id
            );
            record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Failed).await;
            return Err(AuthError::VerificationFailed(
                "Phone number does not match user".to_string(),
            ));
        }
        Ok(Some(_)) => {}
        Ok(None) => {
            warn!("Verification for unknown user {}", user_id);
            record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Failed).await;
            return Err(AuthError::VerificationFailed("Unknown user".to_string()));
        }
        Err(e) => {
            // The directory being unavailable must not decide the outcome
            error!("Profile lookup for user {} failed: {}", user_id, e);
        }
    }

    let accepted = match state.otp_manager.verify(&phone, &otp).await {
        Ok(accepted) => accepted,
        Err(e) => {
            error!("Code store unavailable while verifying {}: {}", phone, e);
            record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Failed).await;
            return Err(AuthError::InternalServerError);
        }
    };

    if accepted {
        state.attempt_limiter.reset(&phone).await;
        record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Success).await;
        Ok(Json(OtpResponse::ok("OTP verified successfully")))
    } else {
        record_attempt(&state, user_id, &phone, &otp, AttendanceStatus::Failed).await;
        Err(AuthError::VerificationFailed("Invalid OTP".to_string()))
    }
}

/// Append the attempt to the audit trail; failures are already reported by the logger
async fn record_attempt(
    state: &AppState,
    user_id: i64,
    phone: &str,
    otp: &str,
    status: AttendanceStatus,
) {
    let _ = state.attendance.record(user_id, phone, otp, status).await;
}

/// List attendance entries, newest first
pub async fn list_logs(
    State(state): State<AppState>,
    Query(filter): Query<LogFilter>,
) -> AuthResult<impl IntoResponse> {
    let logs = state.attendance.list(&filter).await.map_err(|e| {
        error!("Failed to fetch logs: {}", e);
        AuthError::InternalServerError
    })?;

    Ok(Json(serde_json::json!({
        "success": true,
        "logs": logs,
    })))
}

/// Profile behind the presented session token
pub async fn current_session(Extension(profile): Extension<Profile>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "profile": profile,
    }))
}
