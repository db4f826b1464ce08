//! Middleware gating protected views behind a valid session token

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use tracing::warn;

use crate::{error::AuthError, state::AppState};

/// Verify the bearer session token and expose its profile to handlers
pub async fn session_middleware(
    State(state): State<AppState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let TypedHeader(Authorization(bearer)) = bearer.ok_or(AuthError::Unauthorized)?;

    let claims = state
        .session_tokens
        .verify(bearer.token())
        .map_err(|e| {
            warn!("Session token rejected: {}", e);
            AuthError::Unauthorized
        })?;

    // Add the profile snapshot to request extensions for use in handlers
    req.extensions_mut().insert(claims.profile);

    Ok(next.run(req).await)
}
