//! Bearer-token authentication.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::ApiError;
use crate::telemetry::{record_auth_attempt, AuthOutcome};
use crate::AppState;

/// Verifies the access token and stores its [`Claims`](crate::auth::Claims)
/// in the request extensions for handlers to pick up.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized("Missing authorization header", "MISSING_AUTH_HEADER")
                .into_response()
        })?
        .strip_prefix("Bearer ")
        .ok_or_else(|| {
            ApiError::unauthorized("Invalid authorization header format", "INVALID_AUTH_FORMAT")
                .into_response()
        })?;

    let claims = state.jwt_config.verify_access_token(token).map_err(|e| {
        debug!(error = %e, "Rejected access token");
        record_auth_attempt("verify", AuthOutcome::InvalidToken);
        ApiError::unauthorized("Invalid or expired token", "INVALID_TOKEN").into_response()
    })?;

    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}
