//! Login and the current-user endpoint.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    audit::ArchivalFilter,
    auth::Claims,
    crud::users,
    error::{api_error, get_db_conn, ApiError, ApiResult},
    models::User,
    telemetry::{record_auth_attempt, AuthOutcome},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    #[schema(example = "gaffer@example.com")]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    #[schema(example = "securepassword123")]
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub user: UserResponse,
    #[schema(example = "eyJhbGciOiJFZERTQSIsInR5cCI6IkpXVCJ9...")]
    pub access_token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    #[schema(example = 3600)]
    pub expires_in: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    #[schema(example = 1)]
    pub id: i32,
    #[schema(example = "gaffer@example.com")]
    pub email: String,
    #[schema(example = "Pat Gaffer")]
    pub full_name: Option<String>,
    #[schema(example = true)]
    pub is_active: bool,
    pub created_at: chrono::NaiveDateTime,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            full_name: user.full_name,
            is_active: user.is_active,
            created_at: user.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CurrentUserResponse {
    pub user: UserResponse,
    #[schema(example = json!(["manager"]))]
    pub roles: Vec<String>,
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Authentication",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 401, description = "Invalid credentials", body = ApiError),
        (status = 500, description = "Internal server error", body = ApiError)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;

    let user = users::authenticate(&mut conn, &payload.email, &payload.password)
        .map_err(api_error)?
        .ok_or_else(|| {
            warn!(email = %payload.email, "Failed login attempt");
            record_auth_attempt("login", AuthOutcome::InvalidCredentials);
            ApiError::unauthorized("Invalid credentials", "INVALID_CREDENTIALS")
        })?;

    let access_token = state
        .jwt_config
        .generate_access_token(user.id, &user.email)
        .map_err(api_error)?;

    record_auth_attempt("login", AuthOutcome::Success);
    info!(user_id = user.id, "User logged in");

    Ok(Json(LoginResponse {
        user: user.into(),
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: state.jwt_config.access_token_expiry,
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Authentication",
    responses(
        (status = 200, description = "Current user", body = CurrentUserResponse),
        (status = 401, description = "Unauthorized", body = ApiError),
        (status = 404, description = "User no longer exists or is archived", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<Json<CurrentUserResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let user = users::by_id(&mut conn, claims.user_id, ArchivalFilter::ActiveOnly)
        .map_err(api_error)?
        .ok_or_else(|| ApiError::not_found("User not found", "USER_NOT_FOUND"))?
        .record;

    let roles = users::roles_of(&mut conn, user.id)
        .map_err(api_error)?
        .into_iter()
        .map(|role| role.name)
        .collect();

    Ok(Json(CurrentUserResponse {
        user: user.into(),
        roles,
    }))
}
