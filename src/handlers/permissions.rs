//! Permission evaluation over HTTP.

use axum::{extract::State, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::Claims,
    authz::{self, Access},
    enums::{Action, EntityKind},
    error::{api_error, get_db_conn, ApiError, ApiResult},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CheckPermissionRequest {
    /// User to evaluate. Defaults to the caller.
    #[schema(example = 7)]
    pub user_id: Option<i32>,
    #[validate(length(min = 1, message = "Permission name is required"))]
    #[schema(example = "can_view_archived_assets")]
    pub permission: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckPermissionResponse {
    #[schema(example = 7)]
    pub user_id: i32,
    #[schema(example = "can_view_archived_assets")]
    pub permission: String,
    pub access: Access,
    #[schema(example = true)]
    pub allowed: bool,
}

/// Evaluates a permission for a user. Asking about anyone but yourself
/// needs `can_update_users`.
#[utoipa::path(
    post,
    path = "/permissions/check",
    tag = "Permissions",
    request_body = CheckPermissionRequest,
    responses(
        (status = 200, description = "Evaluation result", body = CheckPermissionResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Missing can_update_users for another user", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_permission(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CheckPermissionRequest>,
) -> ApiResult<Json<CheckPermissionResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    let user_id = payload.user_id.unwrap_or(claims.user_id);

    if user_id != claims.user_id {
        authz::require_action(&mut conn, claims.user_id, EntityKind::User, Action::Update)
            .map_err(api_error)?;
    }

    let access = authz::check(&mut conn, user_id, &payload.permission).map_err(api_error)?;

    Ok(Json(CheckPermissionResponse {
        user_id,
        allowed: access.is_allowed(),
        permission: payload.permission,
        access,
    }))
}
