//! Asset endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    audit::{ArchivalFilter, ArchivalParams, AuditedRecord},
    auth::Claims,
    authz,
    crud::assets,
    enums::{Action, CurrencyCode, EntityKind},
    error::{api_error, get_db_conn, ApiError, ApiResult, Error},
    models::{Asset, AssetChanges, AuditEntry, NewAsset},
    pagination::{PaginationMeta, PaginationParams},
    AppState,
};

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateAssetRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    #[schema(example = "ARRI Alexa Mini")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "AM-20931")]
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub owner_id: Option<i32>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    #[schema(example = 4500000)]
    pub purchase_price_cents: Option<i64>,
    pub currency: Option<CurrencyCode>,
}

impl From<CreateAssetRequest> for NewAsset {
    fn from(req: CreateAssetRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            serial_number: req.serial_number,
            category_id: req.category_id,
            location_id: req.location_id,
            owner_id: req.owner_id,
            purchase_price_cents: req.purchase_price_cents,
            currency: req.currency,
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateAssetRequest {
    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub owner_id: Option<i32>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub purchase_price_cents: Option<i64>,
    pub currency: Option<CurrencyCode>,
}

impl From<UpdateAssetRequest> for AssetChanges {
    fn from(req: UpdateAssetRequest) -> Self {
        Self {
            name: req.name,
            description: req.description,
            serial_number: req.serial_number,
            category_id: req.category_id,
            location_id: req.location_id,
            owner_id: req.owner_id,
            purchase_price_cents: req.purchase_price_cents,
            currency: req.currency,
        }
    }
}

/// Optional note stored on the archive or restore entry.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ArchivalNote {
    #[schema(example = "Sensor damaged on set")]
    pub details: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetResponse {
    pub asset: Asset,
    pub archived: bool,
    pub latest_audit: Option<AuditEntry>,
}

impl From<AuditedRecord<Asset>> for AssetResponse {
    fn from(record: AuditedRecord<Asset>) -> Self {
        Self {
            archived: record.is_archived(),
            asset: record.record,
            latest_audit: record.latest_audit,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AssetListResponse {
    pub data: Vec<AssetResponse>,
    pub pagination: PaginationMeta,
}

fn archival_filter(params: &ArchivalParams) -> ApiResult<ArchivalFilter> {
    params.filter().map_err(|e| api_error(e.into()))
}

/// Loads the asset with its latest entry, whatever its archival state.
fn load(conn: &mut crate::DbConn, asset_id: i32) -> ApiResult<AssetResponse> {
    assets::by_id(conn, asset_id, ArchivalFilter::IncludeArchived)
        .map_err(api_error)?
        .map(AssetResponse::from)
        .ok_or_else(|| api_error(Error::not_found("asset", asset_id)))
}

#[utoipa::path(
    get,
    path = "/assets",
    tag = "Assets",
    params(ArchivalParams, PaginationParams),
    responses(
        (status = 200, description = "Assets visible under the archival filter", body = AssetListResponse),
        (status = 400, description = "Conflicting archival flags", body = ApiError),
        (status = 403, description = "Missing can_view_archived_assets", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_assets(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(archival): Query<ArchivalParams>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<AssetListResponse>> {
    let filter = archival_filter(&archival)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    let records = assets::list_for(&mut conn, claims.user_id, filter).map_err(api_error)?;
    let (page, meta) = pagination.page_of(records);

    Ok(Json(AssetListResponse {
        data: page.into_iter().map(AssetResponse::from).collect(),
        pagination: meta,
    }))
}

#[utoipa::path(
    get,
    path = "/assets/{asset_id}",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID"), ArchivalParams),
    responses(
        (status = 200, description = "Asset found", body = AssetResponse),
        (status = 403, description = "Missing can_view_archived_assets", body = ApiError),
        (status = 404, description = "Asset not found under the archival filter", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
    Query(archival): Query<ArchivalParams>,
) -> ApiResult<Json<AssetResponse>> {
    let filter = archival_filter(&archival)?;
    let mut conn = get_db_conn(&state.db_pool)?;

    assets::by_id_for(&mut conn, claims.user_id, asset_id, filter)
        .map_err(api_error)?
        .map(|record| Json(record.into()))
        .ok_or_else(|| api_error(Error::not_found("asset", asset_id)))
}

#[utoipa::path(
    post,
    path = "/assets",
    tag = "Assets",
    request_body = CreateAssetRequest,
    responses(
        (status = 201, description = "Asset created", body = AssetResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Missing can_create_assets", body = ApiError),
        (status = 404, description = "Category, location or owner not found", body = ApiError),
        (status = 409, description = "Serial number already registered", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateAssetRequest>,
) -> ApiResult<(StatusCode, Json<AssetResponse>)> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(&mut conn, claims.user_id, EntityKind::Asset, Action::Create)
        .map_err(api_error)?;

    let asset = assets::create(&mut conn, Some(claims.user_id), &payload.into())
        .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(load(&mut conn, asset.id)?)))
}

#[utoipa::path(
    put,
    path = "/assets/{asset_id}",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID")),
    request_body = UpdateAssetRequest,
    responses(
        (status = 200, description = "Asset updated", body = AssetResponse),
        (status = 400, description = "Validation error", body = ApiError),
        (status = 403, description = "Missing can_update_assets", body = ApiError),
        (status = 404, description = "Asset, category, location or owner not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
    Json(payload): Json<UpdateAssetRequest>,
) -> ApiResult<Json<AssetResponse>> {
    if let Err(e) = payload.validate() {
        return Err(ApiError::bad_request(
            format!("Validation error: {}", e),
            "VALIDATION_ERROR",
        ));
    }

    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(&mut conn, claims.user_id, EntityKind::Asset, Action::Update)
        .map_err(api_error)?;

    let changes: AssetChanges = payload.into();
    assets::update(&mut conn, Some(claims.user_id), asset_id, &changes).map_err(api_error)?;

    Ok(Json(load(&mut conn, asset_id)?))
}

#[utoipa::path(
    delete,
    path = "/assets/{asset_id}",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 204, description = "Asset deleted"),
        (status = 403, description = "Missing can_delete_assets", body = ApiError),
        (status = 404, description = "Asset not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
) -> ApiResult<StatusCode> {
    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(&mut conn, claims.user_id, EntityKind::Asset, Action::Delete)
        .map_err(api_error)?;

    assets::delete(&mut conn, Some(claims.user_id), asset_id).map_err(api_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/assets/{asset_id}/archive",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID")),
    request_body(content = ArchivalNote, description = "Optional note for the audit entry"),
    responses(
        (status = 200, description = "Asset archived", body = AuditEntry),
        (status = 403, description = "Missing can_archive_assets", body = ApiError),
        (status = 404, description = "Asset not found", body = ApiError),
        (status = 409, description = "Asset is already archived", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn archive_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
    note: Option<Json<ArchivalNote>>,
) -> ApiResult<Json<AuditEntry>> {
    let note = note.map(|Json(n)| n).unwrap_or_default();
    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(&mut conn, claims.user_id, EntityKind::Asset, Action::Archive)
        .map_err(api_error)?;

    let entry = assets::archive(
        &mut conn,
        Some(claims.user_id),
        asset_id,
        note.details.as_deref(),
    )
    .map_err(api_error)?;

    info!(asset_id = asset_id, user_id = claims.user_id, "Asset archived");
    Ok(Json(entry))
}

/// Restoring is gated by the same permission as archiving.
#[utoipa::path(
    post,
    path = "/assets/{asset_id}/restore",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID")),
    request_body(content = ArchivalNote, description = "Optional note for the audit entry"),
    responses(
        (status = 200, description = "Asset restored", body = AuditEntry),
        (status = 403, description = "Missing can_archive_assets", body = ApiError),
        (status = 404, description = "Asset not found", body = ApiError),
        (status = 409, description = "Asset is not archived", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn restore_asset(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
    note: Option<Json<ArchivalNote>>,
) -> ApiResult<Json<AuditEntry>> {
    let note = note.map(|Json(n)| n).unwrap_or_default();
    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(&mut conn, claims.user_id, EntityKind::Asset, Action::Archive)
        .map_err(api_error)?;

    let entry = assets::restore(
        &mut conn,
        Some(claims.user_id),
        asset_id,
        note.details.as_deref(),
    )
    .map_err(api_error)?;

    info!(asset_id = asset_id, user_id = claims.user_id, "Asset restored");
    Ok(Json(entry))
}

/// Full audit trail of an asset, newest first. The trail of an archived
/// asset needs the same permission as reading the asset itself.
#[utoipa::path(
    get,
    path = "/assets/{asset_id}/history",
    tag = "Assets",
    params(("asset_id" = i32, Path, description = "Asset ID")),
    responses(
        (status = 200, description = "Audit entries, newest first", body = Vec<AuditEntry>),
        (status = 403, description = "Missing can_view_archived_assets", body = ApiError),
        (status = 404, description = "Asset has no history", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn asset_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(asset_id): Path<i32>,
) -> ApiResult<Json<Vec<AuditEntry>>> {
    let mut conn = get_db_conn(&state.db_pool)?;

    let entries = assets::history(&mut conn, asset_id).map_err(api_error)?;
    let Some(latest) = entries.first() else {
        return Err(api_error(Error::not_found("asset", asset_id)));
    };
    if latest.archived {
        authz::require_action(
            &mut conn,
            claims.user_id,
            EntityKind::Asset,
            Action::ViewArchived,
        )
        .map_err(api_error)?;
    }

    Ok(Json(entries))
}
