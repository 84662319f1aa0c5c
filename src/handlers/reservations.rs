//! Reservation endpoints.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::{
    audit::{ArchivalFilter, ArchivalParams, AuditedRecord},
    auth::Claims,
    authz,
    crud::reservations::{self, ReservationRequest},
    enums::{Action, EntityKind, ReservationStatus},
    error::{api_error, get_db_conn, ApiError, ApiResult, Error},
    models::Reservation,
    pagination::{PaginationMeta, PaginationParams},
    AppState, DbConn,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReservationRequest {
    #[schema(example = 42)]
    pub asset_id: i32,
    /// Who the asset is held for. Defaults to the caller; anyone else needs
    /// `can_update_reservations`.
    pub user_id: Option<i32>,
    #[schema(value_type = String, example = "2024-07-01T08:00:00")]
    pub starts_at: NaiveDateTime,
    #[schema(value_type = String, example = "2024-07-03T18:00:00")]
    pub ends_at: NaiveDateTime,
    #[schema(example = "Second unit, day exteriors")]
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ReservationQuery {
    /// Only reservations of this asset
    pub asset_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationResponse {
    pub reservation: Reservation,
    pub archived: bool,
}

impl From<AuditedRecord<Reservation>> for ReservationResponse {
    fn from(record: AuditedRecord<Reservation>) -> Self {
        Self {
            archived: record.is_archived(),
            reservation: record.record,
        }
    }
}

impl From<Reservation> for ReservationResponse {
    fn from(reservation: Reservation) -> Self {
        Self {
            reservation,
            archived: false,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReservationListResponse {
    pub data: Vec<ReservationResponse>,
    pub pagination: PaginationMeta,
}

#[utoipa::path(
    get,
    path = "/reservations",
    tag = "Reservations",
    params(ReservationQuery, ArchivalParams, PaginationParams),
    responses(
        (status = 200, description = "Reservations visible under the archival filter", body = ReservationListResponse),
        (status = 400, description = "Conflicting archival flags", body = ApiError),
        (status = 403, description = "Missing can_view_archived_reservations", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_reservations(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<ReservationQuery>,
    Query(archival): Query<ArchivalParams>,
    Query(pagination): Query<PaginationParams>,
) -> ApiResult<Json<ReservationListResponse>> {
    let filter = archival.filter().map_err(|e| api_error(e.into()))?;
    let mut conn = get_db_conn(&state.db_pool)?;

    if filter.reaches_archived() {
        authz::require_action(
            &mut conn,
            claims.user_id,
            EntityKind::Reservation,
            Action::ViewArchived,
        )
        .map_err(api_error)?;
    }

    let records = match query.asset_id {
        Some(asset_id) => reservations::list_for_asset(&mut conn, asset_id, filter),
        None => reservations::list(&mut conn, filter),
    }
    .map_err(api_error)?;
    let (page, meta) = pagination.page_of(records);

    Ok(Json(ReservationListResponse {
        data: page.into_iter().map(ReservationResponse::from).collect(),
        pagination: meta,
    }))
}

#[utoipa::path(
    post,
    path = "/reservations",
    tag = "Reservations",
    request_body = CreateReservationRequest,
    responses(
        (status = 201, description = "Asset reserved", body = ReservationResponse),
        (status = 400, description = "Window ends before it starts", body = ApiError),
        (status = 403, description = "Missing can_create_reservations, or can_update_reservations when reserving for another user", body = ApiError),
        (status = 404, description = "Asset or user not found", body = ApiError),
        (status = 409, description = "Asset or user archived, or asset already reserved for the window", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateReservationRequest>,
) -> ApiResult<(StatusCode, Json<ReservationResponse>)> {
    let mut conn = get_db_conn(&state.db_pool)?;
    authz::require_action(
        &mut conn,
        claims.user_id,
        EntityKind::Reservation,
        Action::Create,
    )
    .map_err(api_error)?;

    // Holding an asset for someone else needs the update permission too.
    let user_id = payload.user_id.unwrap_or(claims.user_id);
    if user_id != claims.user_id {
        authz::require_action(
            &mut conn,
            claims.user_id,
            EntityKind::Reservation,
            Action::Update,
        )
        .map_err(api_error)?;
    }

    let reservation = reservations::create(
        &mut conn,
        Some(claims.user_id),
        ReservationRequest {
            asset_id: payload.asset_id,
            user_id,
            starts_at: payload.starts_at,
            ends_at: payload.ends_at,
            notes: payload.notes,
        },
    )
    .map_err(api_error)?;

    Ok((StatusCode::CREATED, Json(reservation.into())))
}

/// Moves the reservation to `next` after checking the caller may.
///
/// The reserving user may cancel their own reservation; anything else needs
/// `can_update_reservations`.
fn transition_as(
    conn: &mut DbConn,
    claims: &Claims,
    reservation_id: i32,
    next: ReservationStatus,
) -> ApiResult<ReservationResponse> {
    let current = reservations::by_id(conn, reservation_id, ArchivalFilter::ActiveOnly)
        .map_err(api_error)?
        .ok_or_else(|| api_error(Error::not_found("reservation", reservation_id)))?;

    let own_cancellation =
        next == ReservationStatus::Cancelled && current.record.user_id == claims.user_id;
    if !own_cancellation {
        authz::require_action(
            conn,
            claims.user_id,
            EntityKind::Reservation,
            Action::Update,
        )
        .map_err(api_error)?;
    }

    let updated = reservations::transition(conn, Some(claims.user_id), reservation_id, next)
        .map_err(api_error)?;
    Ok(updated.into())
}

#[utoipa::path(
    post,
    path = "/reservations/{reservation_id}/checkout",
    tag = "Reservations",
    params(("reservation_id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Asset checked out", body = ReservationResponse),
        (status = 400, description = "Reservation is not in the reserved state", body = ApiError),
        (status = 403, description = "Missing can_update_reservations", body = ApiError),
        (status = 404, description = "Reservation not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn check_out_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reservation_id): Path<i32>,
) -> ApiResult<Json<ReservationResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    transition_as(
        &mut conn,
        &claims,
        reservation_id,
        ReservationStatus::CheckedOut,
    )
    .map(Json)
}

#[utoipa::path(
    post,
    path = "/reservations/{reservation_id}/return",
    tag = "Reservations",
    params(("reservation_id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Asset returned", body = ReservationResponse),
        (status = 400, description = "Reservation is not checked out", body = ApiError),
        (status = 403, description = "Missing can_update_reservations", body = ApiError),
        (status = 404, description = "Reservation not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn return_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reservation_id): Path<i32>,
) -> ApiResult<Json<ReservationResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    transition_as(&mut conn, &claims, reservation_id, ReservationStatus::Returned).map(Json)
}

#[utoipa::path(
    post,
    path = "/reservations/{reservation_id}/cancel",
    tag = "Reservations",
    params(("reservation_id" = i32, Path, description = "Reservation ID")),
    responses(
        (status = 200, description = "Reservation cancelled", body = ReservationResponse),
        (status = 400, description = "Reservation can no longer be cancelled", body = ApiError),
        (status = 403, description = "Not the reserving user and missing can_update_reservations", body = ApiError),
        (status = 404, description = "Reservation not found", body = ApiError)
    ),
    security(("bearer_auth" = []))
)]
pub async fn cancel_reservation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(reservation_id): Path<i32>,
) -> ApiResult<Json<ReservationResponse>> {
    let mut conn = get_db_conn(&state.db_pool)?;
    transition_as(&mut conn, &claims, reservation_id, ReservationStatus::Cancelled).map(Json)
}
