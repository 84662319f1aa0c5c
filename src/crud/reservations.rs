//! Reservations hold an asset for a time window and move through
//! reserved → checked_out → returned, or reserved → cancelled.

use chrono::NaiveDateTime;
use diesel::prelude::*;
use tracing::info;

use super::{assets, set_archived, users};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::enums::{EntityKind, ReservationStatus};
use crate::error::{Error, Result, ValidationError};
use crate::models::{AuditEntry, NewReservation, Reservation};
use crate::schema::reservations;
use crate::telemetry::record_reservation_change;
use crate::DbConn;

const KIND: EntityKind = EntityKind::Reservation;

/// Request to hold an asset. New reservations always start as `reserved`.
#[derive(Debug, Clone)]
pub struct ReservationRequest {
    pub asset_id: i32,
    pub user_id: i32,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub notes: Option<String>,
}

pub fn create(
    conn: &mut DbConn,
    actor: Option<i32>,
    request: ReservationRequest,
) -> Result<Reservation> {
    if request.starts_at >= request.ends_at {
        return Err(ValidationError::ReservationWindow.into());
    }

    let reservation = conn.transaction::<_, Error, _>(|conn| {
        if assets::by_id(conn, request.asset_id, ArchivalFilter::ActiveOnly)?.is_none() {
            return match assets::by_id(conn, request.asset_id, ArchivalFilter::ArchivedOnly)? {
                Some(_) => Err(Error::Conflict(format!(
                    "asset {} is archived",
                    request.asset_id
                ))),
                None => Err(Error::not_found("asset", request.asset_id)),
            };
        }

        match users::by_id(conn, request.user_id, ArchivalFilter::IncludeArchived)? {
            None => return Err(Error::not_found("user", request.user_id)),
            Some(user) if user.is_archived() => {
                return Err(Error::Conflict(format!(
                    "user {} is archived",
                    request.user_id
                )));
            }
            Some(_) => {}
        }

        let clashes = overlapping(conn, request.asset_id, request.starts_at, request.ends_at)?;
        if let Some(clash) = clashes.first() {
            return Err(Error::Conflict(format!(
                "asset {} is already reserved from {} to {} (reservation {})",
                request.asset_id, clash.record.starts_at, clash.record.ends_at, clash.record.id
            )));
        }

        let new_reservation = NewReservation {
            asset_id: request.asset_id,
            user_id: request.user_id,
            starts_at: request.starts_at,
            ends_at: request.ends_at,
            status: ReservationStatus::Reserved,
            notes: request.notes,
        };

        audit::create_audited(conn, actor, None, |conn| {
            Ok(diesel::insert_into(reservations::table)
                .values(&new_reservation)
                .get_result::<Reservation>(conn)?)
        })
    })?;

    record_reservation_change(reservation.status);
    info!(
        reservation_id = reservation.id,
        asset_id = reservation.asset_id,
        user_id = reservation.user_id,
        "Reserved asset"
    );
    Ok(reservation)
}

/// Active, non-archived reservations of `asset_id` whose window intersects
/// `[starts_at, ends_at)`.
pub fn overlapping(
    conn: &mut DbConn,
    asset_id: i32,
    starts_at: NaiveDateTime,
    ends_at: NaiveDateTime,
) -> Result<Vec<AuditedRecord<Reservation>>> {
    let rows = audit_join!(reservations, KIND)
        .filter(reservations::asset_id.eq(asset_id))
        .filter(
            reservations::status
                .eq_any(vec![ReservationStatus::Reserved, ReservationStatus::CheckedOut]),
        )
        .filter(reservations::starts_at.lt(ends_at))
        .filter(reservations::ends_at.gt(starts_at))
        .order(reservations::starts_at.asc())
        .load::<(Reservation, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, ArchivalFilter::ActiveOnly))
}

pub fn by_id(
    conn: &mut DbConn,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<Reservation>>> {
    let rows = audit_join!(reservations, KIND)
        .filter(reservations::id.eq(id))
        .load::<(Reservation, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn list(
    conn: &mut DbConn,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<Reservation>>> {
    let rows = audit_join!(reservations, KIND)
        .order((reservations::starts_at.asc(), reservations::id.asc()))
        .load::<(Reservation, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn list_for_asset(
    conn: &mut DbConn,
    asset_id: i32,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<Reservation>>> {
    let rows = audit_join!(reservations, KIND)
        .filter(reservations::asset_id.eq(asset_id))
        .order((reservations::starts_at.asc(), reservations::id.asc()))
        .load::<(Reservation, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

/// Moves a reservation to `next`, recording the change as an update entry.
pub fn transition(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    next: ReservationStatus,
) -> Result<Reservation> {
    let updated = conn.transaction::<_, Error, _>(|conn| {
        let current = reservations::table
            .find(id)
            .first::<Reservation>(conn)
            .optional()?
            .ok_or_else(|| Error::not_found("reservation", id))?;

        if !current.status.can_transition_to(next) {
            return Err(ValidationError::StatusTransition {
                from: current.status.to_string(),
                to: next.to_string(),
            }
            .into());
        }

        let details = format!("status {} -> {}", current.status, next);
        audit::update_audited(conn, actor, Some(&details), |conn| {
            Ok(diesel::update(reservations::table.find(id))
                .set(reservations::status.eq(next))
                .get_result::<Reservation>(conn)
                .optional()?)
        })?
        .ok_or_else(|| Error::not_found("reservation", id))
    })?;

    record_reservation_change(next);
    info!(reservation_id = id, status = %next, actor = ?actor, "Reservation status changed");
    Ok(updated)
}

pub fn check_out(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<Reservation> {
    transition(conn, actor, id, ReservationStatus::CheckedOut)
}

pub fn check_in(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<Reservation> {
    transition(conn, actor, id, ReservationStatus::Returned)
}

pub fn cancel(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<Reservation> {
    transition(conn, actor, id, ReservationStatus::Cancelled)
}

/// Replaces the free-text notes. `None` clears them.
pub fn update_notes(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    notes: Option<&str>,
) -> Result<Reservation> {
    audit::update_audited(conn, actor, None, |conn| {
        Ok(diesel::update(reservations::table.find(id))
            .set(reservations::notes.eq(notes))
            .get_result::<Reservation>(conn)
            .optional()?)
    })?
    .ok_or_else(|| Error::not_found("reservation", id))
}

fn exists(conn: &mut DbConn, id: i32) -> Result<bool> {
    let found = reservations::table
        .find(id)
        .select(reservations::id)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("reservation", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, true)
}

pub fn restore(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("reservation", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, false)
}

pub fn delete(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<()> {
    let deleted = audit::delete_audited(conn, KIND, AuditReference::Id(id), actor, None, |conn| {
        Ok(diesel::delete(reservations::table.find(id)).execute(conn)?)
    })?;

    if deleted {
        Ok(())
    } else {
        Err(Error::not_found("reservation", id))
    }
}
