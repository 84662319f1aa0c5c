use diesel::prelude::*;
use tracing::info;

use super::{conflict_on_unique, files, require_text, reservations, set_archived};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::authz;
use crate::enums::{Action, EntityKind};
use crate::error::{Error, Result, ValidationError};
use crate::models::{Asset, AssetChanges, AuditEntry, NewAsset};
use crate::schema::{
    assets, categories, files as file_rows, locations, reservations as reservation_rows, users,
};
use crate::DbConn;

const KIND: EntityKind = EntityKind::Asset;

impl AssetChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.serial_number.is_none()
            && self.category_id.is_none()
            && self.location_id.is_none()
            && self.owner_id.is_none()
            && self.purchase_price_cents.is_none()
            && self.currency.is_none()
    }
}

/// Fails with `NotFound` naming the first referenced category, location or
/// owner that does not exist.
fn check_references(
    conn: &mut DbConn,
    category_id: Option<i32>,
    location_id: Option<i32>,
    owner_id: Option<i32>,
) -> Result<()> {
    if let Some(id) = category_id {
        categories::table
            .find(id)
            .select(categories::id)
            .first::<i32>(conn)
            .optional()?
            .ok_or_else(|| Error::not_found("category", id))?;
    }
    if let Some(id) = location_id {
        locations::table
            .find(id)
            .select(locations::id)
            .first::<i32>(conn)
            .optional()?
            .ok_or_else(|| Error::not_found("location", id))?;
    }
    if let Some(id) = owner_id {
        users::table
            .find(id)
            .select(users::id)
            .first::<i32>(conn)
            .optional()?
            .ok_or_else(|| Error::not_found("user", id))?;
    }
    Ok(())
}

pub fn create(conn: &mut DbConn, actor: Option<i32>, new_asset: &NewAsset) -> Result<Asset> {
    require_text("name", &new_asset.name)?;

    let asset = audit::create_audited(conn, actor, None, |conn| {
        check_references(
            conn,
            new_asset.category_id,
            new_asset.location_id,
            new_asset.owner_id,
        )?;
        diesel::insert_into(assets::table)
            .values(new_asset)
            .get_result::<Asset>(conn)
            .map_err(|e| conflict_on_unique(e, "serial number is already registered"))
    })?;

    info!(asset_id = asset.id, name = %asset.name, actor = ?actor, "Created asset");
    Ok(asset)
}

pub fn by_id(
    conn: &mut DbConn,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<Asset>>> {
    let rows = audit_join!(assets, KIND)
        .filter(assets::id.eq(id))
        .load::<(Asset, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn list(conn: &mut DbConn, filter: ArchivalFilter) -> Result<Vec<AuditedRecord<Asset>>> {
    let rows = audit_join!(assets, KIND)
        .order(assets::id.asc())
        .load::<(Asset, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

fn ensure_may_view(conn: &mut DbConn, viewer: i32, filter: ArchivalFilter) -> Result<()> {
    if filter.reaches_archived() {
        authz::require_action(conn, viewer, KIND, Action::ViewArchived)?;
    }
    Ok(())
}

/// [`by_id`] on behalf of `viewer`. Reading archived assets needs
/// `can_view_archived_assets`; lacking it is `PermissionDenied`, not `None`.
pub fn by_id_for(
    conn: &mut DbConn,
    viewer: i32,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<Asset>>> {
    ensure_may_view(conn, viewer, filter)?;
    by_id(conn, id, filter)
}

pub fn list_for(
    conn: &mut DbConn,
    viewer: i32,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<Asset>>> {
    ensure_may_view(conn, viewer, filter)?;
    list(conn, filter)
}

pub fn update(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    changes: &AssetChanges,
) -> Result<Asset> {
    if changes.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }
    if let Some(name) = &changes.name {
        require_text("name", name)?;
    }

    audit::update_audited(conn, actor, None, |conn| {
        check_references(conn, changes.category_id, changes.location_id, changes.owner_id)?;
        diesel::update(assets::table.find(id))
            .set(changes)
            .get_result::<Asset>(conn)
            .optional()
            .map_err(|e| conflict_on_unique(e, "serial number is already registered"))
    })?
    .ok_or_else(|| Error::not_found("asset", id))
}

fn exists(conn: &mut DbConn, id: i32) -> Result<bool> {
    let found = assets::table
        .find(id)
        .select(assets::id)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    details: Option<&str>,
) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("asset", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, details, true)
}

pub fn restore(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    details: Option<&str>,
) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("asset", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, details, false)
}

/// Removes the row for good. Its audit history stays behind, closed by a
/// `delete` entry. Reservations of the asset are deleted with their own
/// `delete` entries and attached files are detached first.
pub fn delete(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<()> {
    let deleted = audit::delete_audited(conn, KIND, AuditReference::Id(id), actor, None, |conn| {
        let held = reservation_rows::table
            .filter(reservation_rows::asset_id.eq(id))
            .select(reservation_rows::id)
            .load::<i32>(conn)?;
        for reservation_id in held {
            reservations::delete(conn, actor, reservation_id)?;
        }

        let attached = file_rows::table
            .filter(file_rows::asset_id.eq(id))
            .select(file_rows::hash)
            .load::<String>(conn)?;
        for hash in attached {
            files::attach(conn, actor, &hash, None)?;
        }

        Ok(diesel::delete(assets::table.find(id)).execute(conn)?)
    })?;

    if !deleted {
        return Err(Error::not_found("asset", id));
    }
    info!(asset_id = id, actor = ?actor, "Deleted asset");
    Ok(())
}

/// Every audit entry for the asset, newest first.
pub fn history(conn: &mut DbConn, id: i32) -> Result<Vec<AuditEntry>> {
    audit::history(conn, KIND, &AuditReference::Id(id))
}
