use diesel::prelude::*;
use tracing::info;

use super::{require_text, set_archived};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::enums::EntityKind;
use crate::error::{Error, Result, ValidationError};
use crate::models::{AuditEntry, Location, LocationChanges, NewLocation};
use crate::schema::locations;
use crate::DbConn;

const KIND: EntityKind = EntityKind::Location;

impl LocationChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.address.is_none()
            && self.city.is_none()
            && self.state_code.is_none()
            && self.country_code.is_none()
            && self.timezone.is_none()
    }
}

/// Region codes are stored upper-case: `ca` and `CA` are the same state.
fn check_codes(
    state_code: &mut Option<String>,
    country_code: &mut Option<String>,
) -> Result<()> {
    if let Some(code) = country_code {
        if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::Invalid {
                field: "country_code",
                reason: "must be two ISO 3166 letters",
            }
            .into());
        }
        *code = code.to_ascii_uppercase();
    }
    if let Some(code) = state_code {
        require_text("state_code", code)?;
        *code = code.trim().to_ascii_uppercase();
    }
    Ok(())
}

pub fn create(conn: &mut DbConn, actor: Option<i32>, new_location: NewLocation) -> Result<Location> {
    let mut new_location = new_location;
    require_text("name", &new_location.name)?;
    check_codes(&mut new_location.state_code, &mut new_location.country_code)?;

    let location = audit::create_audited(conn, actor, None, |conn| {
        Ok(diesel::insert_into(locations::table)
            .values(&new_location)
            .get_result::<Location>(conn)?)
    })?;

    info!(location_id = location.id, name = %location.name, "Created location");
    Ok(location)
}

pub fn by_id(
    conn: &mut DbConn,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<Location>>> {
    let rows = audit_join!(locations, KIND)
        .filter(locations::id.eq(id))
        .load::<(Location, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn list(conn: &mut DbConn, filter: ArchivalFilter) -> Result<Vec<AuditedRecord<Location>>> {
    let rows = audit_join!(locations, KIND)
        .order(locations::name.asc())
        .load::<(Location, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn update(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    changes: LocationChanges,
) -> Result<Location> {
    let mut changes = changes;
    if changes.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }
    if let Some(name) = &changes.name {
        require_text("name", name)?;
    }
    check_codes(&mut changes.state_code, &mut changes.country_code)?;

    audit::update_audited(conn, actor, None, |conn| {
        Ok(diesel::update(locations::table.find(id))
            .set(&changes)
            .get_result::<Location>(conn)
            .optional()?)
    })?
    .ok_or_else(|| Error::not_found("location", id))
}

fn exists(conn: &mut DbConn, id: i32) -> Result<bool> {
    let found = locations::table
        .find(id)
        .select(locations::id)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("location", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, true)
}

pub fn restore(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("location", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, false)
}

pub fn delete(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<()> {
    let deleted = audit::delete_audited(conn, KIND, AuditReference::Id(id), actor, None, |conn| {
        Ok(diesel::delete(locations::table.find(id)).execute(conn)?)
    })?;

    if deleted {
        Ok(())
    } else {
        Err(Error::not_found("location", id))
    }
}
