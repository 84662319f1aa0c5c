//! Per-entity create/read/update/archive/delete helpers.
//!
//! Every helper takes an explicit connection. Mutations write their audit
//! entry in the same transaction; reads return `Ok(None)` for a missing
//! record and leave `Error::NotFound` to mutations that need a target.

pub mod assets;
pub mod categories;
pub mod files;
pub mod locations;
pub mod reservations;
pub mod roles;
pub mod users;

use diesel::prelude::*;
use diesel::result::DatabaseErrorKind;

use crate::audit::{self, AuditReference};
use crate::enums::EntityKind;
use crate::error::{Error, Result, ValidationError};
use crate::models::AuditEntry;
use crate::DbConn;

/// Turns a unique-constraint violation into [`Error::Conflict`].
pub(crate) fn conflict_on_unique(err: diesel::result::Error, message: &str) -> Error {
    match err {
        diesel::result::Error::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
            Error::Conflict(message.to_string())
        }
        other => Error::Database(other),
    }
}

pub(crate) fn require_text(field: &'static str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Blank { field }.into());
    }
    Ok(())
}

/// Archives or restores an existing entity. Repeating the current state is a
/// conflict rather than a silent second entry.
pub(crate) fn set_archived(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: AuditReference,
    actor: Option<i32>,
    details: Option<&str>,
    archived: bool,
) -> Result<AuditEntry> {
    conn.transaction::<_, Error, _>(|conn| {
        let latest = audit::latest_entry(conn, kind, &reference)?;
        if latest.as_ref().is_some_and(|e| e.archived) == archived {
            let state = if archived { "archived" } else { "active" };
            return Err(Error::Conflict(format!(
                "{} {} is already {}",
                kind, reference, state
            )));
        }

        if archived {
            audit::archive(conn, kind, reference, actor, details)
        } else {
            audit::restore(conn, kind, reference, actor, details)
        }
    })
}
