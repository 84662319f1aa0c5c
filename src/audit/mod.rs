//! Audit trail and archival.
//!
//! Entities are never flagged as archived in their own rows. Every lifecycle
//! event appends an [`AuditEntry`], and the newest entry for an entity decides
//! whether it is archived. The helpers here write those entries inside the
//! same transaction as the change they describe.

pub mod filter;
pub mod join;

use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use std::fmt;
use tracing::{debug, info};

use crate::enums::{AuditOperation, EntityKind};
use crate::error::{Error, Result, ValidationError};
use crate::models::{AuditEntry, NewAuditEntry};
use crate::schema::audit_entries;
use crate::telemetry::record_audit_entry;
use crate::DbConn;

pub use filter::{ArchivalFilter, ArchivalParams};
pub use join::{latest_per_entity, AuditedRecord};

/// A record whose lifecycle is tracked in `audit_entries`.
pub trait Audited {
    const KIND: EntityKind;

    fn audit_reference(&self) -> AuditReference;
}

/// How an audit entry points at its entity: by integer id or, for
/// content-addressed records, by hash. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AuditReference {
    Id(i32),
    Hash(String),
}

impl AuditReference {
    pub fn from_parts(
        id: Option<i32>,
        hash: Option<String>,
    ) -> std::result::Result<Self, ValidationError> {
        match (id, hash) {
            (Some(id), None) => Ok(AuditReference::Id(id)),
            (None, Some(hash)) => Ok(AuditReference::Hash(hash)),
            _ => Err(ValidationError::AuditReference),
        }
    }

    pub fn into_parts(self) -> (Option<i32>, Option<String>) {
        match self {
            AuditReference::Id(id) => (Some(id), None),
            AuditReference::Hash(hash) => (None, Some(hash)),
        }
    }
}

impl fmt::Display for AuditReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditReference::Id(id) => write!(f, "{}", id),
            AuditReference::Hash(hash) => f.write_str(hash),
        }
    }
}

pub(crate) fn now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

impl NewAuditEntry {
    pub fn new(
        operation: AuditOperation,
        entity_kind: EntityKind,
        reference: AuditReference,
        actor: Option<i32>,
    ) -> Self {
        let (entity_id, entity_hash) = reference.into_parts();
        Self {
            operation,
            entity_kind,
            entity_id,
            entity_hash,
            details: None,
            created_by: actor,
            created_at: now(),
            archived: false,
            archived_at: None,
        }
    }

    pub fn with_details(mut self, details: Option<&str>) -> Self {
        self.details = details.map(str::to_string);
        self
    }

    /// Overrides the creation time. Ordering between entries of one entity is
    /// decided by this timestamp, then by row id.
    pub fn at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = created_at;
        self
    }

    pub fn archived_since(mut self, archived_at: NaiveDateTime) -> Self {
        self.archived = true;
        self.archived_at = Some(archived_at);
        self
    }

    /// Copies the archival state of `previous` so that a plain edit does not
    /// change whether the entity is archived.
    pub fn carrying(mut self, previous: Option<&AuditEntry>) -> Self {
        if let Some(previous) = previous {
            self.archived = previous.archived;
            self.archived_at = previous.archived_at;
        }
        self
    }
}

/// Appends one entry. Callers that also change the entity must do so in the
/// same transaction.
pub fn record(conn: &mut DbConn, entry: &NewAuditEntry) -> Result<AuditEntry> {
    let saved: AuditEntry = diesel::insert_into(audit_entries::table)
        .values(entry)
        .get_result(conn)?;

    record_audit_entry(saved.operation, saved.entity_kind);
    debug!(
        audit_id = saved.id,
        operation = %saved.operation,
        entity_kind = %saved.entity_kind,
        archived = saved.archived,
        "Recorded audit entry"
    );
    Ok(saved)
}

/// Newest entry for one entity, if it has any history.
pub fn latest_entry(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: &AuditReference,
) -> Result<Option<AuditEntry>> {
    let entry = match reference {
        AuditReference::Id(id) => audit_entries::table
            .filter(audit_entries::entity_kind.eq(kind))
            .filter(audit_entries::entity_id.eq(*id))
            .order((audit_entries::created_at.desc(), audit_entries::id.desc()))
            .first::<AuditEntry>(conn)
            .optional()?,
        AuditReference::Hash(hash) => audit_entries::table
            .filter(audit_entries::entity_kind.eq(kind))
            .filter(audit_entries::entity_hash.eq(hash.as_str()))
            .order((audit_entries::created_at.desc(), audit_entries::id.desc()))
            .first::<AuditEntry>(conn)
            .optional()?,
    };
    Ok(entry)
}

/// Full history of one entity, newest first.
pub fn history(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: &AuditReference,
) -> Result<Vec<AuditEntry>> {
    let entries = match reference {
        AuditReference::Id(id) => audit_entries::table
            .filter(audit_entries::entity_kind.eq(kind))
            .filter(audit_entries::entity_id.eq(*id))
            .order((audit_entries::created_at.desc(), audit_entries::id.desc()))
            .load::<AuditEntry>(conn)?,
        AuditReference::Hash(hash) => audit_entries::table
            .filter(audit_entries::entity_kind.eq(kind))
            .filter(audit_entries::entity_hash.eq(hash.as_str()))
            .order((audit_entries::created_at.desc(), audit_entries::id.desc()))
            .load::<AuditEntry>(conn)?,
    };
    Ok(entries)
}

/// Inserts a record and its `create` entry as one unit of work.
///
/// `insert` must return the stored row (with its generated key); if it or the
/// audit insert fails, neither row is kept.
pub fn create_audited<T, F>(
    conn: &mut DbConn,
    actor: Option<i32>,
    details: Option<&str>,
    insert: F,
) -> Result<T>
where
    T: Audited,
    F: FnOnce(&mut DbConn) -> Result<T>,
{
    conn.transaction::<_, Error, _>(|conn| {
        let created = insert(conn)?;
        let entry = NewAuditEntry::new(
            AuditOperation::Create,
            T::KIND,
            created.audit_reference(),
            actor,
        )
        .with_details(details);
        record(conn, &entry)?;
        Ok(created)
    })
}

/// Applies an edit and appends an `update` entry that keeps the current
/// archival state. Returns `None` when `apply` found nothing to edit.
pub fn update_audited<T, F>(
    conn: &mut DbConn,
    actor: Option<i32>,
    details: Option<&str>,
    apply: F,
) -> Result<Option<T>>
where
    T: Audited,
    F: FnOnce(&mut DbConn) -> Result<Option<T>>,
{
    conn.transaction::<_, Error, _>(|conn| {
        let Some(updated) = apply(conn)? else {
            return Ok(None);
        };

        let reference = updated.audit_reference();
        let previous = latest_entry(conn, T::KIND, &reference)?;
        let entry = NewAuditEntry::new(AuditOperation::Update, T::KIND, reference, actor)
            .with_details(details)
            .carrying(previous.as_ref());
        record(conn, &entry)?;
        Ok(Some(updated))
    })
}

/// Removes a record and appends a `delete` entry. Returns `false` when
/// `delete` matched no rows, in which case nothing is recorded.
pub fn delete_audited<F>(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: AuditReference,
    actor: Option<i32>,
    details: Option<&str>,
    delete: F,
) -> Result<bool>
where
    F: FnOnce(&mut DbConn) -> Result<usize>,
{
    conn.transaction::<_, Error, _>(|conn| {
        if delete(conn)? == 0 {
            return Ok(false);
        }

        let previous = latest_entry(conn, kind, &reference)?;
        let entry = NewAuditEntry::new(AuditOperation::Delete, kind, reference, actor)
            .with_details(details)
            .carrying(previous.as_ref());
        record(conn, &entry)?;
        Ok(true)
    })
}

/// Marks an entity archived by appending an `archive` entry.
pub fn archive(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: AuditReference,
    actor: Option<i32>,
    details: Option<&str>,
) -> Result<AuditEntry> {
    let reference_text = reference.to_string();
    let entry = NewAuditEntry::new(AuditOperation::Archive, kind, reference, actor)
        .with_details(details)
        .archived_since(now());
    let saved = record(conn, &entry)?;

    info!(entity_kind = %kind, reference = %reference_text, actor = ?actor, "Archived entity");
    Ok(saved)
}

/// Brings an archived entity back by appending an `update` entry with the
/// archived flag cleared.
pub fn restore(
    conn: &mut DbConn,
    kind: EntityKind,
    reference: AuditReference,
    actor: Option<i32>,
    details: Option<&str>,
) -> Result<AuditEntry> {
    let reference_text = reference.to_string();
    let entry = NewAuditEntry::new(AuditOperation::Update, kind, reference, actor)
        .with_details(details.or(Some("restored")));
    let saved = record(conn, &entry)?;

    info!(entity_kind = %kind, reference = %reference_text, actor = ?actor, "Restored entity");
    Ok(saved)
}

/// Rewrites the free-text details of an existing entry and stamps who edited
/// it. The archival state of the entry is left alone.
pub fn amend_details(
    conn: &mut DbConn,
    entry_id: i32,
    editor: i32,
    details: &str,
) -> Result<Option<AuditEntry>> {
    let amended = diesel::update(audit_entries::table.find(entry_id))
        .set((
            audit_entries::details.eq(details),
            audit_entries::last_edited_by.eq(editor),
            audit_entries::last_edited_at.eq(now()),
        ))
        .get_result::<AuditEntry>(conn)
        .optional()?;
    Ok(amended)
}

/// Deduplicates joined rows to the latest entry per entity, then applies the
/// archival filter.
pub fn resolve<T: Audited>(
    rows: Vec<(T, Option<AuditEntry>)>,
    filter: ArchivalFilter,
) -> Vec<AuditedRecord<T>> {
    filter.apply(latest_per_entity(rows))
}
