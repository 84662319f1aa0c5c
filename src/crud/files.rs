//! File attachments, addressed by the SHA-256 of their content.

use diesel::prelude::*;
use sha2::{Digest, Sha256};
use tracing::info;

use super::{conflict_on_unique, require_text, set_archived};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::enums::{EntityKind, FileType};
use crate::error::{Error, Result};
use crate::models::{AuditEntry, FileAttachment, NewFileAttachment};
use crate::schema::files;
use crate::DbConn;

const KIND: EntityKind = EntityKind::File;

pub fn content_hash(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Registers `content` under its hash. Storing identical bytes twice is a
/// conflict.
pub fn create(
    conn: &mut DbConn,
    actor: Option<i32>,
    asset_id: Option<i32>,
    file_name: &str,
    content: &[u8],
) -> Result<FileAttachment> {
    require_text("file_name", file_name)?;
    let file_type = FileType::from_file_name(file_name)?;

    let new_file = NewFileAttachment {
        hash: content_hash(content),
        asset_id,
        file_name: file_name.trim().to_string(),
        file_type,
        size_bytes: content.len() as i64,
    };

    let file = audit::create_audited(conn, actor, None, |conn| {
        diesel::insert_into(files::table)
            .values(&new_file)
            .get_result::<FileAttachment>(conn)
            .map_err(|e| conflict_on_unique(e, "a file with identical content is already stored"))
    })?;

    info!(
        hash = %file.hash,
        file_type = %file.file_type,
        size_bytes = file.size_bytes,
        "Stored file attachment"
    );
    Ok(file)
}

pub fn by_hash(
    conn: &mut DbConn,
    hash: &str,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<FileAttachment>>> {
    let rows = audit_join!(files, KIND, hash => entity_hash)
        .filter(files::hash.eq(hash))
        .load::<(FileAttachment, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn list(
    conn: &mut DbConn,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<FileAttachment>>> {
    let rows = audit_join!(files, KIND, hash => entity_hash)
        .order(files::created_at.asc())
        .load::<(FileAttachment, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn list_for_asset(
    conn: &mut DbConn,
    asset_id: i32,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<FileAttachment>>> {
    let rows = audit_join!(files, KIND, hash => entity_hash)
        .filter(files::asset_id.eq(asset_id))
        .order(files::created_at.asc())
        .load::<(FileAttachment, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

/// Points the attachment at another asset, or detaches it with `None`.
pub fn attach(
    conn: &mut DbConn,
    actor: Option<i32>,
    hash: &str,
    asset_id: Option<i32>,
) -> Result<FileAttachment> {
    audit::update_audited(conn, actor, None, |conn| {
        Ok(diesel::update(files::table.find(hash))
            .set(files::asset_id.eq(asset_id))
            .get_result::<FileAttachment>(conn)
            .optional()?)
    })?
    .ok_or_else(|| Error::not_found("file", hash))
}

fn exists(conn: &mut DbConn, hash: &str) -> Result<bool> {
    let found = files::table
        .find(hash)
        .select(files::hash)
        .first::<String>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(conn: &mut DbConn, actor: Option<i32>, hash: &str) -> Result<AuditEntry> {
    if !exists(conn, hash)? {
        return Err(Error::not_found("file", hash));
    }
    set_archived(conn, KIND, AuditReference::Hash(hash.to_string()), actor, None, true)
}

pub fn restore(conn: &mut DbConn, actor: Option<i32>, hash: &str) -> Result<AuditEntry> {
    if !exists(conn, hash)? {
        return Err(Error::not_found("file", hash));
    }
    set_archived(conn, KIND, AuditReference::Hash(hash.to_string()), actor, None, false)
}

pub fn delete(conn: &mut DbConn, actor: Option<i32>, hash: &str) -> Result<()> {
    let reference = AuditReference::Hash(hash.to_string());
    let deleted = audit::delete_audited(conn, KIND, reference, actor, None, |conn| {
        Ok(diesel::delete(files::table.find(hash)).execute(conn)?)
    })?;

    if deleted {
        Ok(())
    } else {
        Err(Error::not_found("file", hash))
    }
}
