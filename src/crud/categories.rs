use diesel::prelude::*;
use tracing::info;

use super::{conflict_on_unique, require_text, set_archived};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::enums::EntityKind;
use crate::error::{Error, Result, ValidationError};
use crate::models::{AuditEntry, Category, CategoryChanges, NewCategory};
use crate::schema::categories;
use crate::DbConn;

const KIND: EntityKind = EntityKind::Category;

impl CategoryChanges {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.parent_id.is_none()
    }
}

pub fn create(
    conn: &mut DbConn,
    actor: Option<i32>,
    new_category: &NewCategory,
) -> Result<Category> {
    require_text("name", &new_category.name)?;

    let category = audit::create_audited(conn, actor, None, |conn| {
        diesel::insert_into(categories::table)
            .values(new_category)
            .get_result::<Category>(conn)
            .map_err(|e| conflict_on_unique(e, "category name is taken"))
    })?;

    info!(category_id = category.id, name = %category.name, "Created category");
    Ok(category)
}

pub fn by_id(
    conn: &mut DbConn,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<Category>>> {
    let rows = audit_join!(categories, KIND)
        .filter(categories::id.eq(id))
        .load::<(Category, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn list(conn: &mut DbConn, filter: ArchivalFilter) -> Result<Vec<AuditedRecord<Category>>> {
    let rows = audit_join!(categories, KIND)
        .order(categories::name.asc())
        .load::<(Category, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

/// Direct children of `parent_id`.
pub fn children(
    conn: &mut DbConn,
    parent_id: i32,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<Category>>> {
    let rows = audit_join!(categories, KIND)
        .filter(categories::parent_id.eq(parent_id))
        .order(categories::name.asc())
        .load::<(Category, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn update(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    changes: &CategoryChanges,
) -> Result<Category> {
    if changes.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }
    if let Some(name) = &changes.name {
        require_text("name", name)?;
    }
    if changes.parent_id == Some(id) {
        return Err(Error::Conflict("a category cannot be its own parent".to_string()));
    }

    audit::update_audited(conn, actor, None, |conn| {
        diesel::update(categories::table.find(id))
            .set(changes)
            .get_result::<Category>(conn)
            .optional()
            .map_err(|e| conflict_on_unique(e, "category name is taken"))
    })?
    .ok_or_else(|| Error::not_found("category", id))
}

fn exists(conn: &mut DbConn, id: i32) -> Result<bool> {
    let found = categories::table
        .find(id)
        .select(categories::id)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("category", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, true)
}

pub fn restore(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("category", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, false)
}

/// Children lose their parent; assets in the category become uncategorized.
pub fn delete(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<()> {
    let deleted = audit::delete_audited(conn, KIND, AuditReference::Id(id), actor, None, |conn| {
        Ok(diesel::delete(categories::table.find(id)).execute(conn)?)
    })?;

    if deleted {
        Ok(())
    } else {
        Err(Error::not_found("category", id))
    }
}
