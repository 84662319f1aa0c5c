//! Permission evaluation.
//!
//! Access is purely additive: a user holds a permission when any of their
//! roles grants it. There are no deny rules and no caching, so every check
//! reads the current grants.

use diesel::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::debug;
use utoipa::ToSchema;

use crate::audit::{self, AuditReference};
use crate::enums::{Action, EntityKind};
use crate::error::{Error, Result};
use crate::schema::{permissions, role_permissions, roles, user_roles, users};
use crate::telemetry::record_permission_check;
use crate::DbConn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    Allowed,
    Denied,
    /// The user does not exist.
    NotFound,
}

impl Access {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Access::Allowed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            Access::Allowed => "allowed",
            Access::Denied => "denied",
            Access::NotFound => "not_found",
        }
    }
}

/// Everything a user is granted, resolved from one joined fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Grants {
    pub user_id: i32,
    pub is_active: bool,
    pub is_archived: bool,
    pub roles: BTreeSet<String>,
    pub permissions: BTreeSet<String>,
}

impl Grants {
    /// Inactive and archived users are denied everything they would
    /// otherwise hold.
    pub fn access(&self, permission: &str) -> Access {
        if self.is_active && !self.is_archived && self.permissions.contains(permission) {
            Access::Allowed
        } else {
            Access::Denied
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

/// Loads a user's roles and permissions by walking
/// users → user_roles → roles → role_permissions → permissions with outer
/// joins, so a user without roles still yields one row. The user's latest
/// audit entry decides whether the account is archived.
pub fn load_grants(conn: &mut DbConn, user_id: i32) -> Result<Option<Grants>> {
    let rows: Vec<(i32, bool, Option<String>, Option<String>)> = users::table
        .left_join(user_roles::table.on(user_roles::user_id.eq(users::id)))
        .left_join(roles::table.on(roles::id.eq(user_roles::role_id)))
        .left_join(role_permissions::table.on(role_permissions::role_id.eq(roles::id)))
        .left_join(permissions::table.on(permissions::id.eq(role_permissions::permission_id)))
        .filter(users::id.eq(user_id))
        .select((
            users::id,
            users::is_active,
            roles::name.nullable(),
            permissions::name.nullable(),
        ))
        .load(conn)?;

    let Some(&(id, is_active, _, _)) = rows.first() else {
        return Ok(None);
    };

    let is_archived = audit::latest_entry(conn, EntityKind::User, &AuditReference::Id(id))?
        .is_some_and(|entry| entry.archived);

    let mut grants = Grants {
        user_id: id,
        is_active,
        is_archived,
        roles: BTreeSet::new(),
        permissions: BTreeSet::new(),
    };
    for (_, _, role, permission) in rows {
        grants.roles.extend(role);
        grants.permissions.extend(permission);
    }

    Ok(Some(grants))
}

/// Resolves whether `user_id` holds `permission`.
pub fn check(conn: &mut DbConn, user_id: i32, permission: &str) -> Result<Access> {
    let start = Instant::now();

    let access = match load_grants(conn, user_id)? {
        Some(grants) => grants.access(permission),
        None => Access::NotFound,
    };

    record_permission_check(permission, access.as_str(), start.elapsed());
    debug!(
        user_id = user_id,
        permission = %permission,
        access = access.as_str(),
        "Evaluated permission"
    );
    Ok(access)
}

/// Like [`check`], for the permission gating `action` on `kind`.
pub fn check_action(
    conn: &mut DbConn,
    user_id: i32,
    kind: EntityKind,
    action: Action,
) -> Result<Access> {
    check(conn, user_id, &kind.permission(action))
}

/// Fails with [`Error::PermissionDenied`] unless the user is allowed.
pub fn require(conn: &mut DbConn, user_id: i32, permission: &str) -> Result<()> {
    if check(conn, user_id, permission)?.is_allowed() {
        Ok(())
    } else {
        Err(Error::permission_denied(permission))
    }
}

pub fn require_action(
    conn: &mut DbConn,
    user_id: i32,
    kind: EntityKind,
    action: Action,
) -> Result<()> {
    require(conn, user_id, &kind.permission(action))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(is_active: bool, permissions: &[&str]) -> Grants {
        Grants {
            user_id: 1,
            is_active,
            is_archived: false,
            roles: ["manager".to_string()].into_iter().collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn test_access_from_grants() {
        let g = grants(true, &["can_archive_assets"]);
        assert_eq!(g.access("can_archive_assets"), Access::Allowed);
        assert_eq!(g.access("can_delete_assets"), Access::Denied);
        assert!(g.has_role("manager"));
    }

    #[test]
    fn test_inactive_user_is_denied() {
        let g = grants(false, &["can_archive_assets"]);
        assert_eq!(g.access("can_archive_assets"), Access::Denied);
    }

    #[test]
    fn test_archived_user_is_denied() {
        let g = Grants {
            is_archived: true,
            ..grants(true, &["can_archive_assets"])
        };
        assert_eq!(g.access("can_archive_assets"), Access::Denied);
    }

    #[test]
    fn test_only_allowed_is_allowed() {
        assert!(Access::Allowed.is_allowed());
        assert!(!Access::Denied.is_allowed());
        assert!(!Access::NotFound.is_allowed());
    }
}
