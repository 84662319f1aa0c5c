//! Roles, permissions and the grants between them.
//!
//! Grants are never edited in place: granting inserts an association row and
//! revoking deletes it.

use diesel::prelude::*;
use tracing::info;

use super::{conflict_on_unique, require_text, users};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::auth::PasswordPolicy;
use crate::enums::{Action, EntityKind};
use crate::error::{Error, Result};
use crate::models::{
    AuditEntry, NewPermission, NewRole, NewRolePermission, Permission, Role, User,
};
use crate::schema::{permissions, role_permissions, roles};
use crate::DbConn;

pub const ADMIN: &str = "admin";
pub const MANAGER: &str = "manager";
pub const VIEWER: &str = "viewer";

/// Entities managers look after day to day.
const BUSINESS_KINDS: [EntityKind; 5] = [
    EntityKind::Asset,
    EntityKind::Category,
    EntityKind::Location,
    EntityKind::Reservation,
    EntityKind::File,
];

pub fn create_role(
    conn: &mut DbConn,
    actor: Option<i32>,
    name: &str,
    description: Option<&str>,
) -> Result<Role> {
    require_text("name", name)?;
    let new_role = NewRole {
        name: name.trim().to_string(),
        description: description.map(str::to_string),
    };

    let role = audit::create_audited(conn, actor, None, |conn| {
        diesel::insert_into(roles::table)
            .values(&new_role)
            .get_result::<Role>(conn)
            .map_err(|e| conflict_on_unique(e, "role name is taken"))
    })?;

    info!(role_id = role.id, name = %role.name, "Created role");
    Ok(role)
}

pub fn create_permission(
    conn: &mut DbConn,
    actor: Option<i32>,
    name: &str,
    description: Option<&str>,
) -> Result<Permission> {
    require_text("name", name)?;
    let new_permission = NewPermission {
        name: name.trim().to_string(),
        description: description.map(str::to_string),
    };

    audit::create_audited(conn, actor, None, |conn| {
        diesel::insert_into(permissions::table)
            .values(&new_permission)
            .get_result::<Permission>(conn)
            .map_err(|e| conflict_on_unique(e, "permission name is taken"))
    })
}

pub fn role_by_name(conn: &mut DbConn, name: &str) -> Result<Option<Role>> {
    Ok(roles::table
        .filter(roles::name.eq(name))
        .first::<Role>(conn)
        .optional()?)
}

pub fn permission_by_name(conn: &mut DbConn, name: &str) -> Result<Option<Permission>> {
    Ok(permissions::table
        .filter(permissions::name.eq(name))
        .first::<Permission>(conn)
        .optional()?)
}

pub fn list_roles(conn: &mut DbConn, filter: ArchivalFilter) -> Result<Vec<AuditedRecord<Role>>> {
    let rows = audit_join!(roles, EntityKind::Role)
        .order(roles::name.asc())
        .load::<(Role, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn list_permissions(
    conn: &mut DbConn,
    filter: ArchivalFilter,
) -> Result<Vec<AuditedRecord<Permission>>> {
    let rows = audit_join!(permissions, EntityKind::Permission)
        .order(permissions::name.asc())
        .load::<(Permission, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

pub fn permissions_of(conn: &mut DbConn, role_id: i32) -> Result<Vec<Permission>> {
    Ok(role_permissions::table
        .inner_join(permissions::table)
        .filter(role_permissions::role_id.eq(role_id))
        .select(Permission::as_select())
        .order(permissions::name.asc())
        .load(conn)?)
}

/// Returns `false` when the role already held the permission.
pub fn grant(conn: &mut DbConn, role_name: &str, permission_name: &str) -> Result<bool> {
    let role = role_by_name(conn, role_name)?.ok_or_else(|| Error::not_found("role", role_name))?;
    let permission = permission_by_name(conn, permission_name)?
        .ok_or_else(|| Error::not_found("permission", permission_name))?;

    let inserted = diesel::insert_or_ignore_into(role_permissions::table)
        .values(&NewRolePermission {
            role_id: role.id,
            permission_id: permission.id,
        })
        .execute(conn)?;

    if inserted > 0 {
        info!(role = %role.name, permission = %permission.name, "Granted permission");
    }
    Ok(inserted > 0)
}

/// Returns whether the role held the permission.
pub fn revoke(conn: &mut DbConn, role_name: &str, permission_name: &str) -> Result<bool> {
    let role_ids = roles::table
        .filter(roles::name.eq(role_name))
        .select(roles::id);
    let permission_ids = permissions::table
        .filter(permissions::name.eq(permission_name))
        .select(permissions::id);

    let removed = diesel::delete(
        role_permissions::table
            .filter(role_permissions::role_id.eq_any(role_ids))
            .filter(role_permissions::permission_id.eq_any(permission_ids)),
    )
    .execute(conn)?;

    if removed > 0 {
        info!(role = %role_name, permission = %permission_name, "Revoked permission");
    }
    Ok(removed > 0)
}

/// Deletes a role along with its assignments and grants.
pub fn delete_role(conn: &mut DbConn, actor: Option<i32>, name: &str) -> Result<()> {
    conn.transaction::<_, Error, _>(|conn| {
        let role = role_by_name(conn, name)?.ok_or_else(|| Error::not_found("role", name))?;

        let deleted = audit::delete_audited(
            conn,
            EntityKind::Role,
            AuditReference::Id(role.id),
            actor,
            None,
            |conn| Ok(diesel::delete(roles::table.find(role.id)).execute(conn)?),
        )?;
        if !deleted {
            return Err(Error::not_found("role", name));
        }

        info!(role_id = role.id, name = %name, "Deleted role");
        Ok(())
    })
}

/// Every permission name the seed knows about.
pub fn all_permission_names() -> Vec<String> {
    EntityKind::ALL
        .iter()
        .flat_map(|kind| Action::ALL.iter().map(|action| kind.permission(*action)))
        .collect()
}

fn default_grants(role: &str) -> Vec<String> {
    match role {
        ADMIN => all_permission_names(),
        MANAGER => BUSINESS_KINDS
            .iter()
            .flat_map(|kind| {
                [
                    Action::Create,
                    Action::Update,
                    Action::Archive,
                    Action::ViewArchived,
                ]
                .into_iter()
                .map(|action| kind.permission(action))
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn ensure_role(conn: &mut DbConn, name: &str, description: &str) -> Result<Role> {
    match role_by_name(conn, name)? {
        Some(role) => Ok(role),
        None => create_role(conn, None, name, Some(description)),
    }
}

/// Creates the standard permissions and the `admin`, `manager` and `viewer`
/// roles, then grants each role its defaults. Running it again only fills in
/// what is missing.
pub fn seed_defaults(conn: &mut DbConn) -> Result<()> {
    conn.transaction::<_, Error, _>(|conn| {
        let mut created = 0;
        for name in all_permission_names() {
            if permission_by_name(conn, &name)?.is_none() {
                create_permission(conn, None, &name, None)?;
                created += 1;
            }
        }

        ensure_role(conn, ADMIN, "Full access")?;
        ensure_role(conn, MANAGER, "Manages assets, reservations and their records")?;
        ensure_role(conn, VIEWER, "Read-only access")?;

        for role in [ADMIN, MANAGER, VIEWER] {
            for permission in default_grants(role) {
                grant(conn, role, &permission)?;
            }
        }

        info!(created_permissions = created, "Seeded default roles and permissions");
        Ok(())
    })
}

/// Makes sure an administrator account exists for `email` and holds the
/// `admin` role. An existing account keeps its password.
pub fn ensure_admin(
    conn: &mut DbConn,
    email: &str,
    password: &str,
    policy: &PasswordPolicy,
    hash_cost: u32,
) -> Result<User> {
    let user = match users::by_email(conn, email)? {
        Some(user) => user,
        None => users::create(
            conn,
            None,
            &users::Registration {
                email: email.to_string(),
                password: password.to_string(),
                full_name: Some("Administrator".to_string()),
            },
            policy,
            hash_cost,
        )?,
    };

    users::assign_role(conn, user.id, ADMIN)?;
    info!(user_id = user.id, email = %user.email, "Administrator account ready");
    Ok(user)
}
