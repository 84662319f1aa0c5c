use diesel::prelude::*;
use tracing::{info, warn};
use validator::ValidateEmail;

use super::{conflict_on_unique, set_archived};
use crate::audit::{self, ArchivalFilter, AuditReference, AuditedRecord};
use crate::audit_join;
use crate::auth::{PasswordPolicy, PasswordService};
use crate::enums::EntityKind;
use crate::error::{Error, Result, ValidationError};
use crate::models::{AuditEntry, NewUser, NewUserRole, Role, User, UserChanges};
use crate::schema::{reservations, roles, user_roles, users};
use crate::DbConn;

const KIND: EntityKind = EntityKind::User;

/// Plain-text registration data. The password is hashed before it reaches
/// the database.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

impl UserChanges {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none() && self.is_active.is_none()
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn create(
    conn: &mut DbConn,
    actor: Option<i32>,
    registration: &Registration,
    policy: &PasswordPolicy,
    hash_cost: u32,
) -> Result<User> {
    let email = normalize_email(&registration.email);
    if !email.validate_email() {
        return Err(ValidationError::Invalid {
            field: "email",
            reason: "is not a valid address",
        }
        .into());
    }
    policy.validate(&registration.password)?;

    let new_user = NewUser {
        email,
        password_hash: PasswordService::hash_password(&registration.password, hash_cost)?,
        full_name: registration.full_name.clone(),
    };

    let user = audit::create_audited(conn, actor, None, |conn| {
        diesel::insert_into(users::table)
            .values(&new_user)
            .get_result::<User>(conn)
            .map_err(|e| conflict_on_unique(e, "a user with this email already exists"))
    })?;

    info!(user_id = user.id, email = %user.email, "Created user");
    Ok(user)
}

pub fn by_id(
    conn: &mut DbConn,
    id: i32,
    filter: ArchivalFilter,
) -> Result<Option<AuditedRecord<User>>> {
    let rows = audit_join!(users, KIND)
        .filter(users::id.eq(id))
        .load::<(User, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter).into_iter().next())
}

pub fn by_email(conn: &mut DbConn, email: &str) -> Result<Option<User>> {
    let user = users::table
        .filter(users::email.eq(normalize_email(email)))
        .first::<User>(conn)
        .optional()?;
    Ok(user)
}

pub fn list(conn: &mut DbConn, filter: ArchivalFilter) -> Result<Vec<AuditedRecord<User>>> {
    let rows = audit_join!(users, KIND)
        .order(users::email.asc())
        .load::<(User, Option<AuditEntry>)>(conn)?;

    Ok(audit::resolve(rows, filter))
}

/// Returns the user only when the password matches, the account is active
/// and not archived.
pub fn authenticate(conn: &mut DbConn, email: &str, password: &str) -> Result<Option<User>> {
    let Some(user) = by_email(conn, email)? else {
        return Ok(None);
    };

    if !PasswordService::verify_password(password, &user.password_hash)? {
        return Ok(None);
    }
    if !user.is_active {
        warn!(user_id = user.id, "Login attempt on inactive account");
        return Ok(None);
    }
    if by_id(conn, user.id, ArchivalFilter::ActiveOnly)?.is_none() {
        warn!(user_id = user.id, "Login attempt on archived account");
        return Ok(None);
    }

    Ok(Some(user))
}

pub fn update(
    conn: &mut DbConn,
    actor: Option<i32>,
    id: i32,
    changes: &UserChanges,
) -> Result<User> {
    if changes.is_empty() {
        return Err(ValidationError::EmptyUpdate.into());
    }

    audit::update_audited(conn, actor, None, |conn| {
        Ok(diesel::update(users::table.find(id))
            .set(changes)
            .get_result::<User>(conn)
            .optional()?)
    })?
    .ok_or_else(|| Error::not_found("user", id))
}

pub fn change_password(
    conn: &mut DbConn,
    id: i32,
    new_password: &str,
    policy: &PasswordPolicy,
    hash_cost: u32,
) -> Result<()> {
    policy.validate(new_password)?;
    let password_hash = PasswordService::hash_password(new_password, hash_cost)?;

    audit::update_audited(conn, Some(id), Some("password changed"), |conn| {
        Ok(diesel::update(users::table.find(id))
            .set(users::password_hash.eq(&password_hash))
            .get_result::<User>(conn)
            .optional()?)
    })?
    .ok_or_else(|| Error::not_found("user", id))?;
    Ok(())
}

fn exists(conn: &mut DbConn, id: i32) -> Result<bool> {
    let found = users::table
        .find(id)
        .select(users::id)
        .first::<i32>(conn)
        .optional()?;
    Ok(found.is_some())
}

pub fn archive(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("user", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, true)
}

pub fn restore(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<AuditEntry> {
    if !exists(conn, id)? {
        return Err(Error::not_found("user", id));
    }
    set_archived(conn, KIND, AuditReference::Id(id), actor, None, false)
}

/// Fails with `Conflict` while the user still holds reservations or authored
/// audit entries. Archive such users instead.
pub fn delete(conn: &mut DbConn, actor: Option<i32>, id: i32) -> Result<()> {
    let deleted = audit::delete_audited(conn, KIND, AuditReference::Id(id), actor, None, |conn| {
        let held: i64 = reservations::table
            .filter(reservations::user_id.eq(id))
            .count()
            .get_result(conn)?;
        if held > 0 {
            return Err(Error::Conflict(format!(
                "user {} holds {} reservation(s)",
                id, held
            )));
        }

        diesel::delete(users::table.find(id))
            .execute(conn)
            .map_err(|e| match e {
                diesel::result::Error::DatabaseError(
                    diesel::result::DatabaseErrorKind::ForeignKeyViolation,
                    _,
                ) => Error::Conflict(format!("user {} is referenced by audit entries", id)),
                other => other.into(),
            })
    })?;

    if deleted {
        Ok(())
    } else {
        Err(Error::not_found("user", id))
    }
}

/// Gives the user a role. Assigning a role the user already holds is a
/// no-op.
pub fn assign_role(conn: &mut DbConn, user_id: i32, role_name: &str) -> Result<()> {
    let role = roles::table
        .filter(roles::name.eq(role_name))
        .first::<Role>(conn)
        .optional()?
        .ok_or_else(|| Error::not_found("role", role_name))?;
    if !exists(conn, user_id)? {
        return Err(Error::not_found("user", user_id));
    }

    let inserted = diesel::insert_or_ignore_into(user_roles::table)
        .values(&NewUserRole {
            user_id,
            role_id: role.id,
        })
        .execute(conn)?;

    if inserted > 0 {
        info!(user_id = user_id, role = %role.name, "Assigned role");
    }
    Ok(())
}

/// Returns whether the user held the role.
pub fn revoke_role(conn: &mut DbConn, user_id: i32, role_name: &str) -> Result<bool> {
    let role_ids = roles::table
        .filter(roles::name.eq(role_name))
        .select(roles::id);

    let removed = diesel::delete(
        user_roles::table
            .filter(user_roles::user_id.eq(user_id))
            .filter(user_roles::role_id.eq_any(role_ids)),
    )
    .execute(conn)?;

    if removed > 0 {
        info!(user_id = user_id, role = %role_name, "Revoked role");
    }
    Ok(removed > 0)
}

pub fn roles_of(conn: &mut DbConn, user_id: i32) -> Result<Vec<Role>> {
    let assigned = user_roles::table
        .inner_join(roles::table)
        .filter(user_roles::user_id.eq(user_id))
        .select(Role::as_select())
        .order(roles::name.asc())
        .load(conn)?;
    Ok(assigned)
}
