use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::Serialize;
use utoipa::ToSchema;

use crate::audit::{AuditReference, Audited};
use crate::enums::{AuditOperation, CurrencyCode, EntityKind, FileType, ReservationStatus};

#[derive(Debug, Queryable, Selectable, Serialize, Clone)]
#[diesel(table_name = crate::schema::users)]
pub struct User {
    pub id: i32,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub full_name: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::users)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::users)]
pub struct UserChanges {
    pub full_name: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::roles)]
pub struct Role {
    pub id: i32,
    #[schema(example = "manager")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::roles)]
pub struct NewRole {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::permissions)]
pub struct Permission {
    pub id: i32,
    #[schema(example = "can_view_archived_assets")]
    pub name: String,
    pub description: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::permissions)]
pub struct NewPermission {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::user_roles)]
pub struct UserRole {
    pub id: i32,
    pub user_id: i32,
    pub role_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::user_roles)]
pub struct NewUserRole {
    pub user_id: i32,
    pub role_id: i32,
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = crate::schema::role_permissions)]
pub struct RolePermission {
    pub id: i32,
    pub role_id: i32,
    pub permission_id: i32,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::role_permissions)]
pub struct NewRolePermission {
    pub role_id: i32,
    pub permission_id: i32,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::categories)]
pub struct Category {
    pub id: i32,
    #[schema(example = "Cameras")]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::categories)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::categories)]
pub struct CategoryChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::locations)]
pub struct Location {
    pub id: i32,
    #[schema(example = "Stage 4")]
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = crate::schema::locations)]
pub struct NewLocation {
    pub name: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::locations)]
pub struct LocationChanges {
    pub name: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state_code: Option<String>,
    pub country_code: Option<String>,
    pub timezone: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::assets)]
pub struct Asset {
    pub id: i32,
    #[schema(example = "ARRI Alexa Mini")]
    pub name: String,
    pub description: Option<String>,
    #[schema(example = "AM-20931")]
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub owner_id: Option<i32>,
    #[schema(example = 4500000)]
    pub purchase_price_cents: Option<i64>,
    pub currency: Option<CurrencyCode>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Default, Insertable)]
#[diesel(table_name = crate::schema::assets)]
pub struct NewAsset {
    pub name: String,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub owner_id: Option<i32>,
    pub purchase_price_cents: Option<i64>,
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Default, AsChangeset)]
#[diesel(table_name = crate::schema::assets)]
pub struct AssetChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub serial_number: Option<String>,
    pub category_id: Option<i32>,
    pub location_id: Option<i32>,
    pub owner_id: Option<i32>,
    pub purchase_price_cents: Option<i64>,
    pub currency: Option<CurrencyCode>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::reservations)]
pub struct Reservation {
    pub id: i32,
    pub asset_id: i32,
    pub user_id: i32,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: ReservationStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::reservations)]
pub struct NewReservation {
    pub asset_id: i32,
    pub user_id: i32,
    pub starts_at: NaiveDateTime,
    pub ends_at: NaiveDateTime,
    pub status: ReservationStatus,
    pub notes: Option<String>,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, ToSchema)]
#[diesel(table_name = crate::schema::files)]
pub struct FileAttachment {
    /// SHA-256 of the file content, hex encoded.
    pub hash: String,
    pub asset_id: Option<i32>,
    pub file_name: String,
    pub file_type: FileType,
    pub size_bytes: i64,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = crate::schema::files)]
pub struct NewFileAttachment {
    pub hash: String,
    pub asset_id: Option<i32>,
    pub file_name: String,
    pub file_type: FileType,
    pub size_bytes: i64,
}

#[derive(Debug, Queryable, Selectable, Serialize, Clone, PartialEq, ToSchema)]
#[diesel(table_name = crate::schema::audit_entries)]
pub struct AuditEntry {
    pub id: i32,
    pub operation: AuditOperation,
    pub entity_kind: EntityKind,
    pub entity_id: Option<i32>,
    pub entity_hash: Option<String>,
    pub details: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: NaiveDateTime,
    pub last_edited_by: Option<i32>,
    pub last_edited_at: Option<NaiveDateTime>,
    pub archived: bool,
    pub archived_at: Option<NaiveDateTime>,
}

impl AuditEntry {
    /// The entity this entry describes. Fails only for rows written outside
    /// this crate that break the id/hash exclusivity.
    pub fn reference(&self) -> Result<AuditReference, crate::error::ValidationError> {
        AuditReference::from_parts(self.entity_id, self.entity_hash.clone())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = crate::schema::audit_entries)]
pub struct NewAuditEntry {
    pub operation: AuditOperation,
    pub entity_kind: EntityKind,
    pub entity_id: Option<i32>,
    pub entity_hash: Option<String>,
    pub details: Option<String>,
    pub created_by: Option<i32>,
    pub created_at: NaiveDateTime,
    pub archived: bool,
    pub archived_at: Option<NaiveDateTime>,
}

impl Audited for Asset {
    const KIND: EntityKind = EntityKind::Asset;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for Category {
    const KIND: EntityKind = EntityKind::Category;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for Location {
    const KIND: EntityKind = EntityKind::Location;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for Reservation {
    const KIND: EntityKind = EntityKind::Reservation;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for FileAttachment {
    const KIND: EntityKind = EntityKind::File;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Hash(self.hash.clone())
    }
}

impl Audited for User {
    const KIND: EntityKind = EntityKind::User;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for Role {
    const KIND: EntityKind = EntityKind::Role;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}

impl Audited for Permission {
    const KIND: EntityKind = EntityKind::Permission;

    fn audit_reference(&self) -> AuditReference {
        AuditReference::Id(self.id)
    }
}
