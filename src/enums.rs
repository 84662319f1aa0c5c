//! Closed string sets stored in TEXT columns.
//!
//! Every enumerated column is read and written through one of these types, so
//! an unknown value is rejected at the boundary instead of reaching the rest
//! of the crate.

use diesel::backend::Backend;
use diesel::deserialize::{self, FromSql};
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::sql_types::Text;
use diesel::sqlite::Sqlite;
use std::fmt;
use std::str::FromStr;

/// A string that is not a member of the expected closed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{value}' is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

macro_rules! text_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => $text:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            diesel::expression::AsExpression,
            diesel::deserialize::FromSqlRow,
            serde::Serialize,
            serde::Deserialize,
            utoipa::ToSchema,
        )]
        #[diesel(sql_type = diesel::sql_types::Text)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $text)] $variant ),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }

        impl ToSql<Text, Sqlite> for $name {
            fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Sqlite>) -> serialize::Result {
                out.set_value(self.as_str());
                Ok(IsNull::No)
            }
        }

        impl FromSql<Text, Sqlite> for $name {
            fn from_sql(value: <Sqlite as Backend>::RawValue<'_>) -> deserialize::Result<Self> {
                let text = <String as FromSql<Text, Sqlite>>::from_sql(value)?;
                Ok(text.parse::<$name>()?)
            }
        }
    };
}

text_enum! {
    /// Lifecycle event recorded by an audit entry.
    pub enum AuditOperation {
        Create => "create",
        Update => "update",
        Delete => "delete",
        Archive => "archive",
    }
}

text_enum! {
    /// Discriminator tying an audit entry to the table it describes.
    pub enum EntityKind {
        Asset => "asset",
        Category => "category",
        Location => "location",
        Reservation => "reservation",
        File => "file",
        User => "user",
        Role => "role",
        Permission => "permission",
    }
}

text_enum! {
    pub enum ReservationStatus {
        Reserved => "reserved",
        CheckedOut => "checked_out",
        Returned => "returned",
        Cancelled => "cancelled",
    }
}

text_enum! {
    /// ISO 4217 codes accepted for purchase prices.
    pub enum CurrencyCode {
        Usd => "USD",
        Eur => "EUR",
        Gbp => "GBP",
        Cad => "CAD",
        Aud => "AUD",
        Jpy => "JPY",
        Chf => "CHF",
        Mxn => "MXN",
    }
}

text_enum! {
    pub enum FileType {
        Pdf => "pdf",
        Png => "png",
        Jpeg => "jpeg",
        Gif => "gif",
        Webp => "webp",
        Txt => "txt",
        Csv => "csv",
        Docx => "docx",
        Xlsx => "xlsx",
    }
}

impl EntityKind {
    pub fn plural(&self) -> &'static str {
        match self {
            EntityKind::Asset => "assets",
            EntityKind::Category => "categories",
            EntityKind::Location => "locations",
            EntityKind::Reservation => "reservations",
            EntityKind::File => "files",
            EntityKind::User => "users",
            EntityKind::Role => "roles",
            EntityKind::Permission => "permissions",
        }
    }

    /// Name of the permission gating `action` on this kind of entity,
    /// e.g. `can_view_archived_assets`.
    pub fn permission(&self, action: Action) -> String {
        format!("can_{}_{}", action.as_str(), self.plural())
    }
}

impl ReservationStatus {
    /// Reserved and checked-out reservations hold the asset.
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Reserved | ReservationStatus::CheckedOut
        )
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        matches!(
            (self, next),
            (ReservationStatus::Reserved, ReservationStatus::CheckedOut)
                | (ReservationStatus::Reserved, ReservationStatus::Cancelled)
                | (ReservationStatus::CheckedOut, ReservationStatus::Returned)
        )
    }
}

impl FileType {
    pub fn from_file_name(file_name: &str) -> Result<Self, UnknownVariant> {
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "jpg" => Ok(FileType::Jpeg),
            ext => ext.parse().map_err(|_| UnknownVariant {
                kind: "FileType",
                value: file_name.to_string(),
            }),
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(
            self,
            FileType::Png | FileType::Jpeg | FileType::Gif | FileType::Webp
        )
    }
}

/// Operations gated by a permission. Not persisted; only used to build
/// permission names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
    Archive,
    ViewArchived,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Action::Create,
        Action::Update,
        Action::Delete,
        Action::Archive,
        Action::ViewArchived,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Archive => "archive",
            Action::ViewArchived => "view_archived",
        }
    }
}
