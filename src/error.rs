//! Domain errors and their HTTP rendering.

use axum::{http::StatusCode, Json};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::enums::UnknownVariant;
use crate::{DbConn, DbPool};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Input rejected before it reaches the database.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    UnknownVariant(#[from] UnknownVariant),

    #[error("an audit entry must reference exactly one of entity id or entity hash")]
    AuditReference,

    #[error("include_archived and just_archived cannot both be set")]
    ConflictingArchivalFlags,

    #[error("at least one field must be provided")]
    EmptyUpdate,

    #[error("{field} must not be empty")]
    Blank { field: &'static str },

    #[error("{field} {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },

    #[error("reservation must end after it starts")]
    ReservationWindow,

    #[error("reservation cannot move from {from} to {to}")]
    StatusTransition { from: String, to: String },

    #[error("{0}")]
    Password(String),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("missing permission '{permission}'")]
    PermissionDenied { permission: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("password hashing failed: {0}")]
    Password(String),

    #[error("token error: {0}")]
    Token(String),
}

impl Error {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Error::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn permission_denied(permission: impl Into<String>) -> Self {
        Error::PermissionDenied {
            permission: permission.into(),
        }
    }
}

impl From<UnknownVariant> for Error {
    fn from(err: UnknownVariant) -> Self {
        Error::Validation(err.into())
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

impl ApiError {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }

    pub fn bad_request(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::BAD_REQUEST, Json(Self::new(error, code)))
    }

    pub fn unauthorized(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::UNAUTHORIZED, Json(Self::new(error, code)))
    }

    pub fn forbidden(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::FORBIDDEN, Json(Self::new(error, code)))
    }

    pub fn not_found(
        error: impl Into<String>,
        code: impl Into<String>,
    ) -> (StatusCode, Json<Self>) {
        (StatusCode::NOT_FOUND, Json(Self::new(error, code)))
    }

    pub fn conflict(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (StatusCode::CONFLICT, Json(Self::new(error, code)))
    }

    pub fn internal(error: impl Into<String>, code: impl Into<String>) -> (StatusCode, Json<Self>) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(Self::new(error, code)),
        )
    }

    pub fn db_error() -> (StatusCode, Json<Self>) {
        Self::internal("Database error", "DB_ERROR")
    }
}

pub type ApiResult<T> = std::result::Result<T, (StatusCode, Json<ApiError>)>;

/// Renders a domain error as an HTTP response, logging server-side failures.
pub fn api_error(err: Error) -> (StatusCode, Json<ApiError>) {
    match err {
        Error::Validation(e) => ApiError::bad_request(e.to_string(), "VALIDATION_ERROR"),
        Error::NotFound { entity, id } => ApiError::not_found(
            format!("{} {} not found", entity, id),
            format!("{}_NOT_FOUND", entity.to_ascii_uppercase()),
        ),
        Error::PermissionDenied { permission } => {
            warn!(permission = %permission, "Permission denied");
            ApiError::forbidden(
                format!("Missing permission '{}'", permission),
                "PERMISSION_DENIED",
            )
        }
        Error::Conflict(message) => ApiError::conflict(message, "CONFLICT"),
        Error::Database(e) => {
            error!(error = %e, "Database error");
            ApiError::db_error()
        }
        Error::Pool(e) => {
            error!(error = %e, "Database connection error");
            ApiError::internal("Database connection error", "DB_CONNECTION_ERROR")
        }
        other => {
            error!(error = %other, "Internal error");
            ApiError::internal("Internal server error", "INTERNAL_ERROR")
        }
    }
}

pub fn get_db_conn(
    pool: &DbPool,
) -> std::result::Result<
    diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<DbConn>>,
    (StatusCode, Json<ApiError>),
> {
    pool.get().map_err(|e| {
        error!(error = %e, "Database connection error");
        ApiError::internal("Database connection error", "DB_CONNECTION_ERROR")
    })
}
