//! OpenAPI document and Swagger UI.

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::error::ApiError;
use crate::pagination::PaginationMeta;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "PARM API",
        version = "1.0.0",
        description = "Production asset reservation manager.\n\n\
        ## Archival\n\
        Records are never flagged as archived in place. Every change appends an audit \
        entry and the newest entry decides whether a record is archived. List and read \
        endpoints accept `include_archived` and `just_archived`; setting both is an error. \
        Reading archived records needs the matching `can_view_archived_*` permission.\n\n\
        ## Authentication\n\
        1. Login at `/auth/login` to get an access token\n\
        2. Include the token in requests: `Authorization: Bearer <token>`",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "/", description = "Current server")
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Authentication", description = "Login and the current user"),
        (name = "Assets", description = "Assets, their archival state and audit trail"),
        (name = "Reservations", description = "Reserving, checking out and returning assets"),
        (name = "Permissions", description = "Permission evaluation")
    ),
    paths(
        crate::handlers::health::health_check_simple,
        crate::handlers::health::health_check,
        crate::handlers::health::ready_check,
        crate::handlers::health::live_check,

        crate::handlers::auth::login,
        crate::handlers::auth::get_current_user,

        crate::handlers::assets::list_assets,
        crate::handlers::assets::get_asset,
        crate::handlers::assets::create_asset,
        crate::handlers::assets::update_asset,
        crate::handlers::assets::delete_asset,
        crate::handlers::assets::archive_asset,
        crate::handlers::assets::restore_asset,
        crate::handlers::assets::asset_history,

        crate::handlers::reservations::list_reservations,
        crate::handlers::reservations::create_reservation,
        crate::handlers::reservations::check_out_reservation,
        crate::handlers::reservations::return_reservation,
        crate::handlers::reservations::cancel_reservation,

        crate::handlers::permissions::check_permission,
    ),
    components(
        schemas(
            ApiError,
            PaginationMeta,

            crate::handlers::health::HealthResponse,
            crate::handlers::health::ReadinessResponse,
            crate::handlers::health::ComponentStatus,

            crate::handlers::auth::LoginRequest,
            crate::handlers::auth::LoginResponse,
            crate::handlers::auth::UserResponse,
            crate::handlers::auth::CurrentUserResponse,

            crate::models::Asset,
            crate::models::AuditEntry,
            crate::enums::AuditOperation,
            crate::enums::EntityKind,
            crate::enums::CurrencyCode,
            crate::handlers::assets::CreateAssetRequest,
            crate::handlers::assets::UpdateAssetRequest,
            crate::handlers::assets::ArchivalNote,
            crate::handlers::assets::AssetResponse,
            crate::handlers::assets::AssetListResponse,

            crate::models::Reservation,
            crate::enums::ReservationStatus,
            crate::handlers::reservations::CreateReservationRequest,
            crate::handlers::reservations::ReservationResponse,
            crate::handlers::reservations::ReservationListResponse,

            crate::authz::Access,
            crate::handlers::permissions::CheckPermissionRequest,
            crate::handlers::permissions::CheckPermissionResponse,
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token obtained from /auth/login.\n\
                            Include in requests as: `Authorization: Bearer <token>`",
                        ))
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_router() -> Router {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let doc = ApiDoc::openapi();
        assert_eq!(doc.info.title, "PARM API");
        assert!(doc.paths.paths.contains_key("/assets/{asset_id}/archive"));
        assert!(doc.paths.paths.contains_key("/permissions/check"));
    }

    #[test]
    fn test_openapi_has_security_scheme() {
        let doc = ApiDoc::openapi();
        let components = doc.components.unwrap();
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }

    #[test]
    fn test_openapi_has_tags() {
        let tags = ApiDoc::openapi().tags.unwrap();
        assert!(tags.iter().any(|t| t.name == "Assets"));
        assert!(tags.iter().any(|t| t.name == "Reservations"));
    }
}
