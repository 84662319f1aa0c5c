//! PARM - production asset reservation manager.
//!
//! Assets, reservations and the records around them are tracked with an
//! append-only audit trail that also decides archival state. Access is
//! governed by named permissions granted to roles.

pub mod audit;
pub mod auth;
pub mod authz;
pub mod config;
pub mod crud;
pub mod enums;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod openapi;
pub mod pagination;
pub mod schema;
pub mod telemetry;

use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};

use auth::{JwtConfig, PasswordPolicy};
use error::{Error, Result};
use middleware::{metrics::metrics_middleware, request_id::request_id_middleware};
use telemetry::MetricsState;

pub use config::Config;

pub type DbConn = diesel::SqliteConnection;
pub type DbPool = r2d2::Pool<ConnectionManager<DbConn>>;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub jwt_config: Arc<JwtConfig>,
    pub password_policy: PasswordPolicy,
    pub password_hash_cost: u32,
    pub metrics: MetricsState,
}

impl AppState {
    pub fn new(db_pool: DbPool, config: &Config) -> Result<Self> {
        let jwt_config = JwtConfig::from_config(config)?;

        Ok(Self {
            db_pool,
            jwt_config: Arc::new(jwt_config),
            password_policy: password_policy(config),
            password_hash_cost: config.security.password_hash_cost,
            metrics: MetricsState::new(config.telemetry.metrics_enabled),
        })
    }
}

pub fn password_policy(config: &Config) -> PasswordPolicy {
    if config.security.require_password_complexity {
        PasswordPolicy::complex(config.security.min_password_length)
    } else {
        PasswordPolicy {
            min_length: config.security.min_password_length,
            ..Default::default()
        }
    }
}

pub fn create_router(state: AppState, config: &Config) -> Router {
    let cors = build_cors_layer(config);
    let body_limit = RequestBodyLimitLayer::new(config.server.max_body_size);

    #[allow(deprecated)]
    let timeout = TimeoutLayer::new(Duration::from_secs(config.server.request_timeout_secs));

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let metrics_state = state.metrics.clone();
    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check_simple))
        .route("/health/status", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::ready_check))
        .route("/health/live", get(handlers::health::live_check))
        .route(
            "/metrics",
            get(telemetry::metrics::metrics_handler).with_state(metrics_state),
        )
        .route("/auth/login", post(handlers::auth::login))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/auth/me", get(handlers::auth::get_current_user))
        .route(
            "/assets",
            get(handlers::assets::list_assets).post(handlers::assets::create_asset),
        )
        .route(
            "/assets/{asset_id}",
            get(handlers::assets::get_asset)
                .put(handlers::assets::update_asset)
                .delete(handlers::assets::delete_asset),
        )
        .route(
            "/assets/{asset_id}/archive",
            post(handlers::assets::archive_asset),
        )
        .route(
            "/assets/{asset_id}/restore",
            post(handlers::assets::restore_asset),
        )
        .route(
            "/assets/{asset_id}/history",
            get(handlers::assets::asset_history),
        )
        .route(
            "/reservations",
            get(handlers::reservations::list_reservations)
                .post(handlers::reservations::create_reservation),
        )
        .route(
            "/reservations/{reservation_id}/checkout",
            post(handlers::reservations::check_out_reservation),
        )
        .route(
            "/reservations/{reservation_id}/return",
            post(handlers::reservations::return_reservation),
        )
        .route(
            "/reservations/{reservation_id}/cancel",
            post(handlers::reservations::cancel_reservation),
        )
        .route(
            "/permissions/check",
            post(handlers::permissions::check_permission),
        )
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::auth_middleware,
        ))
        .with_state(state.clone());

    let docs_routes = openapi::swagger_router();

    Router::new()
        .merge(docs_routes)
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum_middleware::from_fn(metrics_middleware))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(trace_layer)
        .layer(timeout)
        .layer(body_limit)
        .layer(cors)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "Not found", "code": "NOT_FOUND"})),
    )
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    use axum::http::header::{HeaderName, HeaderValue};
    use axum::http::Method;

    let is_wildcard_origin = config.cors.allowed_origins.iter().any(|o| o == "*")
        || config.cors.allowed_origins.is_empty();

    let methods: Vec<Method> = config
        .cors
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();

    let headers: Vec<HeaderName> = config
        .cors
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let origins = || -> Vec<HeaderValue> {
        config
            .cors
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect()
    };

    let cors = match (config.cors.allow_credentials, is_wildcard_origin) {
        (true, true) => CorsLayer::new()
            .allow_origin(tower_http::cors::AllowOrigin::mirror_request())
            .allow_credentials(true),
        (true, false) => CorsLayer::new()
            .allow_origin(origins())
            .allow_credentials(true),
        (false, true) => CorsLayer::new().allow_origin(Any),
        (false, false) => CorsLayer::new().allow_origin(origins()),
    };

    cors.allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.cors.max_age_secs))
}

/// Per-connection SQLite settings. Foreign keys are off by default in SQLite
/// and must be enabled on every connection.
#[derive(Debug, Clone, Copy)]
struct SqlitePragmas {
    busy_timeout_ms: u32,
}

impl CustomizeConnection<DbConn, r2d2::Error> for SqlitePragmas {
    fn on_acquire(&self, conn: &mut DbConn) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

pub fn create_db_pool(config: &Config) -> Result<DbPool> {
    let url = config.database.url.as_str();
    // Each in-memory connection is its own database, so share a single one.
    let max_size = if url == ":memory:" {
        1
    } else {
        config.database.max_connections
    };

    let pool = r2d2::Pool::builder()
        .max_size(max_size)
        .connection_timeout(Duration::from_secs(config.database.connection_timeout_secs))
        .connection_customizer(Box::new(SqlitePragmas {
            busy_timeout_ms: config.database.busy_timeout_ms,
        }))
        .build(ConnectionManager::<DbConn>::new(url))?;
    Ok(pool)
}

/// Applies any embedded migrations the database has not seen yet.
pub fn run_migrations(conn: &mut DbConn) -> Result<()> {
    let applied = conn
        .run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Migration(e.to_string()))?;
    if !applied.is_empty() {
        info!(count = applied.len(), "Applied database migrations");
    }
    Ok(())
}

/// Brings a fresh or existing database to a usable state: schema, default
/// roles and permissions, and the configured administrator if any.
pub fn bootstrap(pool: &DbPool, config: &Config) -> Result<()> {
    let mut conn = pool.get()?;

    if config.database.run_migrations {
        run_migrations(&mut conn)?;
    }
    crud::roles::seed_defaults(&mut conn)?;

    if let Some((email, password)) = config.bootstrap.admin() {
        crud::roles::ensure_admin(
            &mut conn,
            email,
            password,
            &password_policy(config),
            config.security.password_hash_cost,
        )?;
    }
    Ok(())
}

pub fn init_tracing(config: &Config) {
    telemetry::init_telemetry(config);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }

    #[test]
    fn test_build_cors_layer_wildcard() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec!["*".to_string()];
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_build_cors_layer_specific_origins() {
        let mut config = Config::default_for_testing();
        config.cors.allowed_origins = vec![
            "http://localhost:3000".to_string(),
            "https://example.com".to_string(),
        ];
        config.cors.allow_credentials = true;
        let _ = build_cors_layer(&config);
    }

    #[test]
    fn test_bootstrap_in_memory_database() {
        let config = Config::default_for_testing();
        let pool = create_db_pool(&config).unwrap();
        bootstrap(&pool, &config).unwrap();
        bootstrap(&pool, &config).unwrap();

        let mut conn = pool.get().unwrap();
        let roles = crud::roles::list_roles(&mut conn, audit::ArchivalFilter::ActiveOnly).unwrap();
        assert_eq!(roles.len(), 3);
    }
}
