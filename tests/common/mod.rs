//! Shared fixtures for integration tests.
//!
//! Domain tests work on a raw in-memory connection; HTTP tests spawn the
//! router against a throwaway SQLite file.

#![allow(dead_code)]

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use once_cell::sync::Lazy;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use uuid::Uuid;

use parm::auth::{JwtConfig, PasswordPolicy};
use parm::crud::{roles, users};
use parm::models::User;
use parm::{bootstrap, create_db_pool, create_router, run_migrations, AppState, Config, DbPool};

pub const TEST_PASSWORD: &str = "securepassword123";

/// Lowest argon2 cost the hasher accepts; keeps fixtures fast.
pub const TEST_HASH_COST: u32 = 3;

pub static TEST_JWT_PRIVATE_KEY: Lazy<String> = Lazy::new(|| {
    let (private_key, _) = JwtConfig::generate_key_pair();
    private_key
});

/// Fresh in-memory database with the schema and default roles in place.
pub fn test_conn() -> SqliteConnection {
    let mut conn =
        SqliteConnection::establish(":memory:").expect("Failed to open in-memory database");
    conn.batch_execute("PRAGMA foreign_keys = ON;")
        .expect("Failed to enable foreign keys");
    run_migrations(&mut conn).expect("Failed to run migrations");
    roles::seed_defaults(&mut conn).expect("Failed to seed roles");
    conn
}

pub fn unique_email() -> String {
    format!("test_{}@example.com", Uuid::new_v4())
}

pub fn create_user(conn: &mut SqliteConnection) -> User {
    users::create(
        conn,
        None,
        &users::Registration {
            email: unique_email(),
            password: TEST_PASSWORD.to_string(),
            full_name: Some("Test User".to_string()),
        },
        &PasswordPolicy::default(),
        TEST_HASH_COST,
    )
    .expect("Failed to create user")
}

pub fn create_user_with_role(conn: &mut SqliteConnection, role: &str) -> User {
    let user = create_user(conn);
    users::assign_role(conn, user.id, role).expect("Failed to assign role");
    user
}

/// Logged-in user as seen by HTTP tests.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: i32,
    pub email: String,
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

/// The router served on an ephemeral port, backed by its own database file.
pub struct TestApp {
    pub client: Client,
    pub base_url: String,
    pub db_pool: DbPool,
    _db_dir: TempDir,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let db_dir = tempfile::tempdir().expect("Failed to create temp dir");

        let mut config = Config::default_for_testing();
        config.database.url = db_dir.path().join("parm.db").to_string_lossy().into_owned();
        config.jwt.private_key = Some(TEST_JWT_PRIVATE_KEY.clone());
        config.security.password_hash_cost = TEST_HASH_COST;

        let db_pool = create_db_pool(&config).expect("Failed to create pool");
        bootstrap(&db_pool, &config).expect("Failed to bootstrap database");

        let state = AppState::new(db_pool.clone(), &config).expect("Failed to build state");
        let app = create_router(state, &config);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test server");
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: Client::new(),
            base_url: format!("http://127.0.0.1:{}", port),
            db_pool,
            _db_dir: db_dir,
        }
    }

    pub fn conn(
        &self,
    ) -> diesel::r2d2::PooledConnection<diesel::r2d2::ConnectionManager<SqliteConnection>> {
        self.db_pool.get().expect("Failed to get connection")
    }

    /// Creates a user holding `role` (or no role) and logs them in.
    pub async fn user(&self, role: Option<&str>) -> TestUser {
        let user = {
            let mut conn = self.conn();
            match role {
                Some(role) => create_user_with_role(&mut conn, role),
                None => create_user(&mut conn),
            }
        };

        let response = self
            .post_public(
                "/auth/login",
                &json!({ "email": user.email, "password": TEST_PASSWORD }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 200, "login failed");
        let login: LoginResponse = response.json().await.expect("Invalid login response");

        TestUser {
            id: user.id,
            email: user.email,
            access_token: login.access_token,
        }
    }

    pub async fn get_public(&self, path: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post_public(&self, path: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn get(&self, path: &str, token: &str) -> Response {
        self.client
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn post(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn put(&self, path: &str, token: &str, body: &Value) -> Response {
        self.client
            .put(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("Failed to send request")
    }

    pub async fn delete(&self, path: &str, token: &str) -> Response {
        self.client
            .delete(format!("{}{}", self.base_url, path))
            .bearer_auth(token)
            .send()
            .await
            .expect("Failed to send request")
    }

    /// Creates an asset through the API and returns its id.
    pub async fn create_asset(&self, token: &str, name: &str) -> i32 {
        let response = self
            .post("/assets", token, &json!({ "name": name }))
            .await;
        assert_eq!(response.status().as_u16(), 201, "asset creation failed");
        let body: Value = response.json().await.expect("Invalid asset response");
        body["asset"]["id"].as_i64().expect("missing asset id") as i32
    }
}
