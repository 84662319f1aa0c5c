//! Configuration management.

use std::env;
use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtSettings,
    pub security: SecurityConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
    pub telemetry: TelemetryConfig,
    pub bootstrap: BootstrapConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub environment: Environment,
    pub request_timeout_secs: u64,
    pub max_body_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Path of the SQLite file, or `:memory:`.
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
    /// How long a connection waits on a locked database before failing.
    pub busy_timeout_ms: u32,
    pub run_migrations: bool,
}

#[derive(Debug, Clone)]
pub struct JwtSettings {
    pub private_key: Option<String>,
    pub access_token_expiry_secs: i64,
    pub issuer: Option<String>,
    pub audience: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SecurityConfig {
    pub min_password_length: usize,
    pub require_password_complexity: bool,
    pub password_hash_cost: u32,
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub allow_credentials: bool,
    pub max_age_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
}

/// Administrator created on start when both values are present.
#[derive(Debug, Clone, Default)]
pub struct BootstrapConfig {
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl BootstrapConfig {
    pub fn admin(&self) -> Option<(&str, &str)> {
        match (&self.admin_email, &self.admin_password) {
            (Some(email), Some(password)) => Some((email.as_str(), password.as_str())),
            _ => None,
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}

fn list_var(name: &str, default: &[&str]) -> Vec<String> {
    env::var(name)
        .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
        .unwrap_or_else(|_| default.iter().map(|s| s.to_string()).collect())
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment();
        let is_dev = environment.is_development();
        let is_prod = environment.is_production();

        let database_url = match env::var("DATABASE_URL") {
            Ok(url) => url,
            Err(_) if !is_prod => "parm.db".to_string(),
            Err(_) => return Err(ConfigError::Missing { name: "DATABASE_URL" }),
        };

        let default_origins: &[&str] = if is_dev { &["*"] } else { &[] };

        Ok(Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("PORT", 8080)?,
                environment: environment.clone(),
                request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", 30)?,
                max_body_size: parse_var("MAX_BODY_SIZE", 1_048_576)?,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 8)?,
                connection_timeout_secs: parse_var("DATABASE_CONNECTION_TIMEOUT_SECS", 30)?,
                busy_timeout_ms: parse_var("DATABASE_BUSY_TIMEOUT_MS", 5_000)?,
                run_migrations: parse_var("RUN_MIGRATIONS", true)?,
            },
            jwt: JwtSettings {
                private_key: env::var("JWT_PRIVATE_KEY").ok(),
                access_token_expiry_secs: parse_var("JWT_ACCESS_TOKEN_EXPIRY_SECS", 3600)?,
                issuer: env::var("JWT_ISSUER").ok(),
                audience: env::var("JWT_AUDIENCE").ok(),
            },
            security: SecurityConfig {
                min_password_length: parse_var("MIN_PASSWORD_LENGTH", 8)?,
                require_password_complexity: parse_var("REQUIRE_PASSWORD_COMPLEXITY", is_prod)?,
                password_hash_cost: parse_var("PASSWORD_HASH_COST", 12)?,
            },
            cors: CorsConfig {
                allowed_origins: list_var("CORS_ALLOWED_ORIGINS", default_origins),
                allowed_methods: list_var(
                    "CORS_ALLOWED_METHODS",
                    &["GET", "POST", "PUT", "DELETE", "OPTIONS"],
                ),
                allowed_headers: list_var(
                    "CORS_ALLOWED_HEADERS",
                    &["Content-Type", "Authorization", "X-Request-ID"],
                ),
                allow_credentials: parse_var("CORS_ALLOW_CREDENTIALS", false)?,
                max_age_secs: parse_var("CORS_MAX_AGE_SECS", 3600)?,
            },
            logging: LoggingConfig {
                level: env::var("LOG_LEVEL")
                    .unwrap_or_else(|_| if is_dev { "debug" } else { "info" }.to_string()),
                format: match env::var("LOG_FORMAT")
                    .unwrap_or_else(|_| if is_dev { "pretty" } else { "json" }.to_string())
                    .to_lowercase()
                    .as_str()
                {
                    "json" => LogFormat::Json,
                    _ => LogFormat::Pretty,
                },
            },
            telemetry: TelemetryConfig {
                metrics_enabled: parse_var("METRICS_ENABLED", true)?,
            },
            bootstrap: BootstrapConfig {
                admin_email: env::var("ADMIN_EMAIL").ok(),
                admin_password: env::var("ADMIN_PASSWORD").ok(),
            },
        })
    }

    fn parse_environment() -> Environment {
        match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }

    pub fn validate_for_production(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.server.environment.is_production() {
            if self.jwt.private_key.is_none() {
                issues.push("JWT_PRIVATE_KEY should be set in production".to_string());
            }
            if self.jwt.access_token_expiry_secs > 3600 {
                issues
                    .push("Access token expiry should not exceed 1 hour in production".to_string());
            }
            if self.cors.allowed_origins.iter().any(|o| o == "*") {
                issues.push("CORS should not allow all origins (*) in production".to_string());
            }
            if self.security.min_password_length < 8 {
                issues.push("Minimum password length should be at least 8".to_string());
            }
            if self.database.url == ":memory:" {
                issues.push("In-memory database loses all data on restart".to_string());
            }
        }

        issues
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn default_for_testing() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                environment: Environment::Development,
                request_timeout_secs: 30,
                max_body_size: 1_048_576,
            },
            database: DatabaseConfig {
                url: ":memory:".to_string(),
                max_connections: 4,
                connection_timeout_secs: 10,
                busy_timeout_ms: 5_000,
                run_migrations: true,
            },
            jwt: JwtSettings {
                private_key: None,
                access_token_expiry_secs: 3600,
                issuer: Some("parm-test".to_string()),
                audience: None,
            },
            security: SecurityConfig {
                min_password_length: 8,
                require_password_complexity: false,
                password_hash_cost: 4,
            },
            cors: CorsConfig {
                allowed_origins: vec!["*".to_string()],
                allowed_methods: vec![
                    "GET".to_string(),
                    "POST".to_string(),
                    "PUT".to_string(),
                    "DELETE".to_string(),
                ],
                allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
                allow_credentials: false,
                max_age_secs: 3600,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
            telemetry: TelemetryConfig {
                metrics_enabled: false,
            },
            bootstrap: BootstrapConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_parsing() {
        assert!(Environment::Production.is_production());
        assert!(!Environment::Production.is_development());
        assert!(Environment::Development.is_development());
        assert!(!Environment::Development.is_production());
    }

    #[test]
    fn test_production_validation() {
        let mut config = Config::default_for_testing();
        assert!(config.validate_for_production().is_empty());

        config.server.environment = Environment::Production;
        config.jwt.access_token_expiry_secs = 7200;
        config.security.min_password_length = 6;

        let issues = config.validate_for_production();
        assert!(issues.iter().any(|i| i.contains("CORS")));
        assert!(issues.iter().any(|i| i.contains("JWT_PRIVATE_KEY")));
        assert!(issues.iter().any(|i| i.contains("In-memory")));
        assert!(issues.iter().any(|i| i.contains("password length")));
    }

    #[test]
    fn test_bootstrap_admin_needs_both_values() {
        let mut bootstrap = BootstrapConfig {
            admin_email: Some("admin@example.com".to_string()),
            admin_password: None,
        };
        assert!(bootstrap.admin().is_none());

        bootstrap.admin_password = Some("changeme123".to_string());
        assert_eq!(
            bootstrap.admin(),
            Some(("admin@example.com", "changeme123"))
        );
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("PARM_TEST_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
