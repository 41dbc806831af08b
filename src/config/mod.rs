use serde::{Deserialize, Serialize};
use std::env;
use thiserror::Error;

/// Default secret shipped for local development. Production refuses to start with it.
pub const DEFAULT_JWT_SECRET: &str = "jwt-secret-change-me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub helpdesk: HelpdeskConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Full connection URL. When absent the URL is assembled from the discrete fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub name: String,
    pub user: String,
    pub password: String,
    pub table_prefix: String,
    pub min_connections: u32,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub enable_query_logging: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub version: String,
    pub default_page_size: u32,
    pub max_page_size: u32,
    pub max_request_size_bytes: usize,
    /// Per-address request budget on `/api/v1`
    pub rate_limit_enabled: bool,
    pub rate_limit_max: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub refresh_window_days: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpdeskConfig {
    pub title: String,
    pub url: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("JWT_SECRET must be set in production")]
    DefaultJwtSecret,

    #[error("Invalid database configuration: {0}")]
    InvalidDatabase(String),

    #[error("API_RATE_LIMIT and API_RATE_LIMIT_WINDOW_SECS must be positive")]
    InvalidRateLimit,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary variable source.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let environment = match get("APP_ENV").as_deref() {
            Some("production") | Some("prod") => Environment::Production,
            Some("staging") | Some("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_overrides(get)
    }

    fn with_overrides(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        // Server overrides
        if let Some(v) = get("HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Some(v) = get("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.trim().is_empty());
        }
        if let Some(v) = get("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = get("DB_PORT") {
            self.database.port = v.parse().unwrap_or(self.database.port);
        }
        if let Some(v) = get("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = get("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = get("DB_PASSWORD") {
            self.database.password = v;
        }
        if let Some(v) = get("TABLE_PREFIX") {
            self.database.table_prefix = v;
        }
        if let Some(v) = get("DB_POOL_MIN") {
            self.database.min_connections = v.parse().unwrap_or(self.database.min_connections);
        }
        if let Some(v) = get("DB_POOL_MAX") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Some(v) = get("DB_ACQUIRE_TIMEOUT_SECS") {
            self.database.acquire_timeout_secs = v.parse().unwrap_or(self.database.acquire_timeout_secs);
        }
        if let Some(v) = get("DB_MAX_ATTEMPTS") {
            self.database.max_attempts = v.parse().unwrap_or(self.database.max_attempts);
        }
        if let Some(v) = get("DB_RETRY_BACKOFF_MS") {
            self.database.retry_backoff_ms = v.parse().unwrap_or(self.database.retry_backoff_ms);
        }
        if let Some(v) = get("DB_ENABLE_QUERY_LOGGING") {
            self.database.enable_query_logging = v.parse().unwrap_or(self.database.enable_query_logging);
        }

        // API overrides
        if let Some(v) = get("API_DEFAULT_PAGE_SIZE") {
            self.api.default_page_size = v.parse().unwrap_or(self.api.default_page_size);
        }
        if let Some(v) = get("API_MAX_PAGE_SIZE") {
            self.api.max_page_size = v.parse().unwrap_or(self.api.max_page_size);
        }
        if let Some(v) = get("MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }
        if let Some(v) = get("RATE_LIMIT_ENABLED") {
            self.api.rate_limit_enabled = v != "false" && v != "0";
        }
        if let Some(v) = get("API_RATE_LIMIT") {
            self.api.rate_limit_max = v.parse().unwrap_or(self.api.rate_limit_max);
        }
        if let Some(v) = get("API_RATE_LIMIT_WINDOW_SECS") {
            self.api.rate_limit_window_secs = v.parse().unwrap_or(self.api.rate_limit_window_secs);
        }

        // Security overrides
        if let Some(v) = get("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Some(v) = get("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Some(v) = get("JWT_REFRESH_WINDOW_DAYS") {
            self.security.refresh_window_days = v.parse().unwrap_or(self.security.refresh_window_days);
        }
        if let Some(v) = get("ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Some(v) = get("CORS_ORIGINS") {
            self.security.cors_origins = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Helpdesk overrides
        if let Some(v) = get("HELPDESK_TITLE") {
            self.helpdesk.title = v;
        }
        if let Some(v) = get("HELPDESK_URL") {
            self.helpdesk.url = v;
        }

        self
    }

    /// Reject configurations that must never reach a running server.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.environment == Environment::Production && self.security.jwt_secret == DEFAULT_JWT_SECRET {
            return Err(ConfigError::DefaultJwtSecret);
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidDatabase("DB_POOL_MAX must be at least 1".to_string()));
        }
        if self.api.rate_limit_enabled && (self.api.rate_limit_max == 0 || self.api.rate_limit_window_secs == 0) {
            return Err(ConfigError::InvalidRateLimit);
        }
        if self.database.min_connections > self.database.max_connections {
            return Err(ConfigError::InvalidDatabase(
                "DB_POOL_MIN cannot exceed DB_POOL_MAX".to_string(),
            ));
        }
        Ok(())
    }

    /// Copy of the configuration that is safe to print.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        copy.database.password = "********".to_string();
        copy.security.jwt_secret = "********".to_string();
        if let Some(url) = copy.database.url.as_mut() {
            if let Ok(mut parsed) = url::Url::parse(url) {
                if parsed.password().is_some() {
                    let _ = parsed.set_password(Some("********"));
                }
                *url = parsed.to_string();
            }
        }
        copy
    }

    fn base(environment: Environment) -> Self {
        Self {
            environment,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: None,
                host: "localhost".to_string(),
                port: 3306,
                name: "osticket".to_string(),
                user: "root".to_string(),
                password: String::new(),
                table_prefix: "ost_".to_string(),
                min_connections: 2,
                max_connections: 10,
                acquire_timeout_secs: 30,
                max_attempts: 3,
                retry_backoff_ms: 50,
                enable_query_logging: true,
            },
            api: ApiConfig {
                version: "v1".to_string(),
                default_page_size: 25,
                max_page_size: 100,
                max_request_size_bytes: 10 * 1024 * 1024, // 10MB
                rate_limit_enabled: true,
                rate_limit_max: 100,
                rate_limit_window_secs: 15 * 60,
            },
            security: SecurityConfig {
                jwt_secret: DEFAULT_JWT_SECRET.to_string(),
                jwt_expiry_hours: 24,
                refresh_window_days: 7,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
            },
            helpdesk: HelpdeskConfig {
                title: "Help Desk".to_string(),
                url: "http://localhost:3000".to_string(),
            },
        }
    }

    fn development() -> Self {
        Self::base(Environment::Development)
    }

    fn staging() -> Self {
        let mut config = Self::base(Environment::Staging);
        config.database.max_connections = 20;
        config.database.acquire_timeout_secs = 10;
        config.api.max_request_size_bytes = 5 * 1024 * 1024; // 5MB
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        let mut config = Self::base(Environment::Production);
        config.database.max_connections = 50;
        config.database.acquire_timeout_secs = 5;
        config.database.enable_query_logging = false;
        config.api.max_request_size_bytes = 2 * 1024 * 1024; // 2MB
        config.security.jwt_expiry_hours = 8;
        config.security.cors_origins = vec!["https://helpdesk.example.com".to_string()];
        config
    }
}
