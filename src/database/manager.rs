use std::time::Duration;

use sqlx::mysql::{MySqlDatabaseError, MySqlPool, MySqlPoolOptions};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::database::tables::Tables;

/// MySQL server error numbers the store reacts to.
const ER_DUP_ENTRY: u16 = 1062;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;
const CR_SERVER_GONE_ERROR: u16 = 2006;
const CR_SERVER_LOST: u16 = 2013;

/// Errors from the data-access layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid table prefix: {0}")]
    InvalidTablePrefix(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// COMMIT did not acknowledge. The write may or may not have been applied,
    /// so this is never retried.
    #[error("Commit outcome unknown: {0}")]
    CommitFailed(sqlx::Error),

    #[error("Generated id {0} is out of range")]
    IdOutOfRange(u64),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl DatabaseError {
    fn mysql_error_number(&self) -> Option<u16> {
        match self {
            DatabaseError::Sqlx(err) => err
                .as_database_error()
                .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
                .map(|mysql| mysql.number()),
            _ => None,
        }
    }

    /// Failures worth retrying: the same statement may succeed a moment later.
    pub fn is_transient(&self) -> bool {
        match self {
            DatabaseError::Sqlx(sqlx::Error::Io(_))
            | DatabaseError::Sqlx(sqlx::Error::PoolTimedOut)
            | DatabaseError::Sqlx(sqlx::Error::WorkerCrashed) => true,
            DatabaseError::Sqlx(sqlx::Error::Database(_)) => matches!(
                self.mysql_error_number(),
                Some(ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK | CR_SERVER_GONE_ERROR | CR_SERVER_LOST)
            ),
            _ => false,
        }
    }

    /// Unique-key violation, e.g. a ticket number collision.
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, DatabaseError::DuplicateKey(_)) || self.mysql_error_number() == Some(ER_DUP_ENTRY)
    }
}

/// Owns the process connection pool. Opened once at start-up and closed on shutdown.
pub struct DatabaseManager {
    pool: MySqlPool,
    tables: Tables,
}

impl DatabaseManager {
    /// Connect the pool and verify the table prefix.
    pub async fn open(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let tables = Tables::new(&config.table_prefix)?;
        let connection_string = Self::connection_string(config)?;

        let pool = MySqlPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
            .connect(&connection_string)
            .await?;

        info!(
            "MySQL connection pool initialized ({}..{} connections, prefix '{}')",
            config.min_connections,
            config.max_connections,
            tables.prefix()
        );

        Ok(Self { pool, tables })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn tables(&self) -> &Tables {
        &self.tables
    }

    /// Build the connection URL from DATABASE_URL or the discrete DB_* settings.
    pub fn connection_string(config: &DatabaseConfig) -> Result<String, DatabaseError> {
        if let Some(url) = &config.url {
            let parsed = url::Url::parse(url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
            return Ok(parsed.into());
        }

        if config.host.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("DB_HOST"));
        }
        if config.name.trim().is_empty() {
            return Err(DatabaseError::ConfigMissing("DB_NAME"));
        }

        let mut url = url::Url::parse("mysql://localhost").map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_host(Some(&config.host))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_port(Some(config.port))
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        url.set_username(&config.user)
            .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !config.password.is_empty() {
            url.set_password(Some(&config.password))
                .map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        }
        url.set_path(&format!("/{}", config.name));
        Ok(url.into())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection pool closed");
    }
}
