use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::filter::{is_valid_identifier, FilterError};

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error("Session is closed")]
    SessionClosed,

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("Failed to decode row: {0}")]
    Decode(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connection pools for read-write and (optionally) read-only traffic
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
    ro_pool: Option<PgPool>,
}

impl DatabaseManager {
    /// Connect the read-write pool, plus the read-only pool when a replica
    /// URL is configured.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let url = config.url.as_deref().ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;
        let pool = Self::create_pool(config, url).await?;
        info!("Created database pool (max_connections={})", config.max_connections);

        let ro_pool = match config.read_only_url.as_deref() {
            Some(ro_url) => {
                let ro_pool = Self::create_pool(config, ro_url).await?;
                info!("Created read-only database pool");
                Some(ro_pool)
            }
            None => None,
        };

        Ok(Self { pool, ro_pool })
    }

    pub fn from_pools(pool: PgPool, ro_pool: Option<PgPool>) -> Self {
        Self { pool, ro_pool }
    }

    async fn create_pool(config: &DatabaseConfig, base: &str) -> Result<PgPool, DatabaseError> {
        let connection_string = Self::build_connection_string(base, config)?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(&connection_string)
            .await?;
        Ok(pool)
    }

    /// Add application name and search_path to the configured URL
    fn build_connection_string(base: &str, config: &DatabaseConfig) -> Result<String, DatabaseError> {
        let mut url = url::Url::parse(base).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("application_name", &config.application_name);
            if let Some(schema) = config.schema.as_deref() {
                if !is_valid_identifier(schema) {
                    return Err(DatabaseError::InvalidIdentifier(schema.to_string()));
                }
                pairs.append_pair("options", &format!("-c search_path={}", schema));
            }
        }
        Ok(url.into_string())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Read-only pool, falling back to the read-write pool
    pub fn read_only_pool(&self) -> &PgPool {
        self.ro_pool.as_ref().unwrap_or(&self.pool)
    }

    pub fn has_read_only_pool(&self) -> bool {
        self.ro_pool.is_some()
    }

    /// Pings the read-write pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close all pools (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        if let Some(ro_pool) = &self.ro_pool {
            ro_pool.close().await;
        }
        info!("Closed database pools");
    }

    /// Quote SQL identifier to prevent injection
    pub fn quote_identifier(name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}
