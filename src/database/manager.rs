use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::DatabaseConfig;

/// Errors from DatabaseManager
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Owns the Postgres pool. Constructed once at startup and shared through the
/// application state; connections are opened lazily on first use.
#[derive(Clone)]
pub struct DatabaseManager {
    pool: PgPool,
}

impl DatabaseManager {
    /// Build the pool without connecting, so the service starts even when
    /// Postgres is briefly unreachable.
    pub fn connect_lazy(config: &DatabaseConfig) -> Self {
        let pool = PgPoolOptions::new()
            .min_connections(config.min_connections)
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .connect_lazy_with(config.connect_options());

        info!(
            host = %config.host,
            database = %config.database,
            max_connections = config.max_connections,
            "Created database pool"
        );
        Self { pool }
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => DatabaseError::ConnectionError(e.to_string()),
                other => DatabaseError::Sqlx(other),
            })?;
        Ok(())
    }

    /// Close the pool (e.g., on shutdown)
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }
}
