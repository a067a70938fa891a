//! Database connection pool
//!
//! Each logical request checks out its own connection with
//! [`Database::acquire`] and hands it to a repository. Transactions are the
//! caller's business: begin one on the checked-out connection and pass the
//! transaction instead.

pub mod executor;

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::pool::PoolConnection;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres};

use crate::config::DatabaseConfig;

pub use executor::SqlExecutor;

/// Database wrapper providing connection pool access
#[derive(Debug, Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Wrap an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn options(config: &DatabaseConfig) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(10))
    }

    /// Create a new connection pool
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let pool = Self::options(config)
            .connect(&config.url)
            .await
            .context("Failed to connect to database")?;

        tracing::info!(
            service = "database",
            max_connections = config.max_connections,
            "Database connected"
        );
        Ok(Self { pool })
    }

    /// Create a new connection pool, retrying up to `connect_retries` times
    pub async fn connect_with_retry(config: &DatabaseConfig) -> Result<Self> {
        let attempts = config.connect_retries.max(1);
        let mut attempt = 1;
        loop {
            match Self::options(config).connect(&config.url).await {
                Ok(pool) => {
                    tracing::info!(service = "database", attempt, "Database connected");
                    return Ok(Self { pool });
                }
                Err(e) if attempt < attempts => {
                    tracing::warn!(
                        service = "database",
                        error = %e,
                        attempt,
                        retry_in_ms = config.retry_delay.as_millis() as u64,
                        "Database connection failed, retrying"
                    );
                    tokio::time::sleep(config.retry_delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to connect to database after {attempts} attempts")
                    });
                }
            }
        }
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check out one connection for a single logical request
    pub async fn acquire(&self) -> Result<PoolConnection<Postgres>> {
        self.pool
            .acquire()
            .await
            .context("Failed to acquire database connection")
    }
}
