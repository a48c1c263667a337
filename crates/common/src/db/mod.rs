//! Database layer
//!
//! Provides:
//! - SeaORM entity models for statistics and harvest bookkeeping
//! - Repository pattern for data access
//! - Connection pool management

pub mod models;
mod repository;

pub use repository::{PidCount, Repository};

use crate::config::DatabaseConfig;
use crate::errors::{RepoError, Result};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::time::Duration;
use tracing::info;

/// Database connection pool wrapper
#[derive(Clone)]
pub struct DbPool {
    pub conn: DatabaseConnection,
}

impl DbPool {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        info!("Connecting to statistics database...");

        let mut opts = ConnectOptions::new(&config.url);
        opts.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .sqlx_logging(true);

        let conn = Database::connect(opts).await.map_err(|e| RepoError::Configuration {
            message: format!("Failed to connect to database: {e}"),
        })?;

        info!("Database connection established");
        Ok(Self { conn })
    }

    pub async fn ping(&self) -> Result<()> {
        use sea_orm::ConnectionTrait;
        self.conn
            .execute_unprepared("SELECT 1")
            .await
            .map_err(|e| RepoError::unavailable("database", format!("ping failed: {e}")))?;
        Ok(())
    }
}
