use crate::config::DatabaseConfig;
use sqlx::migrate::Migrator;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Could not connect to PostgreSQL: {0}")]
    Connect(sqlx::Error),

    #[error("No database connection available within the acquire timeout")]
    Unavailable,

    #[error("Database query error: {0}")]
    Query(sqlx::Error),

    #[error("Migrations in {path} failed: {source}")]
    Migration {
        path: String,
        #[source]
        source: sqlx::migrate::MigrateError,
    },
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::Unavailable,
            other => DatabaseError::Query(other),
        }
    }
}

/// Pool handle kept by the app state for health checks
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn ping(&self) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Open the pool and log the server version it reached
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .test_before_acquire(config.test_before_acquire)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::Connect)?;

    let version: String = sqlx::query_scalar("SHOW server_version")
        .fetch_one(&pool)
        .await
        .map_err(DatabaseError::Connect)?;
    info!("Connected to PostgreSQL {}", version);

    Ok(pool)
}

/// Apply pending migrations from `config.migrations_path`; returns how many the directory holds
pub async fn run_migrations(pool: &PgPool, config: &DatabaseConfig) -> Result<usize, DatabaseError> {
    let path = config.migrations_path.as_str();
    let migration_error = |source| DatabaseError::Migration {
        path: path.to_string(),
        source,
    };

    let migrator = Migrator::new(Path::new(path)).await.map_err(migration_error)?;
    migrator.run(pool).await.map_err(migration_error)?;

    Ok(migrator.iter().count())
}
