//! Database pool setup, migrations, and the contention retry policy.

use crate::config::DatabaseConfig;
use crate::error::AppResult;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Errors that can occur when working with the database
#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to create database pool: {0}")]
    PoolCreation(sqlx::Error),

    #[error("Database query error: {0}")]
    QueryError(sqlx::Error),

    #[error("Database connection timeout")]
    ConnectionTimeout,

    #[error("Database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(err: sqlx::Error) -> Self {
        DatabaseError::QueryError(err)
    }
}

/// Database wrapper that holds the connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new Database instance with the given pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the underlying connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Get ownership of the pool (useful for passing to repositories)
    pub fn into_pool(self) -> PgPool {
        self.pool
    }
}

/// Create a PostgreSQL connection pool with the configured limits and
/// timeouts, verifying connectivity before returning.
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .max_lifetime(config.max_lifetime())
        .test_before_acquire(config.test_before_acquire)
        .connect(&config.url)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    // Test the connection
    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .map_err(DatabaseError::PoolCreation)?;

    Ok(pool)
}

/// Run database migrations from `migrations_path` (default "./migrations")
pub async fn run_migrations(
    pool: &PgPool,
    migrations_path: Option<&str>,
) -> Result<(), DatabaseError> {
    let path = migrations_path.unwrap_or("./migrations");
    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(path))
        .await
        .map_err(DatabaseError::Migration)?;

    migrator.run(pool).await.map_err(DatabaseError::Migration)?;

    Ok(())
}

/// Maximum attempts for an operation aborted by writer contention
pub const MAX_CONTENTION_ATTEMPTS: u32 = 3;

/// Base delay for the exponential backoff between contention retries
const CONTENTION_BASE_DELAY: Duration = Duration::from_millis(100);

/// Run `op`, retrying on storage contention with exponential backoff.
///
/// Contention covers serialization failures, deadlocks, lock timeouts, and
/// conditional updates that matched no row because a concurrent fill got
/// there first. Each retry re-runs the whole closure so the operation
/// re-reads current state. After `MAX_CONTENTION_ATTEMPTS` the last error
/// surfaces as fatal.
pub async fn retry_on_contention<T, F, Fut>(mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Err(err) if err.is_contention() && attempt < MAX_CONTENTION_ATTEMPTS => {
                let delay = CONTENTION_BASE_DELAY * 2u32.pow(attempt - 1);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "storage contention, retrying: {}",
                    err
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            other => return other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_contention_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result: AppResult<u32> = retry_on_contention(|| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(AppError::Contention("lost update race".into()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry_on_contention(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Contention("still locked".into())) }
        })
        .await;

        assert!(result.unwrap_err().is_contention());
        assert_eq!(calls.load(Ordering::SeqCst), MAX_CONTENTION_ATTEMPTS);
    }

    #[tokio::test]
    async fn non_contention_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = retry_on_contention(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(AppError::Validation("bad input".into())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
