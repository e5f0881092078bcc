use std::{
    str::FromStr,
    sync::atomic::{AtomicBool, Ordering},
    time::Duration,
};

use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use crate::config::DbConfig;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("database connection not available")]
    Unavailable,

    #[error("failed to connect to the database: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("duplicate value violates unique constraint {0}")]
    Conflict(String),

    #[error("the requested record was not found")]
    NotFound,

    #[error("database query failed: {0}")]
    Query(#[source] sqlx::Error),

    #[error("database migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for DbError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => DbError::NotFound,
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                DbError::Unavailable
            }
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                DbError::Conflict(db.constraint().unwrap_or("unique").to_string())
            }
            other => DbError::Query(other),
        }
    }
}

/// Owns the pool handle and the connected flag.
///
/// Handlers receive it through `AppState`; nothing reads connection state from
/// a global. The flag is advisory: a pool can still fail mid-request, in which
/// case the query error maps to [`DbError::Unavailable`].
pub struct Database {
    config: DbConfig,
    pool: RwLock<Option<PgPool>>,
    connected: AtomicBool,
}

impl Database {
    pub fn new(config: DbConfig) -> Self {
        Self {
            config,
            pool: RwLock::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Connects with exponential backoff, provisions the schema and sets the
    /// connected flag. Gives up after `max_retries` retries.
    pub async fn connect(&self) -> Result<(), DbError> {
        let attempts = self.config.max_retries + 1;
        for attempt in 1..=attempts {
            match self.try_connect().await {
                Ok(pool) => {
                    if let Some(old) = self.pool.write().await.replace(pool) {
                        old.close().await;
                    }
                    self.connected.store(true, Ordering::SeqCst);
                    info!(attempt, "connected to database");
                    return Ok(());
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "database connection attempt failed");
                    if attempt < attempts {
                        let delay = backoff_delay(self.config.retry_base_delay, attempt);
                        debug!(delay_ms = delay.as_millis() as u64, "retrying database connection");
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        self.connected.store(false, Ordering::SeqCst);
        error!(attempts, "giving up on database connection");
        Err(DbError::Unavailable)
    }

    async fn try_connect(&self) -> Result<PgPool, DbError> {
        let options = PgConnectOptions::from_str(&self.config.url)
            .map_err(DbError::Connect)?
            .options([(
                "statement_timeout",
                self.config.statement_timeout.as_millis(),
            )]);

        let pool = PgPoolOptions::new()
            .max_connections(self.config.max_connections)
            .min_connections(self.config.min_connections)
            .acquire_timeout(self.config.connect_timeout)
            .connect_with(options)
            .await
            .map_err(DbError::Connect)?;

        sqlx::query("SELECT 1")
            .execute(&pool)
            .await
            .map_err(DbError::Connect)?;

        provision_schema(&pool).await?;
        Ok(pool)
    }

    /// Probes a live connection, reconnecting when the probe fails or the
    /// manager is not connected.
    pub async fn ensure_connection(&self) -> Result<(), DbError> {
        if self.is_connected() {
            match self.ping().await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    warn!(error = %e, "database liveness probe failed");
                    self.connected.store(false, Ordering::SeqCst);
                }
            }
        }
        self.connect().await
    }

    async fn ping(&self) -> Result<(), DbError> {
        let pool = self.pool().await?;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Pool handle for a single operation.
    pub async fn pool(&self) -> Result<PgPool, DbError> {
        if !self.is_connected() {
            return Err(DbError::Unavailable);
        }
        self.pool.read().await.clone().ok_or(DbError::Unavailable)
    }

    pub async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(pool) = self.pool.write().await.take() {
            pool.close().await;
            info!("database connection closed");
        }
    }
}

/// Creates tables and indexes: unique user email and phone, diagnosis owner
/// and creation time, unique advisory key.
async fn provision_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Delay before retry `attempt` (1-based): `base`, `2 * base`, `4 * base`, ...
pub fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    base.saturating_mul(1u32 << exp)
}
