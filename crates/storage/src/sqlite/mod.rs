//! `SQLite` persistence for completion history.

use std::sync::Arc;
use std::time::Duration;

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{ProgressRepository, Storage};

mod mapping;
mod migrate;
mod progress_repo;

pub use migrate::LATEST_VERSION;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error("database schema version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },
}

/// Pool sizing and lock waiting for the history database.
///
/// The history sees one writer per finished session, so a small pool is
/// enough; `busy_timeout` covers a second process appending at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub busy_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 4,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Completion history stored in a `SQLite` database.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

impl SqliteRepository {
    /// Open the database with default options, without touching the schema.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Sqlx` if the pool cannot be opened.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        Self::connect_with(database_url, ConnectOptions::default()).await
    }

    /// Open the database with explicit pool options.
    ///
    /// Every pooled connection runs in WAL mode with the configured busy timeout.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Sqlx` if the pool cannot be opened or a
    /// connection pragma fails.
    pub async fn connect_with(
        database_url: &str,
        options: ConnectOptions,
    ) -> Result<Self, SqliteInitError> {
        let busy_ms = u64::try_from(options.busy_timeout.as_millis()).unwrap_or(u64::MAX);
        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .acquire_timeout(options.acquire_timeout)
            .after_connect(move |conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    let busy = format!("PRAGMA busy_timeout = {busy_ms};");
                    sqlx::query(&busy).execute(&mut *conn).await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Open the database and bring its schema up to [`LATEST_VERSION`].
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::SchemaTooNew` when the file was written by a
    /// newer build, and `SqliteInitError::Sqlx` for connection or migration
    /// failures.
    pub async fn connect_and_migrate(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = Self::connect(database_url).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Apply pending migrations; a no-op on an up-to-date database.
    ///
    /// # Errors
    ///
    /// See [`SqliteRepository::connect_and_migrate`].
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await?;
        let found = self.schema_version().await?;
        if found > LATEST_VERSION {
            return Err(SqliteInitError::SchemaTooNew {
                found,
                supported: LATEST_VERSION,
            });
        }
        Ok(())
    }

    /// Highest applied migration, 0 before the first `migrate`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError::Sqlx` if the version table cannot be read.
    pub async fn schema_version(&self) -> Result<i64, SqliteInitError> {
        Ok(migrate::current_version(&self.pool).await?)
    }
}

impl Storage {
    /// Completion history in the `SQLite` database at `database_url`, migrated
    /// to the current schema.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the database cannot be opened or migrated.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let progress: Arc<dyn ProgressRepository> =
            Arc::new(SqliteRepository::connect_and_migrate(database_url).await?);
        Ok(Self { progress })
    }
}
