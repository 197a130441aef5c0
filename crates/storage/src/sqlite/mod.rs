use std::sync::Arc;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::{Sqlite, SqliteConnection, SqlitePool, sqlite::SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{FlowchartRepository, SessionRepository, Storage, StorageError};
use mapping::conn;

mod flowchart_repo;
mod mapping;
mod migrate;
mod session_repo;

#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Connect to `SQLite` using the given URL.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if the connection cannot be established or if
    /// enforcing foreign key constraints fails during setup.
    pub async fn connect(database_url: &str) -> Result<Self, SqliteInitError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA journal_mode = WAL;")
                        .execute(&mut *conn)
                        .await?;
                    sqlx::query("PRAGMA busy_timeout = 5000;")
                        .execute(&mut *conn)
                        .await?;
                    Ok(())
                })
            })
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    /// Create tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if migration queries fail.
    pub async fn migrate(&self) -> Result<(), SqliteInitError> {
        migrate::run_migrations(&self.pool).await
    }
}

/// A pooled connection inside `BEGIN IMMEDIATE`.
///
/// The database write lock is taken up front, so reads made through the
/// transaction see the latest commit and no other connection, in this process
/// or another, can write until `finish`. Dropping it unfinished closes the
/// connection, which rolls the transaction back.
pub(crate) struct ImmediateTx {
    conn: Option<PoolConnection<Sqlite>>,
}

impl ImmediateTx {
    pub(crate) async fn begin(pool: &SqlitePool) -> Result<Self, StorageError> {
        let mut db = pool.acquire().await.map_err(conn)?;
        sqlx::query("BEGIN IMMEDIATE")
            .execute(&mut *db)
            .await
            .map_err(conn)?;
        Ok(Self { conn: Some(db) })
    }

    pub(crate) fn conn(&mut self) -> Result<&mut SqliteConnection, StorageError> {
        self.conn
            .as_deref_mut()
            .ok_or_else(|| StorageError::Connection("transaction already finished".into()))
    }

    /// Commit when `result` is `Ok`, roll back otherwise.
    pub(crate) async fn finish<T>(
        mut self,
        result: Result<T, StorageError>,
    ) -> Result<T, StorageError> {
        let Some(mut db) = self.conn.take() else {
            return result;
        };
        let statement = if result.is_ok() { "COMMIT" } else { "ROLLBACK" };
        if let Err(e) = sqlx::query(statement).execute(&mut *db).await {
            drop(db.detach());
            return result.and(Err(conn(e)));
        }
        result
    }
}

impl Drop for ImmediateTx {
    fn drop(&mut self) {
        if let Some(db) = self.conn.take() {
            drop(db.detach());
        }
    }
}

impl Storage {
    /// Build a `Storage` backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` if connection or migrations cannot be
    /// completed.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::connect(database_url).await?;
        repo.migrate().await?;
        let sessions: Arc<dyn SessionRepository> = Arc::new(repo.clone());
        let flowcharts: Arc<dyn FlowchartRepository> = Arc::new(repo);
        Ok(Self {
            sessions,
            flowcharts,
        })
    }
}
