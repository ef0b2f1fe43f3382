//! Database layer for the SQLite entity store.
//!
//! This module handles:
//! - Connection pool management with WAL mode
//! - Schema migrations
//! - Transaction begin/commit/rollback
//!
//! Per-entity queries live in [`teams`], [`users`] and [`pull_requests`].
//! Every query function is generic over an sqlx [`sqlx::Executor`], so the
//! caller picks the execution context explicitly: `&pool` for an ad-hoc
//! statement, or `&mut *tx` to run inside an open transaction.

pub mod pool;
pub mod pull_requests;
pub mod teams;
pub mod users;

use sqlx::{Sqlite, Transaction};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Database-related errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),
}

/// An open read-write transaction on the store.
pub type DbTransaction = Transaction<'static, Sqlite>;

/// Initialize the database: create the file if needed and run migrations.
///
/// # Arguments
/// * `db_path` - Path to the SQLite database file
///
/// # Returns
/// A connection pool configured with WAL mode
pub async fn initialize(db_path: &Path) -> Result<pool::DbPool, DbError> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            DbError::Migration(format!("Failed to create database directory: {}", e))
        })?;
    }

    let pool = pool::create_pool(db_path).await?;

    run_migrations(&pool).await?;

    log::info!("[db] Store ready at {}", db_path.display());
    Ok(pool)
}

/// Begin a read-write transaction.
///
/// SQLite executes every transaction with serializable isolation. The
/// transaction is deferred: a writer whose read snapshot went stale because
/// another transaction committed first fails with `SQLITE_BUSY_SNAPSHOT`,
/// which surfaces as [`crate::error::AppError::Conflict`].
pub async fn begin(pool: &pool::DbPool) -> Result<DbTransaction, sqlx::Error> {
    pool.begin().await
}

/// Commit a transaction.
pub async fn commit(tx: DbTransaction) -> Result<(), sqlx::Error> {
    tx.commit().await
}

/// Roll back a transaction.
///
/// Failures are logged rather than returned so the error that caused the
/// rollback is the one the caller sees.
pub async fn rollback(tx: DbTransaction) {
    if let Err(e) = tx.rollback().await {
        log::warn!("[db] Rollback failed: {}", e);
    }
}

/// Current Unix timestamp in milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Embedded migrations, applied in order and recorded by name.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_initial_schema",
        include_str!("migrations/0001_initial_schema.sql"),
    ),
    (
        "0002_reviewer_index",
        include_str!("migrations/0002_reviewer_index.sql"),
    ),
];

/// Apply every migration not yet recorded in `_migrations`.
///
/// Each migration runs in its own transaction together with its bookkeeping
/// row, so a failed migration leaves no partial schema behind.
async fn run_migrations(pool: &pool::DbPool) -> Result<(), DbError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _migrations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    for &(name, sql) in MIGRATIONS {
        let applied: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = ?)")
                .bind(name)
                .fetch_one(pool)
                .await?;
        if applied {
            continue;
        }

        let mut tx = begin(pool).await?;
        sqlx::raw_sql(sql)
            .execute(&mut *tx)
            .await
            .map_err(|e| DbError::Migration(format!("{}: {}", name, e)))?;
        sqlx::query("INSERT INTO _migrations (name) VALUES (?)")
            .bind(name)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        log::info!("[db] Applied migration {}", name);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_initialize_creates_database() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let pool = initialize(&db_path).await.unwrap();

        assert!(db_path.exists());

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name != '_migrations' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let table_names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(
            table_names,
            vec!["pull_request_reviewers", "pull_requests", "teams", "users"]
        );
    }

    #[tokio::test]
    async fn test_migrations_are_idempotent() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");

        let _pool1 = initialize(&db_path).await.unwrap();
        let pool2 = initialize(&db_path).await.unwrap();

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM _migrations")
            .fetch_one(&pool2)
            .await
            .unwrap();
        assert_eq!(count.0, MIGRATIONS.len() as i64);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let dir = tempdir().unwrap();
        let pool = initialize(&dir.path().join("test.db")).await.unwrap();

        let mut tx = begin(&pool).await.unwrap();
        sqlx::query("INSERT INTO teams (team_name) VALUES ('backend')")
            .execute(&mut *tx)
            .await
            .unwrap();
        rollback(tx).await;

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM teams")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
