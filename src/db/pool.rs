//! SQLite connection pool.
//!
//! The pool is the only resource shared between concurrent operations. Each
//! business operation holds one connection (inside one transaction) for its
//! whole duration, so the pool size bounds how many operations run at once.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

const MAX_CONNECTIONS: u32 = 8;

/// How long a connection waits for another writer's lock before failing
/// with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open a WAL-mode pool on `db_path`, creating the file if missing.
///
/// The parent directory must exist; [`super::initialize`] creates it.
pub async fn create_pool(db_path: &Path) -> Result<DbPool, sqlx::Error> {
    let connect_options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT)
        .pragma("wal_autocheckpoint", "1000");

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    log::debug!(
        "[db] Pool open on {} (max {} connections)",
        db_path.display(),
        MAX_CONNECTIONS
    );
    Ok(pool)
}
