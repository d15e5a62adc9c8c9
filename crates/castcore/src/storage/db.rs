use chrono::{DateTime, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;

use crate::core::config;
use crate::core::error::{AppError, AppResult};
use crate::storage::migrations::run_migrations;

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Every pooled connection enables foreign keys (delivery records cascade
/// with their broadcast and recipient), WAL journaling and a busy timeout.
/// Schema migrations run once on a dedicated connection before the pool is
/// returned, so a broken database is a startup failure.
///
/// # Example
///
/// ```no_run
/// use castcore::storage::create_pool;
///
/// let pool = create_pool("castbot.sqlite")?;
/// # Ok::<(), castcore::core::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path).with_init(|conn| {
        conn.busy_timeout(config::database::busy_timeout())?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        let _mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        Ok(())
    });

    let pool = Pool::builder()
        .max_size(config::database::MAX_POOL_SIZE)
        .build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn).map_err(|e| AppError::Migration(format!("{:#}", e)))?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> AppResult<DbConnection> {
    Ok(pool.get()?)
}

/// Current instant, truncated to milliseconds so values survive a round trip
/// through SQLite text unchanged.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Parses an optional JSON blob column.
pub(crate) fn json_column(raw: Option<String>) -> Option<serde_json::Value> {
    raw.and_then(|s| match serde_json::from_str(&s) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Ignoring malformed JSON column: {}", e);
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_pool_runs_migrations() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        let conn = get_connection(&pool).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
                 ('users', 'broadcasts', 'message_deliveries', 'scheduled_messages', 'bot_settings')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);

        let fk: i64 = conn.query_row("PRAGMA foreign_keys", [], |row| row.get(0)).unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn test_create_pool_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.sqlite");
        create_pool(path.to_str().unwrap()).unwrap();
        assert!(create_pool(path.to_str().unwrap()).is_ok());
    }

    #[test]
    fn test_now_has_millisecond_precision() {
        assert_eq!(now().timestamp_subsec_nanos() % 1_000_000, 0);
    }

    #[test]
    fn test_json_column_drops_garbage() {
        assert_eq!(json_column(Some("{\"a\":1}".into())), Some(serde_json::json!({"a": 1})));
        assert_eq!(json_column(Some("{oops".into())), None);
        assert_eq!(json_column(None), None);
    }
}
