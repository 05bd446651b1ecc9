//! SQLite-backed conversation history.
//!
//! Provides [`SqliteHistory`], a persistent [`History`](tcore::History)
//! implementation: one append-only `MSG` table whose autoincrement id is
//! the monotonic turn order, a `HISTORY` flag for soft deletion, image
//! paths as a JSON array column, and `-1` as the unknown-usage sentinel.
//!
//! All SQL lives in `sql/*.sql` files, loaded via `include_str!`.

use chrono::Local;
use rusqlite::Connection;
use std::{path::Path, sync::Mutex};
use tcore::{History, HistoryError, Turn};

const SQL_SCHEMA: &str = include_str!("../sql/schema.sql");
const SQL_APPEND: &str = include_str!("../sql/append.sql");
const SQL_USER_HISTORY: &str = include_str!("../sql/user_history.sql");
const SQL_GROUP_HISTORY: &str = include_str!("../sql/group_history.sql");
const SQL_MARK_UNAVAILABLE: &str = include_str!("../sql/mark_unavailable.sql");
const SQL_LAST_TURN: &str = include_str!("../sql/last_turn.sql");
const SQL_DELETE_TURN: &str = include_str!("../sql/delete_turn.sql");
const SQL_USAGE_TOTAL: &str = include_str!("../sql/usage_total.sql");
const SQL_USAGE_TODAY: &str = include_str!("../sql/usage_today.sql");

const SCHEMA_VERSION: i64 = 1;

/// Group column value for private chats.
const PRIVATE_GROUP: &str = "-1";

/// SQLite-backed history store.
///
/// Wraps a `rusqlite::Connection` in a `Mutex` for thread safety.
pub struct SqliteHistory {
    conn: Mutex<Connection>,
}

impl SqliteHistory {
    /// Open or create a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let conn = Connection::open(path.as_ref()).map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        tracing::info!("history database at {}", path.as_ref().display());
        Ok(store)
    }

    /// Create an in-memory database (useful for testing).
    pub fn in_memory() -> Result<Self, HistoryError> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        conn.execute_batch(SQL_SCHEMA).map_err(store_err)?;
        let versions: i64 = conn
            .query_row("SELECT count(*) FROM schema_version", [], |row| row.get(0))
            .map_err(store_err)?;
        if versions == 0 {
            conn.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                [SCHEMA_VERSION],
            )
            .map_err(store_err)?;
        }
        Ok(())
    }

    fn fetch(&self, sql: &str, key: &str, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        let mut stmt = conn.prepare(sql).map_err(store_err)?;
        // SQLite treats a negative LIMIT as "no limit".
        let bound = if limit == 0 { -1 } else { limit as i64 };
        let mut turns = stmt
            .query_map(rusqlite::params![key, bound], |row| row_turn(row, 0))
            .map_err(store_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(store_err)?;
        // Rows come newest first; callers expect oldest first.
        turns.reverse();
        Ok(turns)
    }
}

impl History for SqliteHistory {
    fn append(&self, turn: &Turn) -> Result<(), HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        let images = serde_json::to_string(&turn.images)
            .map_err(|e| HistoryError::Unavailable(e.to_string()))?;
        conn.execute(
            SQL_APPEND,
            rusqlite::params![
                turn.time,
                turn.user.as_str(),
                turn.group.as_deref().unwrap_or(PRIVATE_GROUP),
                turn.message,
                turn.reply,
                turn.history as i64,
                images,
                turn.tokens.map_or(-1, i64::from),
            ],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn user_history(&self, user: &str, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        self.fetch(SQL_USER_HISTORY, user, limit)
    }

    fn group_history(&self, group: &str, limit: usize) -> Result<Vec<Turn>, HistoryError> {
        self.fetch(SQL_GROUP_HISTORY, group, limit)
    }

    fn mark_unavailable(&self, user: &str) -> Result<(), HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        conn.execute(SQL_MARK_UNAVAILABLE, [user]).map_err(store_err)?;
        Ok(())
    }

    fn remove_last(&self, user: &str) -> Result<Option<Turn>, HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        let found = conn
            .query_row(SQL_LAST_TURN, [user], |row| {
                Ok((row.get::<_, i64>(0)?, row_turn(row, 1)?))
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                e => Err(e),
            })
            .map_err(store_err)?;

        let Some((id, turn)) = found else {
            return Ok(None);
        };
        conn.execute(SQL_DELETE_TURN, [id]).map_err(store_err)?;
        Ok(Some(turn))
    }

    fn usage(&self) -> Result<(u64, u64), HistoryError> {
        let conn = self.conn.lock().expect("history lock poisoned");
        let total: i64 = conn
            .query_row(SQL_USAGE_TOTAL, [], |row| row.get(0))
            .map_err(store_err)?;
        let today_prefix = format!("{}%", Local::now().format("%Y.%m.%d"));
        let today: i64 = conn
            .query_row(SQL_USAGE_TODAY, [today_prefix], |row| row.get(0))
            .map_err(store_err)?;
        Ok((today.max(0) as u64, total.max(0) as u64))
    }
}

/// Map one row to a [`Turn`], starting at column `base`.
fn row_turn(row: &rusqlite::Row<'_>, base: usize) -> rusqlite::Result<Turn> {
    let group: String = row.get(base + 2)?;
    let images: String = row.get(base + 6)?;
    let tokens: i64 = row.get(base + 7)?;
    Ok(Turn {
        time: row.get(base)?,
        user: row.get::<_, String>(base + 1)?.into(),
        group: (group != PRIVATE_GROUP).then(|| group.into()),
        message: row.get(base + 3)?,
        reply: row.get(base + 4)?,
        images: serde_json::from_str(&images).unwrap_or_default(),
        history: row.get::<_, i64>(base + 5)? != 0,
        tokens: u32::try_from(tokens).ok(),
    })
}

fn store_err(e: rusqlite::Error) -> HistoryError {
    HistoryError::Unavailable(e.to_string())
}
