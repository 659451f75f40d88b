//! SQLite schema for the range store.
//!
//! The layout is part of the external interface: other tools read the same
//! file, so table and column names must not drift.

use rusqlite::Connection;

/// One row per cached range.
pub const CREATE_ENTRIES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source TEXT NOT NULL,
    symbol TEXT NOT NULL,
    field TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    cached_at TEXT NOT NULL,
    UNIQUE(source, symbol, field, start_date, end_date)
);
"#;

/// Points of a cached range; removed with their parent entry.
pub const CREATE_DATA_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS data (
    entry_id INTEGER NOT NULL REFERENCES entries(id) ON DELETE CASCADE,
    date TEXT NOT NULL,
    value REAL,
    PRIMARY KEY (entry_id, date)
);
"#;

pub const CREATE_LOOKUP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_entries_lookup ON entries(source, symbol, field);
"#;

/// Connection-level settings applied on every open.
///
/// `foreign_keys` is off by default in SQLite and must be enabled per
/// connection for the cascade to fire. WAL lets readers proceed while one
/// writer holds the lock.
pub fn apply_pragmas(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    let _mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    Ok(())
}

/// Create all tables and indexes if they do not exist yet.
pub fn ensure_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_ENTRIES_TABLE)?;
    conn.execute_batch(CREATE_DATA_TABLE)?;
    conn.execute_batch(CREATE_LOOKUP_INDEX)?;
    Ok(())
}
