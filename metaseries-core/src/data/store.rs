//! SQLite range store with superset-or-miss lookups.
//!
//! Layout: one `entries` row per cached `(source, symbol, field, start, end)`
//! range, one `data` row per point (see [`super::schema`]).
//!
//! Behaviour:
//! - A lookup hits only if a stored range for the same series fully contains
//!   the requested range; partial overlaps miss and are never stitched
//! - Upserts replace the identical range only; other ranges for the same
//!   series are left untouched
//! - The connection is released on `close()` or on drop, whichever comes first

use super::schema;
use crate::domain::{CacheKey, Observation, Series};
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// How long a writer waits on another process's lock before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Cache I/O failure. Never surfaced past the fetch coordinator.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("cache directory error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache store is closed")]
    Closed,

    #[error("invalid stored date '{value}'")]
    BadDate { value: String },

    #[error("point dated {date} lies outside the range {start}..{end}")]
    OutOfRange {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
}

/// A stored range and the points that satisfied a lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSeries {
    /// The stored range that matched (may be wider than the request).
    pub key: CacheKey,
    /// Points sliced to the requested range.
    pub series: Series,
    pub cached_at: DateTime<Utc>,
}

/// Which entries [`RangeStore::clear`] removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClearFilter {
    All,
    Source(String),
    Symbol(String),
}

/// One row of [`RangeStore::list_entries`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub source: String,
    pub symbol: String,
    pub field: Option<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub cached_at: String,
    pub points: usize,
}

/// The range store.
///
/// One handle per process, shared behind an `Arc`. The connection sits
/// behind a mutex; cross-process writers are serialised by SQLite's own
/// file locking.
pub struct RangeStore {
    conn: Mutex<Option<Connection>>,
    path: Option<PathBuf>,
}

impl RangeStore {
    /// Open (creating if missing) the store file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::prepare(&conn)?;
        tracing::info!(path = %path.display(), "cache_initialized");

        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: Some(path.to_path_buf()),
        })
    }

    /// Private in-memory store, mostly for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::prepare(&conn)?;
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            path: None,
        })
    }

    fn prepare(conn: &Connection) -> Result<(), StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        schema::apply_pragmas(conn)?;
        schema::ensure_schema(conn)?;
        Ok(())
    }

    /// File backing the store; `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut guard = self.conn.lock();
        let conn = guard.as_mut().ok_or(StoreError::Closed)?;
        f(conn)
    }

    /// Find a stored range that fully contains `key`'s range.
    ///
    /// Returns `Ok(None)` on a miss. When several stored ranges qualify the
    /// tightest one wins (latest start, then earliest end).
    pub fn lookup(&self, key: &CacheKey) -> Result<Option<CachedSeries>, StoreError> {
        self.with_conn(|conn| {
            // Both reads share one snapshot so a concurrent upsert of the same
            // key cannot delete the matched entry between them.
            let tx = conn.transaction()?;
            let Some(entry) = find_superset(&tx, key)? else {
                return Ok(None);
            };
            let series = load_points(&tx, entry.id, key.start, key.end)?;
            tx.finish()?;

            Ok(Some(CachedSeries {
                key: CacheKey {
                    source: key.source.clone(),
                    symbol: key.symbol.clone(),
                    field: key.field.clone(),
                    start: entry.start,
                    end: entry.end,
                },
                series,
                cached_at: entry.cached_at,
            }))
        })
    }

    /// Store `series` under exactly `key`, replacing an identical range.
    ///
    /// Every point must lie within `[key.start, key.end]`.
    pub fn upsert(&self, key: &CacheKey, series: &Series) -> Result<(), StoreError> {
        if let Some(point) = series
            .points()
            .iter()
            .find(|p| p.date < key.start || p.date > key.end)
        {
            return Err(StoreError::OutOfRange {
                date: point.date,
                start: key.start,
                end: key.end,
            });
        }

        self.with_conn(|conn| {
            let start = key.start.format(DATE_FORMAT).to_string();
            let end = key.end.format(DATE_FORMAT).to_string();
            let cached_at = Utc::now().to_rfc3339();

            let tx = conn.transaction()?;
            // `IS` rather than `=` so a NULL field matches only NULL; the
            // UNIQUE constraint alone treats NULLs as distinct.
            tx.execute(
                "DELETE FROM entries
                 WHERE source = ?1 AND symbol = ?2 AND field IS ?3
                   AND start_date = ?4 AND end_date = ?5",
                params![key.source, key.symbol, key.field, start, end],
            )?;
            tx.execute(
                "INSERT INTO entries (source, symbol, field, start_date, end_date, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![key.source, key.symbol, key.field, start, end, cached_at],
            )?;
            let entry_id = tx.last_insert_rowid();
            {
                let mut stmt =
                    tx.prepare("INSERT INTO data (entry_id, date, value) VALUES (?1, ?2, ?3)")?;
                for point in series.points() {
                    let value = if point.value.is_nan() {
                        None
                    } else {
                        Some(point.value)
                    };
                    stmt.execute(params![
                        entry_id,
                        point.date.format(DATE_FORMAT).to_string(),
                        value
                    ])?;
                }
            }
            tx.commit()?;

            tracing::debug!(key = %key, points = series.len(), "cache_put");
            Ok(())
        })
    }

    /// Delete entries matching `filter`. Returns the number of entries removed.
    pub fn clear(&self, filter: &ClearFilter) -> Result<usize, StoreError> {
        let removed = self.with_conn(|conn| {
            let n = match filter {
                ClearFilter::All => conn.execute("DELETE FROM entries", [])?,
                ClearFilter::Source(source) => {
                    conn.execute("DELETE FROM entries WHERE source = ?1", params![source])?
                }
                ClearFilter::Symbol(symbol) => {
                    conn.execute("DELETE FROM entries WHERE symbol = ?1", params![symbol])?
                }
            };
            Ok(n)
        })?;
        tracing::info!(filter = ?filter, removed, "cache_cleared");
        Ok(removed)
    }

    /// Delete every cached range of one exact `(source, symbol, field)` series.
    pub fn clear_series(
        &self,
        source: &str,
        symbol: &str,
        field: Option<&str>,
    ) -> Result<usize, StoreError> {
        let removed = self.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM entries WHERE source = ?1 AND symbol = ?2 AND field IS ?3",
                params![source, symbol, field],
            )?)
        })?;
        tracing::info!(source, symbol, field, removed, "cache_cleared");
        Ok(removed)
    }

    /// Every cached range, ordered by source, symbol, then start date.
    pub fn list_entries(&self) -> Result<Vec<EntrySummary>, StoreError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT e.source, e.symbol, e.field, e.start_date, e.end_date, e.cached_at,
                        COUNT(d.date)
                 FROM entries e
                 LEFT JOIN data d ON d.entry_id = e.id
                 GROUP BY e.id
                 ORDER BY e.source, e.symbol, e.start_date, e.end_date",
            )?;
            let rows: Vec<(String, String, Option<String>, String, String, String, i64)> = stmt
                .query_map([], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?
                .collect::<Result<_, _>>()?;

            rows.into_iter()
                .map(|(source, symbol, field, start, end, cached_at, points)| {
                    Ok(EntrySummary {
                        source,
                        symbol,
                        field,
                        start: parse_date(&start)?,
                        end: parse_date(&end)?,
                        cached_at,
                        points: points.max(0) as usize,
                    })
                })
                .collect()
        })
    }

    /// Release the connection. Safe to call more than once; failures are
    /// logged and swallowed.
    pub fn close(&self) {
        let Some(conn) = self.conn.lock().take() else {
            return;
        };
        match conn.close() {
            Ok(()) => tracing::debug!("cache_closed"),
            Err((_conn, e)) => tracing::warn!(error = %e, "cache_close_failed"),
        }
    }
}

impl Drop for RangeStore {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for RangeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RangeStore")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

struct StoredEntry {
    id: i64,
    start: NaiveDate,
    end: NaiveDate,
    cached_at: DateTime<Utc>,
}

/// Tightest stored range for `key`'s series that contains `key`'s range.
fn find_superset(conn: &Connection, key: &CacheKey) -> Result<Option<StoredEntry>, StoreError> {
    let start = key.start.format(DATE_FORMAT).to_string();
    let end = key.end.format(DATE_FORMAT).to_string();

    let row: Option<(i64, String, String, String)> = conn
        .query_row(
            "SELECT id, start_date, end_date, cached_at FROM entries
             WHERE source = ?1 AND symbol = ?2 AND field IS ?3
               AND start_date <= ?4 AND end_date >= ?5
             ORDER BY start_date DESC, end_date ASC
             LIMIT 1",
            params![key.source, key.symbol, key.field, start, end],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )
        .optional()?;

    row.map(|(id, start, end, cached_at)| {
        Ok(StoredEntry {
            id,
            start: parse_date(&start)?,
            end: parse_date(&end)?,
            cached_at: parse_timestamp(&cached_at),
        })
    })
    .transpose()
}

/// Points of entry `entry_id` dated within `[start, end]`. NULL reads back as NaN.
fn load_points(
    conn: &Connection,
    entry_id: i64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Series, StoreError> {
    let mut stmt = conn.prepare_cached(
        "SELECT date, value FROM data
         WHERE entry_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date",
    )?;
    let raw: Vec<(String, Option<f64>)> = stmt
        .query_map(
            params![
                entry_id,
                start.format(DATE_FORMAT).to_string(),
                end.format(DATE_FORMAT).to_string()
            ],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?
        .collect::<Result<_, _>>()?;

    let mut points = Vec::with_capacity(raw.len());
    for (date, value) in raw {
        points.push(Observation::new(parse_date(&date)?, value.unwrap_or(f64::NAN)));
    }
    Ok(Series::from_sorted_unchecked(points))
}

fn parse_date(value: &str) -> Result<NaiveDate, StoreError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|_| StoreError::BadDate {
        value: value.to_string(),
    })
}

/// `cached_at` is informational; an unparseable value falls back to the epoch.
fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}
