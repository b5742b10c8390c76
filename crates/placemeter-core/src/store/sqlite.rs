//! SQLite-backed quota store
//!
//! Schema:
//! - monthly_usage: one row per (year, month) holding requests + cost_micros
//! - request_log: append-only, rowid order is audit order
//! - schema_meta: schema version guard for future migrations
//!
//! A single `Mutex<Connection>` serializes all access; `atomic_apply` is a
//! single upsert-with-RETURNING statement, so no interleaved
//! read-modify-write is observable and the row is durable before the call
//! returns.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::QuotaStore;
use crate::error::{CoreError, Result};
use crate::models::{LogFilter, MonthKey, MonthlyAggregate, Outcome, RequestLogEntry};

/// Current schema version
const SCHEMA_VERSION: i64 = 1;

/// Durable quota store on SQLite (thread-safe)
pub struct SqliteStore {
    conn: Mutex<Connection>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl SqliteStore {
    /// Create or open the store database
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CoreError::storage_msg(format!(
                        "failed to create store directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let conn = Connection::open(db_path).map_err(|e| {
            CoreError::storage(
                format!("failed to open database: {}", db_path.display()),
                e,
            )
        })?;

        // WAL mode for better concurrency
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| CoreError::storage("failed to enable WAL mode", e))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_meta (
                key TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS monthly_usage (
                year INTEGER NOT NULL,
                month INTEGER NOT NULL,
                requests INTEGER NOT NULL DEFAULT 0,
                cost_micros INTEGER NOT NULL DEFAULT 0,
                UNIQUE(year, month)
            );

            CREATE TABLE IF NOT EXISTS request_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                endpoint TEXT NOT NULL,
                operation_tag TEXT NOT NULL,
                cost_micros INTEGER NOT NULL DEFAULT 0,
                outcome TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_log_endpoint ON request_log(endpoint);
            CREATE INDEX IF NOT EXISTS idx_log_outcome ON request_log(outcome);
            "#,
        )
        .map_err(|e| CoreError::storage("failed to create schema", e))?;

        let stored_version: Option<i64> = conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| CoreError::storage("failed to query schema version", e))?;

        match stored_version {
            Some(v) if v != SCHEMA_VERSION => {
                warn!(stored = v, current = SCHEMA_VERSION, "Schema version mismatch");
                return Err(CoreError::storage_msg(format!(
                    "unsupported schema version {} (expected {})",
                    v, SCHEMA_VERSION
                )));
            }
            None => {
                conn.execute(
                    "INSERT INTO schema_meta (key, value) VALUES ('version', ?)",
                    params![SCHEMA_VERSION],
                )
                .map_err(|e| CoreError::storage("failed to initialize schema version", e))?;
            }
            Some(_) => {}
        }

        debug!(path = %db_path.display(), "Quota store opened");

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }
}

impl QuotaStore for SqliteStore {
    fn get(&self, key: MonthKey) -> Result<Option<MonthlyAggregate>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT requests, cost_micros FROM monthly_usage WHERE year = ? AND month = ?",
                params![key.year, key.month],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| CoreError::storage("failed to read aggregate", e))?;

        Ok(row.map(|(requests, cost_micros)| MonthlyAggregate {
            key,
            requests: requests.max(0) as u64,
            cost_micros,
        }))
    }

    fn atomic_apply(
        &self,
        key: MonthKey,
        delta_requests: i64,
        delta_cost_micros: i64,
    ) -> Result<MonthlyAggregate> {
        let conn = self.conn.lock();
        let (requests, cost_micros) = conn
            .query_row(
                r#"
                INSERT INTO monthly_usage (year, month, requests, cost_micros)
                VALUES (?1, ?2, MAX(?3, 0), MAX(?4, 0))
                ON CONFLICT(year, month) DO UPDATE SET
                    requests = MAX(requests + ?3, 0),
                    cost_micros = MAX(cost_micros + ?4, 0)
                RETURNING requests, cost_micros
                "#,
                params![key.year, key.month, delta_requests, delta_cost_micros],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .map_err(|e| CoreError::storage("failed to apply aggregate delta", e))?;

        debug!(
            month = %key,
            delta_requests,
            delta_cost_micros,
            "Aggregate delta applied"
        );

        Ok(MonthlyAggregate {
            key,
            requests: requests.max(0) as u64,
            cost_micros,
        })
    }

    fn history(&self, limit: usize) -> Result<Vec<MonthlyAggregate>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT year, month, requests, cost_micros FROM monthly_usage
                 ORDER BY year DESC, month DESC LIMIT ?",
            )
            .map_err(|e| CoreError::storage("failed to prepare history query", e))?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(MonthlyAggregate {
                    key: MonthKey::new(row.get(0)?, row.get::<_, i64>(1)? as u32),
                    requests: row.get::<_, i64>(2)?.max(0) as u64,
                    cost_micros: row.get(3)?,
                })
            })
            .map_err(|e| CoreError::storage("failed to query history", e))?;

        let mut aggregates = Vec::new();
        for row in rows {
            aggregates.push(row.map_err(|e| CoreError::storage("failed to read history row", e))?);
        }
        Ok(aggregates)
    }

    fn append_entry(&self, entry: &RequestLogEntry) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO request_log (timestamp, endpoint, operation_tag, cost_micros, outcome)
             VALUES (?, ?, ?, ?, ?)",
            params![
                entry.timestamp.to_rfc3339(),
                entry.endpoint,
                entry.operation_tag,
                entry.cost_micros,
                entry.outcome.as_str(),
            ],
        )
        .map_err(|e| CoreError::storage("failed to append log entry", e))?;
        Ok(())
    }

    fn entries(&self, filter: &LogFilter) -> Result<Vec<RequestLogEntry>> {
        let conn = self.conn.lock();
        // Scan newest-first so the limit windows onto the most recent
        // matches, then restore insertion order before returning.
        let mut stmt = conn
            .prepare(
                "SELECT timestamp, endpoint, operation_tag, cost_micros, outcome
                 FROM request_log ORDER BY id DESC",
            )
            .map_err(|e| CoreError::storage("failed to prepare log query", e))?;

        let rows = stmt
            .query_map([], |row| {
                let timestamp: String = row.get(0)?;
                let outcome: String = row.get(4)?;
                Ok((
                    timestamp,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                    outcome,
                ))
            })
            .map_err(|e| CoreError::storage("failed to query log", e))?;

        let limit = filter.limit.unwrap_or(usize::MAX);
        let mut entries = Vec::new();
        for row in rows {
            let (ts, endpoint, operation_tag, cost_micros, outcome) =
                row.map_err(|e| CoreError::storage("failed to read log row", e))?;
            let timestamp = DateTime::parse_from_rfc3339(&ts)
                .map_err(|_| {
                    CoreError::storage_msg(format!("malformed timestamp in log: {}", ts))
                })?
                .with_timezone(&Utc);
            let outcome = Outcome::parse(&outcome).ok_or_else(|| {
                CoreError::storage_msg(format!("unknown outcome in log: {}", outcome))
            })?;
            let entry = RequestLogEntry {
                timestamp,
                endpoint,
                operation_tag,
                cost_micros,
                outcome,
            };
            if filter.matches(&entry) {
                entries.push(entry);
                if entries.len() >= limit {
                    break;
                }
            }
        }
        entries.reverse();
        Ok(entries)
    }

    fn reset_month(&self, key: MonthKey) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE monthly_usage SET requests = 0, cost_micros = 0 WHERE year = ? AND month = ?",
            params![key.year, key.month],
        )
        .map_err(|e| CoreError::storage("failed to reset month", e))?;
        warn!(month = %key, "Monthly aggregate reset");
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        // Checkpoint WAL so the main database file is complete on disk
        let conn = self.conn.lock();
        if let Err(e) = conn.pragma_update(None, "wal_checkpoint", "TRUNCATE") {
            warn!("Failed to checkpoint WAL on SqliteStore drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::usd_to_micros;
    use tempfile::tempdir;

    fn key() -> MonthKey {
        MonthKey::new(2026, 8)
    }

    #[test]
    fn test_get_absent_month() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();
        assert!(store.get(key()).unwrap().is_none());
    }

    #[test]
    fn test_atomic_apply_creates_lazily() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();

        let agg = store.atomic_apply(key(), 1, usd_to_micros(0.009)).unwrap();
        assert_eq!(agg.requests, 1);
        assert_eq!(agg.cost_micros, 9_000);

        let agg = store.atomic_apply(key(), 2, usd_to_micros(0.018)).unwrap();
        assert_eq!(agg.requests, 3);
        assert_eq!(agg.cost_micros, 27_000);
    }

    #[test]
    fn test_negative_delta_floors_at_zero() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();

        store.atomic_apply(key(), 2, 10_000).unwrap();
        let agg = store.atomic_apply(key(), -5, -50_000).unwrap();
        assert_eq!(agg.requests, 0);
        assert_eq!(agg.cost_micros, 0);
    }

    #[test]
    fn test_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("usage.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.atomic_apply(key(), 7, 63_000).unwrap();
            store
                .append_entry(&RequestLogEntry {
                    timestamp: Utc::now(),
                    endpoint: "search_nearby".into(),
                    operation_tag: "plumber".into(),
                    cost_micros: 9_000,
                    outcome: Outcome::AllowedSuccess,
                })
                .unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let agg = store.get(key()).unwrap().unwrap();
        assert_eq!(agg.requests, 7);
        assert_eq!(agg.cost_micros, 63_000);
        assert_eq!(store.entries(&LogFilter::default()).unwrap().len(), 1);
    }

    #[test]
    fn test_history_most_recent_first() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();

        store.atomic_apply(MonthKey::new(2025, 12), 5, 0).unwrap();
        store.atomic_apply(MonthKey::new(2026, 1), 10, 0).unwrap();
        store.atomic_apply(MonthKey::new(2026, 2), 15, 0).unwrap();

        let history = store.history(2).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].key, MonthKey::new(2026, 2));
        assert_eq!(history[1].key, MonthKey::new(2026, 1));
    }

    #[test]
    fn test_log_insertion_order_and_filter() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();

        for (tag, outcome) in [
            ("plumber", Outcome::AllowedSuccess),
            ("cafe", Outcome::Denied),
            ("plumber", Outcome::AllowedFailure),
        ] {
            store
                .append_entry(&RequestLogEntry {
                    timestamp: Utc::now(),
                    endpoint: "search_nearby".into(),
                    operation_tag: tag.into(),
                    cost_micros: 0,
                    outcome,
                })
                .unwrap();
        }

        let all = store.entries(&LogFilter::default()).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].operation_tag, "plumber");
        assert_eq!(all[1].operation_tag, "cafe");

        let denied = store
            .entries(&LogFilter {
                outcome: Some(Outcome::Denied),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(denied.len(), 1);
        assert_eq!(denied[0].operation_tag, "cafe");

        // The limit keeps the most recent matches, still oldest-first
        let limited = store
            .entries(&LogFilter {
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].operation_tag, "cafe");
        assert_eq!(limited[1].operation_tag, "plumber");
        assert_eq!(limited[1].outcome, Outcome::AllowedFailure);
    }

    #[test]
    fn test_reset_month() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(&dir.path().join("usage.db")).unwrap();

        store.atomic_apply(key(), 100, 900_000).unwrap();
        store.reset_month(key()).unwrap();

        let agg = store.get(key()).unwrap().unwrap();
        assert_eq!(agg.requests, 0);
        assert_eq!(agg.cost_micros, 0);
    }
}
