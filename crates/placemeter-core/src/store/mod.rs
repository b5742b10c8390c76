//! Quota store - durable per-month aggregates and append-only request log
//!
//! The store is the sole synchronization point for aggregate mutation.
//! Callers never read-then-write aggregates directly; all deltas flow
//! through `atomic_apply`, which serializes concurrent writers and is
//! durable before it returns.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::error::Result;
use crate::models::{LogFilter, MonthKey, MonthlyAggregate, RequestLogEntry};

/// Minimal transactional interface over the backing medium
///
/// Backends are swappable without touching guard/logger logic: SQLite for
/// production, an in-memory map for tests.
pub trait QuotaStore: Send + Sync {
    /// Read one month's aggregate, `None` if never touched
    fn get(&self, key: MonthKey) -> Result<Option<MonthlyAggregate>>;

    /// Apply a delta and return the post-update aggregate in one indivisible
    /// step. The aggregate is created lazily at zero if absent. Counters
    /// never go below zero. On error the delta is treated as not applied.
    fn atomic_apply(
        &self,
        key: MonthKey,
        delta_requests: i64,
        delta_cost_micros: i64,
    ) -> Result<MonthlyAggregate>;

    /// All recorded aggregates, most-recent-first, up to `limit`
    fn history(&self, limit: usize) -> Result<Vec<MonthlyAggregate>>;

    /// Append one immutable log entry
    fn append_entry(&self, entry: &RequestLogEntry) -> Result<()>;

    /// Matching log entries in insertion order. `filter.limit` keeps the
    /// most recent N matches, still returned oldest-first.
    fn entries(&self, filter: &LogFilter) -> Result<Vec<RequestLogEntry>>;

    /// Zero one month's aggregate (admin operation)
    fn reset_month(&self, key: MonthKey) -> Result<()>;
}

/// Apply a delta to in-memory counters, flooring at zero
pub(crate) fn apply_delta(
    agg: &mut MonthlyAggregate,
    delta_requests: i64,
    delta_cost_micros: i64,
) {
    let requests = agg.requests as i64 + delta_requests;
    agg.requests = requests.max(0) as u64;
    agg.cost_micros = (agg.cost_micros + delta_cost_micros).max(0);
}
