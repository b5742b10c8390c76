//! In-memory quota store for tests and embedding
//!
//! Satisfies the same contract as the SQLite backend; nothing survives the
//! process, so it is only suitable where durability is not required.

use parking_lot::Mutex;
use std::collections::BTreeMap;

use super::{apply_delta, QuotaStore};
use crate::error::Result;
use crate::models::{LogFilter, MonthKey, MonthlyAggregate, RequestLogEntry};

#[derive(Default)]
struct Inner {
    aggregates: BTreeMap<MonthKey, MonthlyAggregate>,
    log: Vec<RequestLogEntry>,
}

/// Volatile quota store backed by a mutex-guarded map
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl QuotaStore for MemoryStore {
    fn get(&self, key: MonthKey) -> Result<Option<MonthlyAggregate>> {
        Ok(self.inner.lock().aggregates.get(&key).copied())
    }

    fn atomic_apply(
        &self,
        key: MonthKey,
        delta_requests: i64,
        delta_cost_micros: i64,
    ) -> Result<MonthlyAggregate> {
        let mut inner = self.inner.lock();
        let agg = inner
            .aggregates
            .entry(key)
            .or_insert_with(|| MonthlyAggregate::zero(key));
        apply_delta(agg, delta_requests, delta_cost_micros);
        Ok(*agg)
    }

    fn history(&self, limit: usize) -> Result<Vec<MonthlyAggregate>> {
        let inner = self.inner.lock();
        Ok(inner
            .aggregates
            .values()
            .rev()
            .take(limit)
            .copied()
            .collect())
    }

    fn append_entry(&self, entry: &RequestLogEntry) -> Result<()> {
        self.inner.lock().log.push(entry.clone());
        Ok(())
    }

    fn entries(&self, filter: &LogFilter) -> Result<Vec<RequestLogEntry>> {
        let inner = self.inner.lock();
        let mut entries: Vec<_> = inner
            .log
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        // The limit windows onto the most recent matches, oldest-first
        if let Some(limit) = filter.limit {
            if entries.len() > limit {
                entries.drain(..entries.len() - limit);
            }
        }
        Ok(entries)
    }

    fn reset_month(&self, key: MonthKey) -> Result<()> {
        let mut inner = self.inner.lock();
        if let Some(agg) = inner.aggregates.get_mut(&key) {
            agg.requests = 0;
            agg.cost_micros = 0;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_atomic_apply_and_get() {
        let store = MemoryStore::new();
        let key = MonthKey::new(2026, 8);

        assert!(store.get(key).unwrap().is_none());

        let agg = store.atomic_apply(key, 3, 27_000).unwrap();
        assert_eq!(agg.requests, 3);
        assert_eq!(agg.cost_micros, 27_000);

        let agg = store.get(key).unwrap().unwrap();
        assert_eq!(agg.requests, 3);
    }

    #[test]
    fn test_history_ordering() {
        let store = MemoryStore::new();
        store.atomic_apply(MonthKey::new(2026, 1), 1, 0).unwrap();
        store.atomic_apply(MonthKey::new(2025, 12), 1, 0).unwrap();
        store.atomic_apply(MonthKey::new(2026, 2), 1, 0).unwrap();

        let history = store.history(10).unwrap();
        assert_eq!(history[0].key, MonthKey::new(2026, 2));
        assert_eq!(history[2].key, MonthKey::new(2025, 12));
    }

    #[test]
    fn test_entries_limit_keeps_most_recent() {
        use crate::models::Outcome;
        use chrono::Utc;

        let store = MemoryStore::new();
        for tag in ["first", "second", "third"] {
            store
                .append_entry(&RequestLogEntry {
                    timestamp: Utc::now(),
                    endpoint: "search_nearby".into(),
                    operation_tag: tag.into(),
                    cost_micros: 0,
                    outcome: Outcome::AllowedSuccess,
                })
                .unwrap();
        }

        let limited = store
            .entries(&LogFilter {
                limit: Some(2),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].operation_tag, "second");
        assert_eq!(limited[1].operation_tag, "third");
    }

    #[test]
    fn test_floor_at_zero() {
        let store = MemoryStore::new();
        let key = MonthKey::new(2026, 8);
        store.atomic_apply(key, 1, 5_000).unwrap();
        let agg = store.atomic_apply(key, -3, -10_000).unwrap();
        assert_eq!(agg.requests, 0);
        assert_eq!(agg.cost_micros, 0);
    }
}
