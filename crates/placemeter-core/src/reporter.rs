//! Usage reporting - snapshots, history, and log access
//!
//! Read-only: the reporter never mutates state. Snapshots are derived from
//! the current aggregate and config on every call, so repeated calls with
//! no intervening reservation or commit return identical results.

use std::sync::Arc;

use crate::error::Result;
use crate::models::{
    BudgetConfig, LogFilter, MonthlyAggregate, RequestLogEntry, StatusLevel, UsageSnapshot,
};
use crate::rollover::RolloverManager;
use crate::store::QuotaStore;

/// Compute a snapshot from one aggregate and the configured limits
pub fn compute_snapshot(agg: &MonthlyAggregate, config: &BudgetConfig) -> UsageSnapshot {
    let request_ratio = agg.requests as f64 / config.max_requests_per_month as f64;
    let cost_ratio = agg.cost_micros as f64 / config.max_cost_micros() as f64;
    let percent_used = request_ratio.max(cost_ratio) * 100.0;

    UsageSnapshot {
        month: agg.key,
        requests_used: agg.requests,
        cost_used: agg.cost_usd(),
        requests_remaining: config.max_requests_per_month.saturating_sub(agg.requests),
        cost_remaining: (config.max_cost_per_month - agg.cost_usd()).max(0.0),
        percent_used,
        status: status_level(percent_used, config),
    }
}

/// Map percent used onto a status tier; monotonic in percent
pub fn status_level(percent_used: f64, config: &BudgetConfig) -> StatusLevel {
    if percent_used >= 100.0 {
        StatusLevel::Exceeded
    } else if percent_used >= config.critical_threshold {
        StatusLevel::Critical
    } else if percent_used >= config.warning_threshold {
        StatusLevel::Warning
    } else {
        StatusLevel::Ok
    }
}

/// Read-only view over the quota store
pub struct UsageReporter {
    store: Arc<dyn QuotaStore>,
    config: BudgetConfig,
    rollover: Arc<RolloverManager>,
}

impl UsageReporter {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        config: BudgetConfig,
        rollover: Arc<RolloverManager>,
    ) -> Self {
        Self {
            store,
            config,
            rollover,
        }
    }

    /// Current month's usage versus configured limits
    pub fn snapshot(&self) -> Result<UsageSnapshot> {
        let key = self.rollover.current_key();
        let aggregate = self
            .store
            .get(key)?
            .unwrap_or_else(|| MonthlyAggregate::zero(key));
        Ok(compute_snapshot(&aggregate, &self.config))
    }

    /// The N most recent frozen aggregates, most-recent-first
    ///
    /// The currently active month is excluded; it is still accruing.
    pub fn history(&self, months_back: usize) -> Result<Vec<MonthlyAggregate>> {
        let active = self.rollover.current_key();
        let mut aggregates = self.store.history(months_back.saturating_add(1))?;
        aggregates.retain(|agg| agg.key != active);
        aggregates.truncate(months_back);
        Ok(aggregates)
    }

    /// Matching log entries in insertion order
    ///
    /// Finite and restartable: each call yields a fresh iterator from the
    /// start of the matching sequence.
    pub fn log(&self, filter: &LogFilter) -> Result<impl Iterator<Item = RequestLogEntry>> {
        Ok(self.store.entries(filter)?.into_iter())
    }

    /// Human-readable alert line, `None` while usage is below warning
    pub fn alert_message(&self) -> Result<Option<String>> {
        let snapshot = self.snapshot()?;
        let message = match snapshot.status {
            StatusLevel::Exceeded => Some(format!(
                "CRITICAL: API budget exceeded: {} requests used (${:.2} of ${:.2})",
                snapshot.requests_used, snapshot.cost_used, self.config.max_cost_per_month
            )),
            StatusLevel::Critical => Some(format!(
                "WARNING: API budget {:.0}% used; {} requests remaining",
                snapshot.percent_used, snapshot.requests_remaining
            )),
            StatusLevel::Warning => Some(format!(
                "INFO: API budget {:.0}% used (${:.2} of ${:.2})",
                snapshot.percent_used, snapshot.cost_used, self.config.max_cost_per_month
            )),
            StatusLevel::Ok => None,
        };
        Ok(message)
    }
}
