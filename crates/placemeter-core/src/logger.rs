//! Request logger and aggregate reconciler
//!
//! After the external call, the caller reports the actual outcome here.
//! The reconciler applies the difference between actuals and the reserved
//! estimate so the aggregate reflects true consumption, and appends exactly
//! one immutable log entry per commit.
//!
//! A crash between a successful reservation and the matching commit leaves
//! that capacity counted as consumed with no log entry. That is a
//! deliberate conservative tradeoff: the budget undercounts available
//! headroom rather than risking overspend.
//!
//! The reconciliation delta and the log append are two store operations,
//! so a storage failure on the append after the delta landed leaves the
//! same shape: consumption is counted, the audit trail is short one row.
//! The error is surfaced to the caller; the aggregate is never rolled back.

use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::guard::Reservation;
use crate::models::aggregate::ensure_valid_usd;
use crate::models::{usd_to_micros, MonthlyAggregate, Outcome, RequestLogEntry};
use crate::rollover::RolloverManager;
use crate::store::QuotaStore;

/// Append-only logger and reconciler over the quota store
pub struct RequestLogger {
    store: Arc<dyn QuotaStore>,
    rollover: Arc<RolloverManager>,
}

impl RequestLogger {
    pub fn new(store: Arc<dyn QuotaStore>, rollover: Arc<RolloverManager>) -> Self {
        Self { store, rollover }
    }

    /// Report the actual outcome of a reserved operation
    ///
    /// Applies `actual - reserved` as a further delta against the month
    /// pinned by the reservation, so the aggregate ends at true
    /// consumption even if the estimate was off in either direction.
    /// Appends exactly one log entry recording the actual cost.
    pub fn commit(
        &self,
        reservation: &Reservation,
        actual_requests: u64,
        actual_cost: f64,
        endpoint: &str,
        operation_tag: &str,
        outcome: Outcome,
    ) -> Result<MonthlyAggregate> {
        ensure_valid_usd("actual cost", actual_cost)?;

        let actual_cost_micros = usd_to_micros(actual_cost);
        let delta_requests = i64::try_from(actual_requests)
            .unwrap_or(i64::MAX)
            .saturating_sub(reservation.requests as i64);
        let delta_cost = actual_cost_micros.saturating_sub(reservation.cost_micros);

        let aggregate = self
            .store
            .atomic_apply(reservation.key, delta_requests, delta_cost)?;

        self.store.append_entry(&RequestLogEntry {
            timestamp: self.rollover.clock().now(),
            endpoint: endpoint.to_string(),
            operation_tag: operation_tag.to_string(),
            cost_micros: actual_cost_micros,
            outcome,
        })?;

        debug!(
            month = %reservation.key,
            endpoint,
            operation_tag,
            delta_requests,
            delta_cost,
            %outcome,
            "Commit reconciled"
        );

        Ok(aggregate)
    }

    /// Release previously reserved but unconsumed capacity
    ///
    /// An explicit negative delta against the currently active month.
    /// Never automatic: a failed external call may still have incurred
    /// partial real cost, so the caller decides how much to give back.
    pub fn refund(&self, requests: u64, cost: f64) -> Result<MonthlyAggregate> {
        ensure_valid_usd("refund cost", cost)?;

        let key = self.rollover.current_key();
        let delta_requests = -i64::try_from(requests).unwrap_or(i64::MAX);
        let aggregate = self
            .store
            .atomic_apply(key, delta_requests, -usd_to_micros(cost))?;

        debug!(month = %key, requests, cost, "Capacity refunded");
        Ok(aggregate)
    }

    /// Record a denied attempt; no capacity was consumed
    pub fn log_denied(&self, endpoint: &str, operation_tag: &str) -> Result<()> {
        self.store.append_entry(&RequestLogEntry {
            timestamp: self.rollover.clock().now(),
            endpoint: endpoint.to_string(),
            operation_tag: operation_tag.to_string(),
            cost_micros: 0,
            outcome: Outcome::Denied,
        })
    }
}
