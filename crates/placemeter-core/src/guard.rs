//! Quota guard - atomic allow/deny decisions with capacity reservation
//!
//! The guard evaluates a proposed operation's cost against the configured
//! limits and, on allow, reserves the estimate immediately. The
//! check-then-reserve window is covered by a guard-level mutex on top of
//! the store's own atomicity, so concurrent callers cannot jointly
//! overshoot a limit.

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::aggregate::ensure_valid_usd;
use crate::models::{BudgetConfig, MonthKey, MonthlyAggregate, UsageSnapshot, usd_to_micros};
use crate::reporter::compute_snapshot;
use crate::rollover::RolloverManager;
use crate::store::QuotaStore;

/// Which limit a denial hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Requests,
    Cost,
}

/// Capacity provisionally applied by the guard before the external call
///
/// Pins the month key active at reservation time: a commit reconciles
/// against this key even if the calendar month has advanced meanwhile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub key: MonthKey,
    pub requests: u64,
    pub cost_micros: i64,
}

/// Outcome of a `check_and_reserve` call
#[derive(Debug, Clone)]
pub struct Decision {
    pub allowed: bool,
    /// Set on denial: which limit was hit
    pub reason: Option<DenyReason>,
    /// Usage after the reservation (allow) or current usage (deny)
    pub snapshot: UsageSnapshot,
    /// Set on allow: handle for the subsequent commit
    pub reservation: Option<Reservation>,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.allowed
    }
}

/// Gate for calls to the metered external API
pub struct QuotaGuard {
    store: Arc<dyn QuotaStore>,
    config: BudgetConfig,
    rollover: Arc<RolloverManager>,
    /// Serializes the check-then-reserve window
    reserve_lock: Mutex<()>,
}

impl QuotaGuard {
    pub fn new(
        store: Arc<dyn QuotaStore>,
        config: BudgetConfig,
        rollover: Arc<RolloverManager>,
    ) -> Self {
        Self {
            store,
            config,
            rollover,
            reserve_lock: Mutex::new(()),
        }
    }

    /// Check a proposed operation and reserve its estimate atomically
    ///
    /// Allows iff both projected totals stay at or under their limits
    /// (the boundary itself is allowed). On allow the estimate is applied
    /// as a delta before returning, so no two concurrent callers can
    /// jointly overshoot. On deny nothing is applied and the snapshot
    /// reports remaining headroom. A storage failure propagates as an
    /// error with nothing applied: deny on uncertainty. A negative, NaN,
    /// or infinite cost estimate is an error; refunds are the only
    /// sanctioned negative path into the aggregate.
    pub fn check_and_reserve(
        &self,
        estimated_requests: u64,
        estimated_cost: Option<f64>,
    ) -> Result<Decision> {
        if let Some(cost) = estimated_cost {
            ensure_valid_usd("estimated cost", cost)?;
        }

        // Deltas travel to the store as i64; anything past that range can
        // never fit under a monthly limit, so it denies rather than wraps.
        let delta_requests = i64::try_from(estimated_requests).unwrap_or(i64::MAX);
        let cost_micros = match estimated_cost {
            Some(cost) => usd_to_micros(cost),
            None => self
                .config
                .cost_per_request_micros()
                .saturating_mul(delta_requests),
        };

        let _guard = self.reserve_lock.lock();

        let key = self.rollover.current_key();
        let current = self
            .store
            .get(key)?
            .unwrap_or_else(|| MonthlyAggregate::zero(key));

        let reason = match current.requests.checked_add(estimated_requests) {
            None => Some(DenyReason::Requests),
            Some(projected) if projected > self.config.max_requests_per_month => {
                Some(DenyReason::Requests)
            }
            Some(_) => match current.cost_micros.checked_add(cost_micros) {
                None => Some(DenyReason::Cost),
                Some(projected) if projected > self.config.max_cost_micros() => {
                    Some(DenyReason::Cost)
                }
                Some(_) => None,
            },
        };

        if let Some(reason) = reason {
            debug!(
                month = %key,
                ?reason,
                requests_used = current.requests,
                cost_used = current.cost_usd(),
                "Reservation denied"
            );
            return Ok(Decision {
                allowed: false,
                reason: Some(reason),
                snapshot: compute_snapshot(&current, &self.config),
                reservation: None,
            });
        }

        let updated = self.store.atomic_apply(key, delta_requests, cost_micros)?;

        debug!(
            month = %key,
            requests = estimated_requests,
            cost_micros,
            "Capacity reserved"
        );

        Ok(Decision {
            allowed: true,
            reason: None,
            snapshot: compute_snapshot(&updated, &self.config),
            reservation: Some(Reservation {
                key,
                requests: estimated_requests,
                cost_micros,
            }),
        })
    }
}
