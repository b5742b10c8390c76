//! Calendar-month rollover
//!
//! Tracks the active month as an explicit two-state machine,
//! `Active(key)` / `Frozen(key)`, guarded by a mutex so that when two
//! callers observe a month change simultaneously exactly one transition
//! wins; the loser observes the winner's key. Rollover races are resolved
//! here and never surfaced to callers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::models::MonthKey;

/// Source of the current instant, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock (UTC)
#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// State of the month tracked by the rollover manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MonthState {
    /// Accepting deltas for this key
    Active(MonthKey),
    /// Transitional: no further deltas; redirected to the successor
    Frozen(MonthKey),
}

/// Detects calendar-month transitions and freezes the outgoing aggregate
pub struct RolloverManager {
    state: Mutex<Option<MonthState>>,
    clock: Arc<dyn Clock>,
}

impl RolloverManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(None),
            clock,
        }
    }

    /// Resolve the currently active month key, transitioning if the
    /// calendar month has changed since the last call.
    ///
    /// Idempotent: repeated calls within one month return the same key;
    /// concurrent callers crossing a boundary all observe the new key.
    pub fn current_key(&self) -> MonthKey {
        let now_key = MonthKey::from_datetime(&self.clock.now());
        let mut state = self.state.lock();

        match *state {
            Some(MonthState::Active(active)) if active == now_key => active,
            Some(MonthState::Active(active)) => {
                // Freeze the outgoing month, then activate the new one.
                // Both steps happen under the state lock, so exactly one
                // caller performs the transition.
                *state = Some(MonthState::Frozen(active));
                info!(from = %active, to = %now_key, "Month rollover");
                *state = Some(MonthState::Active(now_key));
                now_key
            }
            Some(MonthState::Frozen(_)) | None => {
                *state = Some(MonthState::Active(now_key));
                now_key
            }
        }
    }

    /// The injected clock, shared with components that stamp log entries
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }
}
