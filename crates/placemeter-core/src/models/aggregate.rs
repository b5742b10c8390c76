//! Monthly aggregate and month keying
//!
//! Costs are carried internally in integer micro-USD so that limit checks
//! and reconciliation deltas are exact. The public API speaks f64 USD at
//! the edges only.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Convert a USD amount to integer micro-USD
pub fn usd_to_micros(usd: f64) -> i64 {
    (usd * 1_000_000.0).round() as i64
}

/// Reject amounts that cannot be charged: negative, NaN, or infinite
pub(crate) fn ensure_valid_usd(label: &str, usd: f64) -> crate::error::Result<()> {
    if !usd.is_finite() || usd < 0.0 {
        return Err(crate::error::CoreError::invalid_amount(format!(
            "{} must be a non-negative amount, got {}",
            label, usd
        )));
    }
    Ok(())
}

/// Convert integer micro-USD back to USD
pub fn micros_to_usd(micros: i64) -> f64 {
    micros as f64 / 1_000_000.0
}

/// Unique key for one calendar month
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct MonthKey {
    pub year: i32,
    pub month: u32,
}

impl MonthKey {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    /// Key for the month containing the given instant
    pub fn from_datetime(dt: &DateTime<Utc>) -> Self {
        Self {
            year: dt.year(),
            month: dt.month(),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Accumulated request count and cost for one calendar month
///
/// Created lazily on first access in a new month. Once a later month becomes
/// current the aggregate is frozen: only reads (history) touch it, except a
/// commit reconciling a reservation pinned to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub key: MonthKey,
    pub requests: u64,
    pub cost_micros: i64,
}

impl MonthlyAggregate {
    /// Zero-valued aggregate for a fresh month
    pub fn zero(key: MonthKey) -> Self {
        Self {
            key,
            requests: 0,
            cost_micros: 0,
        }
    }

    /// Accrued cost in USD
    pub fn cost_usd(&self) -> f64 {
        micros_to_usd(self.cost_micros)
    }
}
