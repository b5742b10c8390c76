//! Derived usage snapshot versus configured limits

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::aggregate::MonthKey;

/// Status tier based on budget usage, monotonic in percent used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    /// Usage below warning threshold
    Ok,
    /// Usage at or above warning threshold
    Warning,
    /// Usage at or above critical threshold
    Critical,
    /// Usage at or above 100%
    Exceeded,
}

impl fmt::Display for StatusLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatusLevel::Ok => "ok",
            StatusLevel::Warning => "warning",
            StatusLevel::Critical => "critical",
            StatusLevel::Exceeded => "exceeded",
        };
        f.write_str(s)
    }
}

/// Read-only derived view of current usage, never stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSnapshot {
    pub month: MonthKey,
    pub requests_used: u64,
    /// Accrued cost in USD
    pub cost_used: f64,
    pub requests_remaining: u64,
    /// Remaining cost budget in USD, floored at zero
    pub cost_remaining: f64,
    /// max(requests ratio, cost ratio) as a percentage
    pub percent_used: f64,
    pub status: StatusLevel,
}
