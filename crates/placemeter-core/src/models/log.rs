//! Append-only request log entries and filters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::models::aggregate::micros_to_usd;

/// Outcome of an attempted operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Outcome {
    /// Operation was allowed and the external call succeeded
    AllowedSuccess,
    /// Operation was allowed but the external call failed
    AllowedFailure,
    /// Operation was denied by the guard; no external call made
    Denied,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::AllowedSuccess => "allowed-success",
            Outcome::AllowedFailure => "allowed-failure",
            Outcome::Denied => "denied",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "allowed-success" => Some(Outcome::AllowedSuccess),
            "allowed-failure" => Some(Outcome::AllowedFailure),
            "denied" => Some(Outcome::Denied),
            _ => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable audit record of one attempted operation
///
/// Insertion order is the definitive audit order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub operation_tag: String,
    /// Actual cost in micro-USD (zero for denied attempts)
    pub cost_micros: i64,
    pub outcome: Outcome,
}

impl RequestLogEntry {
    pub fn cost_usd(&self) -> f64 {
        micros_to_usd(self.cost_micros)
    }
}

/// Filter for log queries; all fields optional, unset fields match everything
#[derive(Debug, Clone, Default)]
pub struct LogFilter {
    pub endpoint: Option<String>,
    pub operation_tag: Option<String>,
    pub outcome: Option<Outcome>,
    /// Maximum number of entries to return (applied after filtering)
    pub limit: Option<usize>,
}

impl LogFilter {
    pub fn matches(&self, entry: &RequestLogEntry) -> bool {
        if let Some(ref endpoint) = self.endpoint {
            if &entry.endpoint != endpoint {
                return false;
            }
        }
        if let Some(ref tag) = self.operation_tag {
            if &entry.operation_tag != tag {
                return false;
            }
        }
        if let Some(outcome) = self.outcome {
            if entry.outcome != outcome {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(endpoint: &str, tag: &str, outcome: Outcome) -> RequestLogEntry {
        RequestLogEntry {
            timestamp: Utc::now(),
            endpoint: endpoint.to_string(),
            operation_tag: tag.to_string(),
            cost_micros: 9_000,
            outcome,
        }
    }

    #[test]
    fn test_outcome_round_trip() {
        for outcome in [
            Outcome::AllowedSuccess,
            Outcome::AllowedFailure,
            Outcome::Denied,
        ] {
            assert_eq!(Outcome::parse(outcome.as_str()), Some(outcome));
        }
        assert_eq!(Outcome::parse("unknown"), None);
    }

    #[test]
    fn test_filter_default_matches_all() {
        let filter = LogFilter::default();
        assert!(filter.matches(&entry("search_nearby", "plumber", Outcome::AllowedSuccess)));
        assert!(filter.matches(&entry("details", "cafe", Outcome::Denied)));
    }

    #[test]
    fn test_filter_by_endpoint_and_outcome() {
        let filter = LogFilter {
            endpoint: Some("search_nearby".to_string()),
            outcome: Some(Outcome::Denied),
            ..Default::default()
        };
        assert!(filter.matches(&entry("search_nearby", "plumber", Outcome::Denied)));
        assert!(!filter.matches(&entry("search_nearby", "plumber", Outcome::AllowedSuccess)));
        assert!(!filter.matches(&entry("details", "plumber", Outcome::Denied)));
    }
}
