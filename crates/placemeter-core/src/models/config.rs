//! Budget configuration
//!
//! Loaded once at startup and treated as constant for the process lifetime.

use crate::error::{CoreError, Result};
use crate::models::aggregate::usd_to_micros;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Budget configuration for quota enforcement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetConfig {
    /// Hard limit on API requests per calendar month
    #[serde(default = "default_max_requests")]
    pub max_requests_per_month: u64,

    /// Hard limit on API cost per calendar month (USD)
    #[serde(default = "default_max_cost")]
    pub max_cost_per_month: f64,

    /// Default per-call cost used when an estimate is not supplied (USD)
    #[serde(default = "default_cost_per_request")]
    pub cost_per_request: f64,

    /// Warning threshold percentage (0-100)
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,

    /// Critical threshold percentage (0-100)
    #[serde(default = "default_critical_threshold")]
    pub critical_threshold: f64,

    /// Path for the durable aggregate+log store
    #[serde(default)]
    pub storage_location: Option<PathBuf>,
}

fn default_max_requests() -> u64 {
    20_000
}

fn default_max_cost() -> f64 {
    180.0
}

fn default_cost_per_request() -> f64 {
    0.009
}

fn default_warning_threshold() -> f64 {
    80.0
}

fn default_critical_threshold() -> f64 {
    95.0
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_requests_per_month: default_max_requests(),
            max_cost_per_month: default_max_cost(),
            cost_per_request: default_cost_per_request(),
            warning_threshold: default_warning_threshold(),
            critical_threshold: default_critical_threshold(),
            storage_location: None,
        }
    }
}

impl BudgetConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let config: Self =
            serde_json::from_str(&content).map_err(|e| CoreError::ConfigParse {
                path: path.to_path_buf(),
                source: e,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate limit values; fatal at startup
    pub fn validate(&self) -> Result<()> {
        if self.max_requests_per_month == 0 {
            return Err(CoreError::invalid_config(
                "maxRequestsPerMonth must be at least 1",
            ));
        }
        if !self.max_cost_per_month.is_finite() || self.max_cost_per_month <= 0.0 {
            return Err(CoreError::invalid_config(
                "maxCostPerMonth must be a positive amount",
            ));
        }
        if !self.cost_per_request.is_finite() || self.cost_per_request < 0.0 {
            return Err(CoreError::invalid_config(
                "costPerRequest must be zero or positive",
            ));
        }
        if self.warning_threshold <= 0.0
            || self.critical_threshold <= self.warning_threshold
            || self.critical_threshold >= 100.0
        {
            return Err(CoreError::invalid_config(
                "thresholds must satisfy 0 < warning < critical < 100",
            ));
        }
        Ok(())
    }

    /// Monthly cost limit in micro-USD
    pub fn max_cost_micros(&self) -> i64 {
        usd_to_micros(self.max_cost_per_month)
    }

    /// Default per-request cost in micro-USD
    pub fn cost_per_request_micros(&self) -> i64 {
        usd_to_micros(self.cost_per_request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BudgetConfig::default();
        assert_eq!(config.max_requests_per_month, 20_000);
        assert_eq!(config.max_cost_per_month, 180.0);
        assert_eq!(config.cost_per_request, 0.009);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_request_limit() {
        let config = BudgetConfig {
            max_requests_per_month: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_negative_cost_limit() {
        let config = BudgetConfig {
            max_cost_per_month: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_thresholds() {
        let config = BudgetConfig {
            warning_threshold: 95.0,
            critical_threshold: 80.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_partial_json_uses_defaults() {
        let config: BudgetConfig =
            serde_json::from_str(r#"{"maxRequestsPerMonth": 500}"#).unwrap();
        assert_eq!(config.max_requests_per_month, 500);
        assert_eq!(config.max_cost_per_month, 180.0);
        assert_eq!(config.warning_threshold, 80.0);
    }

    #[test]
    fn test_from_file_missing_path() {
        let err = BudgetConfig::from_file(Path::new("/nonexistent/budget.json"));
        assert!(matches!(err, Err(CoreError::ConfigRead { .. })));
    }
}
