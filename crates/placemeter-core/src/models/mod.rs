//! Data models for quota tracking

pub mod aggregate;
pub mod config;
pub mod log;
pub mod snapshot;

pub use aggregate::{micros_to_usd, usd_to_micros, MonthKey, MonthlyAggregate};
pub use config::BudgetConfig;
pub use log::{LogFilter, Outcome, RequestLogEntry};
pub use snapshot::{StatusLevel, UsageSnapshot};
