//! placemeter-core - Monthly budget/quota enforcement for metered APIs
//!
//! Gates calls to a paid external API by tracking request counts and
//! accrued cost per calendar month, persisting that state across restarts,
//! and making atomic allow/deny decisions under concurrent access.

pub mod error;
pub mod guard;
pub mod logger;
pub mod models;
pub mod reporter;
pub mod rollover;
pub mod store;
pub mod tracker;

pub use error::{CoreError, Result};
pub use guard::{Decision, DenyReason, QuotaGuard, Reservation};
pub use logger::RequestLogger;
pub use models::{
    BudgetConfig, LogFilter, MonthKey, MonthlyAggregate, Outcome, RequestLogEntry, StatusLevel,
    UsageSnapshot,
};
pub use reporter::UsageReporter;
pub use rollover::{Clock, FixedClock, RolloverManager, SystemClock};
pub use store::{MemoryStore, QuotaStore, SqliteStore};
pub use tracker::UsageTracker;
