//! Usage tracker façade
//!
//! Constructed once at process start with an injected store handle and a
//! validated config, then passed by reference into every request-handling
//! path. This is the single entry point the web layer consumes; there is
//! no ambient global state.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::guard::{Decision, QuotaGuard, Reservation};
use crate::logger::RequestLogger;
use crate::models::{
    BudgetConfig, LogFilter, MonthlyAggregate, Outcome, RequestLogEntry, UsageSnapshot,
};
use crate::reporter::UsageReporter;
use crate::rollover::{Clock, RolloverManager, SystemClock};
use crate::store::{QuotaStore, SqliteStore};

/// Default store filename when no storage location is configured
const DEFAULT_DB_FILE: &str = "usage.db";

/// Monthly budget/quota enforcement for a metered external API
pub struct UsageTracker {
    guard: QuotaGuard,
    logger: RequestLogger,
    reporter: UsageReporter,
}

impl UsageTracker {
    /// Build a tracker over an injected store, validating the config
    pub fn new(store: Arc<dyn QuotaStore>, config: BudgetConfig) -> Result<Self> {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    /// Build with an explicit clock (tests and simulations)
    pub fn with_clock(
        store: Arc<dyn QuotaStore>,
        config: BudgetConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let rollover = Arc::new(RolloverManager::new(clock));

        info!(
            max_requests = config.max_requests_per_month,
            max_cost = config.max_cost_per_month,
            "Usage tracker initialized"
        );

        Ok(Self {
            guard: QuotaGuard::new(store.clone(), config.clone(), rollover.clone()),
            logger: RequestLogger::new(store.clone(), rollover.clone()),
            reporter: UsageReporter::new(store, config, rollover),
        })
    }

    /// Open the durable store at the configured location and build a tracker
    pub fn open(config: BudgetConfig) -> Result<Self> {
        let db_path = config
            .storage_location
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_FILE));
        let store = Arc::new(SqliteStore::open(&db_path)?);
        Self::new(store, config)
    }

    /// Ask permission for an operation, reserving its estimated cost
    pub fn check_and_reserve(
        &self,
        estimated_requests: u64,
        estimated_cost: Option<f64>,
    ) -> Result<Decision> {
        self.guard.check_and_reserve(estimated_requests, estimated_cost)
    }

    /// Report the actual outcome of a reserved operation
    pub fn commit(
        &self,
        reservation: &Reservation,
        actual_requests: u64,
        actual_cost: f64,
        endpoint: &str,
        operation_tag: &str,
        outcome: Outcome,
    ) -> Result<MonthlyAggregate> {
        self.logger.commit(
            reservation,
            actual_requests,
            actual_cost,
            endpoint,
            operation_tag,
            outcome,
        )
    }

    /// Release reserved-but-unused capacity
    pub fn refund(&self, requests: u64, cost: f64) -> Result<MonthlyAggregate> {
        self.logger.refund(requests, cost)
    }

    /// Record a denied attempt in the audit log
    pub fn log_denied(&self, endpoint: &str, operation_tag: &str) -> Result<()> {
        self.logger.log_denied(endpoint, operation_tag)
    }

    /// Current usage versus configured limits
    pub fn snapshot(&self) -> Result<UsageSnapshot> {
        self.reporter.snapshot()
    }

    /// Frozen monthly aggregates, most-recent-first
    pub fn history(&self, months_back: usize) -> Result<Vec<MonthlyAggregate>> {
        self.reporter.history(months_back)
    }

    /// Matching log entries in insertion order
    pub fn log(&self, filter: &LogFilter) -> Result<impl Iterator<Item = RequestLogEntry>> {
        self.reporter.log(filter)
    }

    /// Tiered alert line, `None` while usage is below warning
    pub fn alert_message(&self) -> Result<Option<String>> {
        self.reporter.alert_message()
    }
}
