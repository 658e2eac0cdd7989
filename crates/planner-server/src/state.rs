//! Application State

use std::sync::Arc;

use planner_core::{BroadcastScheduler, ReportAggregator};
use planner_runtime::SqliteStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Report builder shared with the chat router and the scheduler
    pub reports: Arc<ReportAggregator>,

    /// Daily fan-out, also triggerable over HTTP
    pub scheduler: Arc<BroadcastScheduler>,

    /// Recipient and alert database
    pub store: Arc<SqliteStore>,
}
