use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::engine::LocalSimulator;
use crate::season::SeasonRuntime;

/// Shared application state for API handlers
#[derive(Clone)]
pub struct AppState {
    /// Season run loop (also owns the on-chain bridge)
    pub runtime: SeasonRuntime,

    /// Serves `/api/agents/simulate`; independent of where the runtime gets its ticks
    pub simulator: Arc<LocalSimulator>,

    /// Application start time
    pub start_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(runtime: SeasonRuntime, simulator: Arc<LocalSimulator>) -> Self {
        Self {
            runtime,
            simulator,
            start_time: Utc::now(),
        }
    }

    pub fn uptime_seconds(&self) -> i64 {
        (Utc::now() - self.start_time).num_seconds()
    }
}
