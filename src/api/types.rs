use serde::{Deserialize, Serialize};

use crate::domain::SeasonStatus;
use crate::season::{SeasonSummary, StartOutcome};

// ============================================================================
// System Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub season: SeasonStatus,
    pub uptime_secs: i64,
}

// ============================================================================
// Season Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub outcome: StartOutcome,
    pub status: SeasonStatus,
    pub ticks: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopResponse {
    pub status: SeasonStatus,
    pub summary: Option<SeasonSummary>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: SeasonStatus,
}

// ============================================================================
// On-chain Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct OnChainToggleRequest {
    pub enabled: bool,
}
