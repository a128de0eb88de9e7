use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::market::PoolId;

/// Per-tick action chosen for one agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RebalanceAction {
    Rebalance,
    Hold,
}

impl RebalanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            RebalanceAction::Rebalance => "REBALANCE",
            RebalanceAction::Hold => "HOLD",
        }
    }
}

impl fmt::Display for RebalanceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of one agent's evaluation and accrual for one tick.
///
/// Field names on the wire follow the simulation step endpoint's JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickResult {
    #[serde(rename = "agentId")]
    pub agent_id: String,
    pub name: String,
    pub action: RebalanceAction,
    #[serde(rename = "fromPool")]
    pub from_pool: PoolId,
    #[serde(rename = "toPool")]
    pub to_pool: PoolId,
    #[serde(rename = "currentAPY")]
    pub current_apy: f64,
    #[serde(rename = "bestAPY")]
    pub best_apy: f64,
    #[serde(rename = "apyDelta")]
    pub apy_delta_bps: f64,
    pub threshold: u32,
    #[serde(rename = "yieldGain")]
    pub yield_gain_pct: f64,
    #[serde(rename = "simulationTime", with = "chrono::serde::ts_milliseconds")]
    pub tick_timestamp: DateTime<Utc>,
}

impl TickResult {
    pub fn is_rebalance(&self) -> bool {
        self.action == RebalanceAction::Rebalance
    }
}
