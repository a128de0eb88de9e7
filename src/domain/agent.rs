use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::market::PoolId;
use super::tick::{RebalanceAction, TickResult};

/// Immutable per-season agent configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    pub id: String,
    pub name: String,
    /// Human label of the strategy ("Conservative", "Balanced", ...)
    pub strategy_label: String,
    pub rebalance_threshold_bps: u32,
    pub risk_level: u8,
    /// Pool the agent sits in when a season starts
    #[serde(default = "default_initial_pool")]
    pub initial_pool: PoolId,
}

fn default_initial_pool() -> PoolId {
    PoolId::A
}

impl AgentConfig {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        strategy_label: impl Into<String>,
        rebalance_threshold_bps: u32,
        risk_level: u8,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            strategy_label: strategy_label.into(),
            rebalance_threshold_bps,
            risk_level,
            initial_pool: PoolId::A,
        }
    }

    pub fn with_initial_pool(mut self, pool: PoolId) -> Self {
        self.initial_pool = pool;
        self
    }

    /// Chart series key: "Agent Alpha" -> "Alpha"
    pub fn short_name(&self) -> &str {
        self.name.strip_prefix("Agent ").unwrap_or(&self.name)
    }

    /// The fixed three-strategy roster
    pub fn default_roster() -> Vec<AgentConfig> {
        vec![
            AgentConfig::new("agent-alpha", "Agent Alpha", "Conservative", 300, 1),
            AgentConfig::new("agent-beta", "Agent Beta", "Balanced", 150, 2),
            AgentConfig::new("agent-gamma", "Agent Gamma", "Aggressive", 50, 3)
                .with_initial_pool(PoolId::B),
        ]
    }
}

/// What the decision evaluator is allowed to see of an agent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentView {
    /// `None` when the agent's pool reference is not recognized
    pub current_pool: Option<PoolId>,
    pub threshold_bps: u32,
}

/// Mutable per-agent season state, written only by the season fold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRuntimeState {
    pub current_pool: PoolId,
    pub cumulative_yield_pct: f64,
    pub tick_count: u64,
    pub last_action: Option<RebalanceAction>,
    pub last_apy_delta_bps: f64,
    pub total_rebalances: u64,
    pub successful_rebalances: u64,
    pub best_move_bps: f64,
    pub total_delta_captured_bps: f64,
    pub pool_entry_timestamp: DateTime<Utc>,
}

impl AgentRuntimeState {
    pub fn new(current_pool: PoolId, now: DateTime<Utc>) -> Self {
        Self {
            current_pool,
            cumulative_yield_pct: 0.0,
            tick_count: 0,
            last_action: None,
            last_apy_delta_bps: 0.0,
            total_rebalances: 0,
            successful_rebalances: 0,
            best_move_bps: 0.0,
            total_delta_captured_bps: 0.0,
            pool_entry_timestamp: now,
        }
    }

    /// Fold one tick result into this state.
    pub fn apply(&mut self, result: &TickResult) {
        let is_rebalance = result.action == RebalanceAction::Rebalance;

        self.cumulative_yield_pct += result.yield_gain_pct;
        self.tick_count += 1;
        self.last_action = Some(result.action);
        self.last_apy_delta_bps = result.apy_delta_bps;

        if is_rebalance {
            self.total_rebalances += 1;
            if result.yield_gain_pct > 0.0 {
                self.successful_rebalances += 1;
            }
            // yield gain in percent, expressed as approximate bps of the move
            self.best_move_bps = self.best_move_bps.max(result.yield_gain_pct * 10_000.0);
            self.total_delta_captured_bps += result.apy_delta_bps;
            self.current_pool = result.to_pool;
            self.pool_entry_timestamp = result.tick_timestamp;
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_rebalances == 0 {
            return 0.0;
        }
        self.successful_rebalances as f64 / self.total_rebalances as f64
    }

    pub fn average_delta_bps(&self) -> f64 {
        if self.total_rebalances == 0 {
            return 0.0;
        }
        self.total_delta_captured_bps / self.total_rebalances as f64
    }

    pub fn seconds_in_pool(&self, now: DateTime<Utc>) -> i64 {
        (now - self.pool_entry_timestamp).num_seconds().max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(action: RebalanceAction, gain: f64, delta: f64) -> TickResult {
        TickResult {
            agent_id: "agent-alpha".into(),
            name: "Agent Alpha".into(),
            action,
            from_pool: PoolId::A,
            to_pool: PoolId::B,
            current_apy: 5.0,
            best_apy: 9.0,
            apy_delta_bps: delta,
            threshold: 300,
            yield_gain_pct: gain,
            tick_timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_short_name_strips_prefix() {
        let roster = AgentConfig::default_roster();
        let names: Vec<_> = roster.iter().map(|a| a.short_name()).collect();
        assert_eq!(names, vec!["Alpha", "Beta", "Gamma"]);

        let bare = AgentConfig::new("x", "Solo", "Balanced", 150, 2);
        assert_eq!(bare.short_name(), "Solo");
    }

    #[test]
    fn test_apply_hold_keeps_pool() {
        let mut state = AgentRuntimeState::new(PoolId::A, Utc::now());
        let hold = result(RebalanceAction::Hold, 1.03, 25.0);
        state.apply(&hold);

        assert_eq!(state.tick_count, 1);
        assert_eq!(state.cumulative_yield_pct, 1.03);
        assert_eq!(state.current_pool, PoolId::A);
        assert_eq!(state.total_rebalances, 0);
        assert_eq!(state.last_action, Some(RebalanceAction::Hold));
    }

    #[test]
    fn test_apply_rebalance_moves_pool_and_counts() {
        let mut state = AgentRuntimeState::new(PoolId::A, Utc::now());
        let rebalance = result(RebalanceAction::Rebalance, 6.4, 8000.0);
        state.apply(&rebalance);

        assert_eq!(state.current_pool, PoolId::B);
        assert_eq!(state.total_rebalances, 1);
        assert_eq!(state.successful_rebalances, 1);
        assert_eq!(state.total_delta_captured_bps, 8000.0);
        assert_eq!(state.best_move_bps, 64_000.0);
        assert_eq!(state.success_rate(), 1.0);
        assert_eq!(state.average_delta_bps(), 8000.0);
    }

    #[test]
    fn test_stats_are_zero_without_rebalances() {
        let state = AgentRuntimeState::new(PoolId::B, Utc::now());
        assert_eq!(state.success_rate(), 0.0);
        assert_eq!(state.average_delta_bps(), 0.0);
    }
}
