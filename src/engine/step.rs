//! Simulation step endpoint contract
//!
//! `GET` returns the baseline roster, `POST` takes the current roster and
//! returns one [`TickResult`] per agent plus the market snapshot used. The
//! JSON shape is shared with the external step endpoint, so field names and
//! the string-encoded numbers stay as they are on the wire.

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use tracing::debug;

use super::accrual::YieldModel;
use super::evaluator::evaluate;
use super::market::MarketGenerator;
use crate::config::AppConfig;
use crate::domain::{
    AgentConfig, AgentRuntimeState, AgentView, PoolId, RebalanceAction, TickResult,
};
use crate::error::Result;

/// Agent as it travels to and from the step endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentWire {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub strategy: String,
    #[serde(with = "lenient_u32")]
    pub rebalance_threshold: u32,
    #[serde(default, with = "lenient_u32")]
    pub risk_level: u32,
    /// Pool reference as sent: "Pool A", "Pool A (Curvance)", 0, "1", ...
    pub current_pool: serde_json::Value,
    #[serde(default, with = "lenient_yield")]
    pub simulated_yield: f64,
    #[serde(default, with = "lenient_u64")]
    pub simulation_count: u64,
}

impl AgentWire {
    /// Fresh roster entry as returned by `GET`
    pub fn baseline(config: &AgentConfig) -> Self {
        Self {
            id: config.id.clone(),
            name: config.name.clone(),
            strategy: config.strategy_label.clone(),
            rebalance_threshold: config.rebalance_threshold_bps,
            risk_level: config.risk_level as u32,
            current_pool: serde_json::Value::String(config.initial_pool.as_str().to_string()),
            simulated_yield: 0.0,
            simulation_count: 0,
        }
    }

    /// Current roster entry for a `POST` from season state
    pub fn from_state(config: &AgentConfig, state: &AgentRuntimeState) -> Self {
        Self {
            current_pool: serde_json::Value::String(state.current_pool.as_str().to_string()),
            simulated_yield: state.cumulative_yield_pct,
            simulation_count: state.tick_count,
            ..Self::baseline(config)
        }
    }

    /// Normalized pool reference (unknown references become Pool A)
    pub fn pool(&self) -> PoolId {
        PoolId::resolve_value(&self.current_pool)
    }

    /// Unknown pool references are left for the evaluator to resolve against the snapshot
    pub fn view(&self) -> AgentView {
        AgentView {
            current_pool: PoolId::lookup_value(&self.current_pool),
            threshold_bps: self.rebalance_threshold,
        }
    }

    /// Rebuild an immutable agent config from a roster snapshot
    pub fn to_config(&self) -> AgentConfig {
        AgentConfig {
            id: self.id.clone(),
            name: self.name.clone(),
            strategy_label: self.strategy.clone(),
            rebalance_threshold_bps: self.rebalance_threshold,
            risk_level: self.risk_level.min(u8::MAX as u32) as u8,
            initial_pool: self.pool(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepRequest {
    pub agents: Vec<AgentWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepResponse {
    #[serde(default = "default_success")]
    pub success: bool,
    /// Unix seconds
    #[serde(default)]
    pub timestamp: i64,
    pub market_data: BTreeMap<PoolId, f64>,
    pub results: Vec<TickResult>,
}

fn default_success() -> bool {
    true
}

/// Seam between the season controller and whatever computes a tick
#[async_trait]
pub trait SimulationStep: Send + Sync {
    /// Baseline roster snapshot
    async fn roster(&self) -> Result<Vec<AgentWire>>;

    /// Run one tick for the given roster
    async fn step(&self, request: &StepRequest) -> Result<StepResponse>;
}

/// In-process simulation step: market generator, evaluator and yield model
#[derive(Debug, Clone)]
pub struct LocalSimulator {
    generator: MarketGenerator,
    model: YieldModel,
    roster: Vec<AgentConfig>,
}

impl LocalSimulator {
    pub fn new(generator: MarketGenerator, model: YieldModel, roster: Vec<AgentConfig>) -> Self {
        Self {
            generator,
            model,
            roster,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            MarketGenerator::new(&config.market),
            YieldModel::new(config.accrual.clone()),
            config.season.roster.clone(),
        )
    }

    pub fn baseline_roster(&self) -> Vec<AgentWire> {
        self.roster.iter().map(AgentWire::baseline).collect()
    }

    /// One tick against a single shared snapshot. Every agent sees the same quotes.
    pub fn simulate_with<R: Rng + ?Sized>(
        &self,
        request: &StepRequest,
        now: DateTime<Utc>,
        rng: &mut R,
    ) -> StepResponse {
        // The wire carries milliseconds; keep local results identical to remote ones
        let now = now.trunc_subsecs(3);
        let snapshot = self.generator.generate_at(now, rng);

        let results = request
            .agents
            .iter()
            .map(|agent| {
                let decision = evaluate(agent.view(), &snapshot);
                let yield_gain_pct = self.model.accrue(&decision, agent.rebalance_threshold, rng);

                debug!(
                    agent = %agent.name,
                    pool = %decision.current_pool,
                    apy = decision.current_apy,
                    delta_bps = decision.delta_bps,
                    yield_gain = yield_gain_pct,
                    "simulated agent tick"
                );

                TickResult {
                    agent_id: agent.id.clone(),
                    name: agent.name.clone(),
                    action: if decision.should_rebalance {
                        RebalanceAction::Rebalance
                    } else {
                        RebalanceAction::Hold
                    },
                    from_pool: decision.current_pool,
                    to_pool: decision.best_pool,
                    current_apy: decision.current_apy,
                    best_apy: decision.best_apy,
                    apy_delta_bps: decision.delta_bps,
                    threshold: agent.rebalance_threshold,
                    yield_gain_pct,
                    tick_timestamp: now,
                }
            })
            .collect();

        StepResponse {
            success: true,
            timestamp: now.timestamp(),
            market_data: snapshot.to_map(),
            results,
        }
    }
}

#[async_trait]
impl SimulationStep for LocalSimulator {
    async fn roster(&self) -> Result<Vec<AgentWire>> {
        Ok(self.baseline_roster())
    }

    async fn step(&self, request: &StepRequest) -> Result<StepResponse> {
        Ok(self.simulate_with(request, Utc::now(), &mut rand::thread_rng()))
    }
}

/// Numbers on the wire may arrive as JSON numbers or decimal strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(f64),
    String(String),
}

impl NumberOrString {
    fn into_f64(self) -> std::result::Result<f64, String> {
        match self {
            NumberOrString::Number(n) => Ok(n),
            NumberOrString::String(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("invalid number {s:?}: {e}")),
        }
    }
}

fn deserialize_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    NumberOrString::deserialize(deserializer)?
        .into_f64()
        .map_err(serde::de::Error::custom)
}

mod lenient_u32 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u32, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u32, D::Error> {
        let raw = deserialize_f64(d)?;
        if raw < 0.0 || raw > u32::MAX as f64 || !raw.is_finite() {
            return Err(serde::de::Error::custom(format!("out of range: {raw}")));
        }
        Ok(raw as u32)
    }
}

mod lenient_u64 {
    use super::*;

    pub fn serialize<S: Serializer>(value: &u64, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<u64, D::Error> {
        let raw = deserialize_f64(d)?;
        if raw < 0.0 || !raw.is_finite() {
            return Err(serde::de::Error::custom(format!("out of range: {raw}")));
        }
        Ok(raw as u64)
    }
}

mod lenient_yield {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f64, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(&format!("{:.4}", value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<f64, D::Error> {
        deserialize_f64(d)
    }
}
