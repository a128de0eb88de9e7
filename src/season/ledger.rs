//! Season ledger: the fold from tick results into per-agent state
//!
//! Pure bookkeeping with no timers or I/O. The runtime owns one ledger and is
//! the only writer; every read-only projection served to the UI comes from here.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt::Write as _;
use tracing::debug;
use uuid::Uuid;

use crate::config::SeasonConfig;
use crate::domain::{AgentConfig, AgentRuntimeState, PoolId, RebalanceAction, TickResult};
use crate::engine::{AgentWire, StepResponse};
use crate::error::{Result, YieldWarsError};

pub const HISTORY_CSV_HEADER: &str = "Time,Agent,From,To,Delta (bps),Yield Impact (%)";

/// Archived REBALANCE, newest first
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub id: Uuid,
    /// Wall-clock label, `HH:MM:SS`
    pub time: String,
    pub timestamp: DateTime<Utc>,
    pub agent_id: String,
    pub agent_name: String,
    pub from_pool: PoolId,
    pub to_pool: PoolId,
    pub delta_bps: f64,
    pub yield_impact_pct: f64,
}

/// One chart sample: `{"time": "12:00:10", "Alpha": 1.23, "Beta": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub time: String,
    #[serde(flatten)]
    pub series: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub id: Uuid,
    pub agent_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    pub strategy: String,
    pub rebalance_threshold_bps: u32,
    pub risk_level: u8,
    pub current_pool: PoolId,
    pub cumulative_yield_pct: f64,
    pub tick_count: u64,
    pub last_action: Option<RebalanceAction>,
    pub last_apy_delta_bps: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub id: String,
    pub name: String,
    pub total_rebalances: u64,
    /// Fraction in [0, 1]
    pub success_rate: f64,
    pub avg_delta_bps: f64,
    pub best_move_bps: f64,
    pub current_pool: PoolId,
    pub time_in_pool_secs: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryEntry {
    pub rank: usize,
    pub id: String,
    pub name: String,
    /// Cumulative yield, 4 decimals
    pub final_yield: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSummary {
    pub winner: SummaryEntry,
    pub agents: Vec<SummaryEntry>,
    pub ticks: u64,
    pub elapsed_secs: u64,
}

impl SeasonSummary {
    /// Plain-text results block for sharing
    pub fn share_text(&self) -> String {
        let mut out = String::from("Yield Wars Results:\n");
        for entry in &self.agents {
            let _ = writeln!(out, "{}. {} ({}%)", entry.rank, entry.name, entry.final_yield);
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderChange {
    pub agent_id: String,
    pub name: String,
    pub yield_pct: f64,
}

impl LeaderChange {
    pub fn message(&self) -> String {
        format!("{} takes the lead with {:.4}% yield!", self.name, self.yield_pct)
    }
}

/// What a successful fold produced, for the runtime to fan out
#[derive(Debug, Clone, Default)]
pub struct TickOutcome {
    pub tick: u64,
    pub leader_change: Option<LeaderChange>,
    pub rebalances: Vec<TickResult>,
}

#[derive(Debug, Clone)]
pub struct SeasonLedger {
    roster: Vec<AgentConfig>,
    states: HashMap<String, AgentRuntimeState>,
    history: VecDeque<HistoryEntry>,
    chart: VecDeque<ChartPoint>,
    activity: VecDeque<ActivityItem>,
    market: BTreeMap<PoolId, f64>,
    ticks: u64,
    leader: Option<String>,
    history_cap: usize,
    chart_window: usize,
    activity_cap: usize,
}

impl SeasonLedger {
    pub fn new(roster: Vec<AgentConfig>, config: &SeasonConfig, now: DateTime<Utc>) -> Self {
        let mut ledger = Self {
            roster,
            states: HashMap::new(),
            history: VecDeque::new(),
            chart: VecDeque::new(),
            activity: VecDeque::new(),
            market: BTreeMap::new(),
            ticks: 0,
            leader: None,
            history_cap: config.history_cap,
            chart_window: config.chart_window,
            activity_cap: config.activity_cap,
        };
        ledger.reset(now);
        ledger
    }

    /// Zero every agent, clear all logs. The roster itself is kept.
    pub fn reset(&mut self, now: DateTime<Utc>) {
        self.states = self
            .roster
            .iter()
            .map(|agent| (agent.id.clone(), AgentRuntimeState::new(agent.initial_pool, now)))
            .collect();
        self.history.clear();
        self.chart.clear();
        self.activity.clear();
        self.market.clear();
        self.ticks = 0;
        // No leader until the first tick has been folded
        self.leader = None;
    }

    /// Swap in a freshly fetched baseline roster, then reset.
    pub fn replace_roster(&mut self, roster: Vec<AgentConfig>, now: DateTime<Utc>) {
        self.roster = roster;
        self.reset(now);
    }

    pub fn roster(&self) -> &[AgentConfig] {
        &self.roster
    }

    pub fn state(&self, agent_id: &str) -> Option<&AgentRuntimeState> {
        self.states.get(agent_id)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn market(&self) -> &BTreeMap<PoolId, f64> {
        &self.market
    }

    /// Roster in step-request shape, carrying current pool and yield
    pub fn roster_wire(&self) -> Vec<AgentWire> {
        self.roster
            .iter()
            .filter_map(|agent| {
                self.states
                    .get(&agent.id)
                    .map(|state| AgentWire::from_state(agent, state))
            })
            .collect()
    }

    /// Fold one tick's results. Either every result is applied or none is:
    /// an unknown agent id rejects the whole tick before any state changes.
    pub fn apply(&mut self, response: &StepResponse, now: DateTime<Utc>) -> Result<TickOutcome> {
        if let Some(stray) = response
            .results
            .iter()
            .find(|r| !self.states.contains_key(&r.agent_id))
        {
            return Err(YieldWarsError::UnknownAgent(stray.agent_id.clone()));
        }

        let time = now.format("%H:%M:%S").to_string();
        let mut rebalances = Vec::new();

        for result in &response.results {
            if let Some(state) = self.states.get_mut(&result.agent_id) {
                state.apply(result);
            }

            if result.is_rebalance() {
                self.archive(result, &time, now);
                rebalances.push(result.clone());
            }
        }

        self.ticks += 1;
        self.market = response.market_data.clone();

        let series = self
            .roster
            .iter()
            .filter_map(|agent| {
                self.states
                    .get(&agent.id)
                    .map(|s| (agent.short_name().to_string(), s.cumulative_yield_pct))
            })
            .collect();
        push_back_capped(&mut self.chart, ChartPoint { time, series }, self.chart_window);

        let leader_change = self.check_leader();

        debug!(
            tick = self.ticks,
            rebalances = rebalances.len(),
            leader = self.leader.as_deref().unwrap_or("-"),
            "folded tick"
        );

        Ok(TickOutcome {
            tick: self.ticks,
            leader_change,
            rebalances,
        })
    }

    fn archive(&mut self, result: &TickResult, time: &str, now: DateTime<Utc>) {
        let entry = HistoryEntry {
            id: Uuid::new_v4(),
            time: time.to_string(),
            timestamp: now,
            agent_id: result.agent_id.clone(),
            agent_name: result.name.clone(),
            from_pool: result.from_pool,
            to_pool: result.to_pool,
            delta_bps: result.apy_delta_bps,
            yield_impact_pct: result.yield_gain_pct,
        };
        push_front_capped(&mut self.history, entry, self.history_cap);

        let item = ActivityItem {
            id: Uuid::new_v4(),
            agent_id: result.agent_id.clone(),
            message: format!(
                "{} rebalanced to {} (Delta: {:.0}bps)",
                result.name, result.to_pool, result.apy_delta_bps
            ),
            timestamp: now,
        };
        push_front_capped(&mut self.activity, item, self.activity_cap);
    }

    fn check_leader(&mut self) -> Option<LeaderChange> {
        let (top_id, change) = {
            let (top, state) = self.ranked().into_iter().next()?;
            let change = match &self.leader {
                Some(previous) if *previous != top.id => Some(LeaderChange {
                    agent_id: top.id.clone(),
                    name: top.name.clone(),
                    yield_pct: state.cumulative_yield_pct,
                }),
                _ => None,
            };
            (top.id.clone(), change)
        };
        self.leader = Some(top_id);
        change
    }

    /// Agents by cumulative yield descending, ties broken by id ascending
    fn ranked(&self) -> Vec<(&AgentConfig, &AgentRuntimeState)> {
        let mut ranked: Vec<_> = self
            .roster
            .iter()
            .filter_map(|agent| self.states.get(&agent.id).map(|s| (agent, s)))
            .collect();
        ranked.sort_by(|(a, sa), (b, sb)| {
            sb.cumulative_yield_pct
                .total_cmp(&sa.cumulative_yield_pct)
                .then_with(|| a.id.cmp(&b.id))
        });
        ranked
    }

    pub fn leader(&self) -> Option<&str> {
        self.leader.as_deref()
    }

    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.ranked()
            .into_iter()
            .enumerate()
            .map(|(i, (agent, state))| LeaderboardEntry {
                rank: i + 1,
                id: agent.id.clone(),
                name: agent.name.clone(),
                strategy: agent.strategy_label.clone(),
                rebalance_threshold_bps: agent.rebalance_threshold_bps,
                risk_level: agent.risk_level,
                current_pool: state.current_pool,
                cumulative_yield_pct: state.cumulative_yield_pct,
                tick_count: state.tick_count,
                last_action: state.last_action,
                last_apy_delta_bps: state.last_apy_delta_bps,
            })
            .collect()
    }

    pub fn history(&self) -> Vec<HistoryEntry> {
        self.history.iter().cloned().collect()
    }

    pub fn chart(&self) -> Vec<ChartPoint> {
        self.chart.iter().cloned().collect()
    }

    pub fn activity(&self) -> Vec<ActivityItem> {
        self.activity.iter().cloned().collect()
    }

    /// Per-agent statistics in leaderboard order
    pub fn stats(&self, now: DateTime<Utc>) -> Vec<AgentStats> {
        self.ranked()
            .into_iter()
            .map(|(agent, state)| AgentStats {
                id: agent.id.clone(),
                name: agent.name.clone(),
                total_rebalances: state.total_rebalances,
                success_rate: state.success_rate(),
                avg_delta_bps: state.average_delta_bps(),
                best_move_bps: state.best_move_bps,
                current_pool: state.current_pool,
                time_in_pool_secs: state.seconds_in_pool(now),
            })
            .collect()
    }

    /// Winner and ranking; `None` until at least one tick has been folded.
    pub fn summary(&self, elapsed_secs: u64) -> Option<SeasonSummary> {
        if self.ticks == 0 {
            return None;
        }

        let agents: Vec<SummaryEntry> = self
            .ranked()
            .into_iter()
            .enumerate()
            .map(|(i, (agent, state))| SummaryEntry {
                rank: i + 1,
                id: agent.id.clone(),
                name: agent.name.clone(),
                final_yield: format!("{:.4}", state.cumulative_yield_pct),
            })
            .collect();

        Some(SeasonSummary {
            winner: agents.first()?.clone(),
            agents,
            ticks: self.ticks,
            elapsed_secs,
        })
    }

    /// History as a flat delimited table, newest first
    pub fn history_csv(&self) -> String {
        let mut out = String::from(HISTORY_CSV_HEADER);
        out.push('\n');
        for h in &self.history {
            let _ = writeln!(
                out,
                "{},{},{},{},{:.0},{:.4}",
                h.time,
                csv_field(&h.agent_name),
                h.from_pool,
                h.to_pool,
                h.delta_bps,
                h.yield_impact_pct
            );
        }
        out
    }
}

fn csv_field(raw: &str) -> String {
    if raw.contains([',', '"', '\n']) {
        format!("\"{}\"", raw.replace('"', "\"\""))
    } else {
        raw.to_string()
    }
}

fn push_front_capped<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_front(item);
    buf.truncate(cap);
}

fn push_back_capped<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    buf.push_back(item);
    while buf.len() > cap {
        buf.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ledger() -> SeasonLedger {
        SeasonLedger::new(
            AgentConfig::default_roster(),
            &SeasonConfig::default(),
            Utc::now(),
        )
    }

    fn result(agent: &AgentConfig, action: RebalanceAction, gain: f64, delta: f64) -> TickResult {
        TickResult {
            agent_id: agent.id.clone(),
            name: agent.name.clone(),
            action,
            from_pool: PoolId::A,
            to_pool: PoolId::B,
            current_apy: 5.0,
            best_apy: 9.0,
            apy_delta_bps: delta,
            threshold: agent.rebalance_threshold_bps,
            yield_gain_pct: gain,
            tick_timestamp: Utc::now(),
        }
    }

    fn response(results: Vec<TickResult>) -> StepResponse {
        StepResponse {
            success: true,
            timestamp: Utc::now().timestamp(),
            market_data: BTreeMap::from([(PoolId::A, 5.0), (PoolId::B, 9.0)]),
            results,
        }
    }

    fn holds(ledger: &SeasonLedger, gains: [f64; 3]) -> StepResponse {
        let roster = ledger.roster().to_vec();
        response(
            roster
                .iter()
                .zip(gains)
                .map(|(a, g)| result(a, RebalanceAction::Hold, g, 10.0))
                .collect(),
        )
    }

    #[test]
    fn test_fold_increments_exactly_once() {
        let mut ledger = ledger();
        let outcome = ledger.apply(&holds(&ledger, [0.3, 0.2, 0.1]), Utc::now()).unwrap();

        assert_eq!(outcome.tick, 1);
        let alpha = ledger.state("agent-alpha").unwrap();
        assert_eq!(alpha.tick_count, 1);
        assert_eq!(alpha.cumulative_yield_pct, 0.3);
        assert!(ledger.history().is_empty());
        assert_eq!(ledger.chart().len(), 1);
    }

    #[test]
    fn test_unknown_agent_rejects_whole_tick() {
        let mut ledger = ledger();
        let mut resp = holds(&ledger, [0.3, 0.2, 0.1]);
        let mut stray = resp.results[0].clone();
        stray.agent_id = "agent-omega".into();
        resp.results.push(stray);

        let err = ledger.apply(&resp, Utc::now()).unwrap_err();
        assert!(matches!(err, YieldWarsError::UnknownAgent(id) if id == "agent-omega"));
        assert_eq!(ledger.ticks(), 0);
        assert_eq!(ledger.state("agent-alpha").unwrap().tick_count, 0);
    }

    #[test]
    fn test_leaderboard_sorted_descending_and_complete() {
        let mut ledger = ledger();
        ledger.apply(&holds(&ledger, [0.1, 0.5, 0.3]), Utc::now()).unwrap();

        let board = ledger.leaderboard();
        let ids: Vec<_> = board.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["agent-beta", "agent-gamma", "agent-alpha"]);
        assert_eq!(board[0].rank, 1);
        assert!(board
            .windows(2)
            .all(|w| w[0].cumulative_yield_pct >= w[1].cumulative_yield_pct));
    }

    #[test]
    fn test_equal_yield_ties_break_by_id() {
        let mut ledger = ledger();
        ledger.apply(&holds(&ledger, [0.2, 0.2, 0.2]), Utc::now()).unwrap();
        let ids: Vec<_> = ledger.leaderboard().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["agent-alpha", "agent-beta", "agent-gamma"]);
    }

    #[test]
    fn test_leader_change_detected() {
        let mut ledger = ledger();
        assert_eq!(ledger.leader(), None);

        let first = ledger.apply(&holds(&ledger, [0.5, 0.1, 0.1]), Utc::now()).unwrap();
        assert!(first.leader_change.is_none());
        assert_eq!(ledger.leader(), Some("agent-alpha"));

        let second = ledger.apply(&holds(&ledger, [0.0, 0.0, 1.0]), Utc::now()).unwrap();
        let change = second.leader_change.unwrap();
        assert_eq!(change.agent_id, "agent-gamma");
        assert_eq!(change.message(), "Agent Gamma takes the lead with 1.1000% yield!");
    }

    #[test]
    fn test_first_tick_never_announces_a_leader() {
        let mut ledger = ledger();
        let outcome = ledger.apply(&holds(&ledger, [0.1, 0.1, 0.9]), Utc::now()).unwrap();

        assert!(outcome.leader_change.is_none());
        assert_eq!(ledger.leader(), Some("agent-gamma"));

        // Reset forgets the leader, so the next season's first tick is quiet too
        ledger.reset(Utc::now());
        assert_eq!(ledger.leader(), None);
        let outcome = ledger.apply(&holds(&ledger, [0.1, 0.9, 0.1]), Utc::now()).unwrap();
        assert!(outcome.leader_change.is_none());
    }

    #[test]
    fn test_rebalance_archives_history_and_activity() {
        let mut ledger = ledger();
        let gamma = ledger.roster()[2].clone();
        let resp = response(vec![result(&gamma, RebalanceAction::Rebalance, 6.4, 8000.0)]);
        let outcome = ledger.apply(&resp, Utc::now()).unwrap();

        assert_eq!(outcome.rebalances.len(), 1);
        let history = ledger.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].to_pool, PoolId::B);
        assert_eq!(
            ledger.activity()[0].message,
            "Agent Gamma rebalanced to Pool B (Delta: 8000bps)"
        );
        let state = ledger.state("agent-gamma").unwrap();
        assert_eq!(state.total_rebalances, 1);
        assert_eq!(state.current_pool, PoolId::B);
    }

    #[test]
    fn test_history_cap_keeps_newest_first() {
        let mut ledger = ledger();
        let alpha = ledger.roster()[0].clone();

        for i in 0..60 {
            let resp = response(vec![result(
                &alpha,
                RebalanceAction::Rebalance,
                0.1,
                i as f64,
            )]);
            ledger.apply(&resp, Utc::now()).unwrap();
        }

        let history = ledger.history();
        assert_eq!(history.len(), 50);
        assert_eq!(history[0].delta_bps, 59.0);
        assert_eq!(history[49].delta_bps, 10.0);
        assert_eq!(ledger.activity().len(), 50);
    }

    #[test]
    fn test_chart_window_keeps_most_recent() {
        let mut ledger = ledger();
        for i in 0..25 {
            let g = i as f64;
            ledger.apply(&holds(&ledger, [g, 0.0, 0.0]), Utc::now()).unwrap();
        }

        let chart = ledger.chart();
        assert_eq!(chart.len(), 20);
        // cumulative alpha yield after tick n is 0 + 1 + ... + n
        assert_eq!(chart[19].series["Alpha"], (0..25).sum::<i32>() as f64);
        assert_eq!(chart[0].series["Alpha"], (0..6).sum::<i32>() as f64);
        let json = serde_json::to_value(&chart[0]).unwrap();
        assert!(json["Beta"].is_number());
        assert!(json["time"].is_string());
    }

    #[test]
    fn test_summary_requires_a_tick() {
        let mut ledger = ledger();
        assert!(ledger.summary(0).is_none());

        ledger.apply(&holds(&ledger, [0.1, 0.9, 0.2]), Utc::now()).unwrap();
        let summary = ledger.summary(12).unwrap();
        assert_eq!(summary.winner.id, "agent-beta");
        assert_eq!(summary.winner.final_yield, "0.9000");
        assert_eq!(summary.agents.len(), 3);
        assert!(summary.share_text().contains("1. Agent Beta (0.9000%)"));
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ledger = ledger();
        let alpha = ledger.roster()[0].clone();
        ledger
            .apply(
                &response(vec![result(&alpha, RebalanceAction::Rebalance, 2.0, 900.0)]),
                Utc::now(),
            )
            .unwrap();

        ledger.reset(Utc::now());
        assert_eq!(ledger.ticks(), 0);
        assert!(ledger.history().is_empty());
        assert!(ledger.chart().is_empty());
        assert!(ledger.activity().is_empty());
        let alpha = ledger.state("agent-alpha").unwrap();
        assert_eq!(alpha.cumulative_yield_pct, 0.0);
        assert_eq!(alpha.current_pool, PoolId::A);
        assert_eq!(ledger.state("agent-gamma").unwrap().current_pool, PoolId::B);
    }

    #[test]
    fn test_stats_projection() {
        let start = Utc::now();
        let mut ledger = SeasonLedger::new(
            AgentConfig::default_roster(),
            &SeasonConfig::default(),
            start,
        );
        let beta = ledger.roster()[1].clone();
        let mut r = result(&beta, RebalanceAction::Rebalance, 1.5, 400.0);
        r.tick_timestamp = start;
        ledger.apply(&response(vec![r]), start).unwrap();

        let stats = ledger.stats(start + Duration::seconds(30));
        let beta = stats.iter().find(|s| s.id == "agent-beta").unwrap();
        assert_eq!(beta.total_rebalances, 1);
        assert_eq!(beta.success_rate, 1.0);
        assert_eq!(beta.avg_delta_bps, 400.0);
        assert_eq!(beta.best_move_bps, 15_000.0);
        assert_eq!(beta.time_in_pool_secs, 30);
    }

    #[test]
    fn test_history_csv_export() {
        let mut ledger = ledger();
        let beta = ledger.roster()[1].clone();
        ledger
            .apply(
                &response(vec![result(&beta, RebalanceAction::Rebalance, 1.25, 412.6)]),
                Utc::now(),
            )
            .unwrap();

        let csv = ledger.history_csv();
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some(HISTORY_CSV_HEADER));
        let row = lines.next().unwrap();
        assert!(row.ends_with(",Agent Beta,Pool A,Pool B,413,1.2500"), "{row}");
    }

    #[test]
    fn test_roster_wire_carries_current_state() {
        let mut ledger = ledger();
        let alpha = ledger.roster()[0].clone();
        ledger
            .apply(
                &response(vec![result(&alpha, RebalanceAction::Rebalance, 0.7, 900.0)]),
                Utc::now(),
            )
            .unwrap();

        let wire = ledger.roster_wire();
        assert_eq!(wire[0].pool(), PoolId::B);
        assert_eq!(wire[0].simulated_yield, 0.7);
        assert_eq!(wire[0].simulation_count, 1);
    }
}
