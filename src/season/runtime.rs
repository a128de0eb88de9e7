//! Season runtime: the owned run loop around a [`SeasonLedger`]
//!
//! Lifecycle: `Idle -> Active -> Stopped -> Idle (reset)`; `start` from
//! `Stopped` is also accepted and wipes the previous season.
//!
//! While active, two timers run:
//!   - the tick timer (every `tick_interval_ms`), which drives one simulation step
//!   - the cosmetic clock (every `clock_interval_ms`), which only advances elapsed time
//!
//! Ticks are single-flight. Each tick carries a sequence number and the season
//! epoch it was issued under; a result is folded only if both are still current
//! and the season is still active. `stop` and `reset` bump the epoch, so
//! anything still in flight is discarded when it lands.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::events::{Notice, SeasonEvent};
use super::ledger::{
    ActivityItem, AgentStats, ChartPoint, HistoryEntry, LeaderboardEntry, SeasonLedger,
    SeasonSummary, TickOutcome,
};
use crate::bridge::{ApprovalReceipt, BridgeStatus, OnChainBridge, PendingProposal};
use crate::config::SeasonConfig;
use crate::domain::{AgentConfig, PoolId, SeasonStatus};
use crate::engine::{SimulationStep, StepRequest};
use crate::error::{BridgeError, Result, YieldWarsError};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StartOutcome {
    Started,
    /// Re-entrant start; nothing changed
    AlreadyActive,
}

/// Whether a tick's result made it into the ledger
#[derive(Debug, Clone)]
pub enum TickDisposition {
    Applied(TickOutcome),
    /// Superseded by stop/reset/a newer tick, or the season was not active
    Discarded,
    /// Step failed; the season has been stopped
    Failed(String),
}

/// Read-only view for status endpoints
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeasonSnapshot {
    pub status: SeasonStatus,
    pub elapsed_secs: u64,
    pub ticks: u64,
    pub leader: Option<String>,
    pub agents: Vec<LeaderboardEntry>,
    pub market: BTreeMap<PoolId, f64>,
    pub onchain: BridgeStatus,
}

struct SeasonState {
    status: SeasonStatus,
    ledger: SeasonLedger,
    epoch: u64,
    elapsed_ms: u64,
    summary: Option<SeasonSummary>,
    timers: Vec<JoinHandle<()>>,
}

impl SeasonState {
    fn elapsed_secs(&self) -> u64 {
        self.elapsed_ms / 1000
    }
}

struct RuntimeInner {
    config: SeasonConfig,
    step: Arc<dyn SimulationStep>,
    bridge: Arc<OnChainBridge>,
    state: RwLock<SeasonState>,
    events: broadcast::Sender<SeasonEvent>,
    seq: AtomicU64,
    in_flight: Mutex<()>,
}

/// Clonable handle to the season run loop
#[derive(Clone)]
pub struct SeasonRuntime {
    inner: Arc<RuntimeInner>,
}

impl SeasonRuntime {
    pub fn new(
        config: SeasonConfig,
        step: Arc<dyn SimulationStep>,
        bridge: Arc<OnChainBridge>,
    ) -> Self {
        let ledger = SeasonLedger::new(config.roster.clone(), &config, Utc::now());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Self {
            inner: Arc::new(RuntimeInner {
                config,
                step,
                bridge,
                state: RwLock::new(SeasonState {
                    status: SeasonStatus::Idle,
                    ledger,
                    epoch: 0,
                    elapsed_ms: 0,
                    summary: None,
                    timers: Vec::new(),
                }),
                events,
                seq: AtomicU64::new(0),
                in_flight: Mutex::new(()),
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SeasonEvent> {
        self.inner.events.subscribe()
    }

    pub fn bridge(&self) -> &Arc<OnChainBridge> {
        &self.inner.bridge
    }

    fn emit(&self, event: SeasonEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    fn notice(&self, notice: Notice) {
        self.emit(SeasonEvent::Notice(notice));
    }

    pub async fn status(&self) -> SeasonStatus {
        self.inner.state.read().await.status
    }

    /// Reset agents and logs, run one tick immediately, then arm both timers.
    pub async fn start(&self) -> Result<StartOutcome> {
        let epoch = {
            let mut st = self.inner.state.write().await;
            if st.status.is_active() {
                drop(st);
                info!("start ignored, season already active");
                self.notice(Notice::info("Season is already running"));
                return Ok(StartOutcome::AlreadyActive);
            }
            if !st.status.can_transition_to(SeasonStatus::Active) {
                return Err(YieldWarsError::InvalidStateTransition {
                    from: st.status.to_string(),
                    to: SeasonStatus::Active.to_string(),
                });
            }

            st.ledger.reset(Utc::now());
            st.epoch += 1;
            st.status = SeasonStatus::Active;
            st.elapsed_ms = 0;
            st.summary = None;

            let epoch = st.epoch;
            st.timers = vec![self.spawn_tick_timer(epoch), self.spawn_clock(epoch)];
            epoch
        };

        info!(epoch, "season started");
        self.emit(SeasonEvent::Started { epoch });

        self.run_tick(epoch).await;
        Ok(StartOutcome::Started)
    }

    /// Cancel both timers. Returns the summary when at least one tick ran.
    /// Stopping a season that is not active changes nothing.
    pub async fn stop(&self) -> Option<SeasonSummary> {
        let mut st = self.inner.state.write().await;
        if !st.status.is_active() {
            return st.summary.clone();
        }
        self.stop_locked(&mut st)
    }

    fn stop_locked(&self, st: &mut SeasonState) -> Option<SeasonSummary> {
        for timer in st.timers.drain(..) {
            timer.abort();
        }
        st.epoch += 1;
        st.status = SeasonStatus::Stopped;
        st.summary = st.ledger.summary(st.elapsed_secs());
        self.inner.bridge.clear();

        info!(
            ticks = st.ledger.ticks(),
            elapsed_secs = st.elapsed_secs(),
            winner = st.summary.as_ref().map(|s| s.winner.name.as_str()).unwrap_or("-"),
            "season stopped"
        );
        self.emit(SeasonEvent::Stopped {
            ticks: st.ledger.ticks(),
            summary: st.summary.clone(),
        });
        st.summary.clone()
    }

    /// Back to a fresh Idle state with a re-fetched baseline roster.
    /// Only valid from Idle or Stopped.
    pub async fn reset(&self) -> Result<()> {
        self.ensure_not_active(SeasonStatus::Idle).await?;

        let roster = match self.inner.step.roster().await {
            Ok(agents) if !agents.is_empty() => {
                Some(agents.iter().map(|a| a.to_config()).collect::<Vec<AgentConfig>>())
            }
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "baseline roster fetch failed, keeping current roster");
                self.notice(Notice::warn("Could not refresh agents; keeping current roster"));
                None
            }
        };

        let mut st = self.inner.state.write().await;
        if st.status.is_active() {
            return Err(YieldWarsError::InvalidStateTransition {
                from: st.status.to_string(),
                to: SeasonStatus::Idle.to_string(),
            });
        }

        let now = Utc::now();
        match roster {
            Some(roster) => st.ledger.replace_roster(roster, now),
            None => st.ledger.reset(now),
        }
        st.epoch += 1;
        st.status = SeasonStatus::Idle;
        st.elapsed_ms = 0;
        st.summary = None;
        drop(st);

        self.inner.bridge.clear();
        info!("season reset");
        self.emit(SeasonEvent::Reset);
        Ok(())
    }

    async fn ensure_not_active(&self, target: SeasonStatus) -> Result<()> {
        let status = self.status().await;
        if status.is_active() {
            return Err(YieldWarsError::InvalidStateTransition {
                from: status.to_string(),
                to: target.to_string(),
            });
        }
        Ok(())
    }

    /// On-chain recording can only change between seasons.
    pub async fn toggle_onchain(&self, enabled: bool) -> Result<BridgeStatus> {
        if self.status().await.is_active() {
            return Err(YieldWarsError::Validation(
                "on-chain mode cannot change while a season is active".to_string(),
            ));
        }
        self.inner.bridge.set_enabled(enabled);
        Ok(self.inner.bridge.status())
    }

    /// Run one tick now for the current epoch. Used by the tick timer.
    pub async fn tick_once(&self) -> TickDisposition {
        let epoch = self.inner.state.read().await.epoch;
        self.run_tick(epoch).await
    }

    async fn run_tick(&self, epoch: u64) -> TickDisposition {
        let _flight = self.inner.in_flight.lock().await;
        let seq = self.inner.seq.fetch_add(1, Ordering::SeqCst) + 1;

        let request = {
            let st = self.inner.state.read().await;
            if st.epoch != epoch || !st.status.is_active() {
                debug!(seq, epoch, "tick skipped, season no longer active");
                return TickDisposition::Discarded;
            }
            StepRequest {
                agents: st.ledger.roster_wire(),
            }
        };

        let response = self.inner.step.step(&request).await;

        let mut st = self.inner.state.write().await;
        if st.epoch != epoch || !st.status.is_active() || self.inner.seq.load(Ordering::SeqCst) != seq
        {
            debug!(seq, epoch, current_epoch = st.epoch, "discarding stale tick result");
            return TickDisposition::Discarded;
        }

        let folded = match response {
            Ok(resp) if resp.success => st.ledger.apply(&resp, Utc::now()).map(|o| (o, resp)),
            Ok(_) => Err(YieldWarsError::SimulationFailed(
                "step endpoint reported failure".to_string(),
            )),
            Err(e) => Err(e),
        };

        match folded {
            Ok((outcome, resp)) => {
                drop(st);
                self.publish(&outcome, &resp.market_data);
                debug!(seq, tick = outcome.tick, "tick applied");
                TickDisposition::Applied(outcome)
            }
            Err(e) => {
                error!(seq, error = %e, "simulation tick failed, stopping season");
                self.notice(Notice::error("Simulation failed. Season stopped."));
                self.stop_locked(&mut st);
                TickDisposition::Failed(e.to_string())
            }
        }
    }

    fn publish(&self, outcome: &TickOutcome, market: &BTreeMap<PoolId, f64>) {
        self.emit(SeasonEvent::Tick {
            tick: outcome.tick,
            market: market.clone(),
        });

        for result in &outcome.rebalances {
            self.emit(SeasonEvent::Rebalance(result.clone()));
            if let Some(proposal) = self.inner.bridge.observe(result, market) {
                self.emit(SeasonEvent::ProposalQueued(proposal));
            }
        }

        if let Some(change) = &outcome.leader_change {
            info!(agent_id = %change.agent_id, yield_pct = change.yield_pct, "new leader");
            self.emit(SeasonEvent::NewLeader {
                message: change.message(),
                change: change.clone(),
            });
        }
    }

    fn spawn_tick_timer(&self, epoch: u64) -> JoinHandle<()> {
        let runtime = self.clone();
        let period = Duration::from_millis(self.inner.config.tick_interval_ms);

        tokio::spawn(async move {
            // The first tick runs inline in `start`.
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let TickDisposition::Discarded | TickDisposition::Failed(_) =
                    runtime.run_tick(epoch).await
                {
                    break;
                }
            }
        })
    }

    fn spawn_clock(&self, epoch: u64) -> JoinHandle<()> {
        let runtime = self.clone();
        let period_ms = self.inner.config.clock_interval_ms.max(1);
        let period = Duration::from_millis(period_ms);

        tokio::spawn(async move {
            let mut clock = tokio::time::interval_at(Instant::now() + period, period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                clock.tick().await;
                let mut st = runtime.inner.state.write().await;
                if st.epoch != epoch || !st.status.is_active() {
                    break;
                }
                st.elapsed_ms += period_ms;
            }
        })
    }

    pub async fn snapshot(&self) -> SeasonSnapshot {
        let st = self.inner.state.read().await;
        SeasonSnapshot {
            status: st.status,
            elapsed_secs: st.elapsed_secs(),
            ticks: st.ledger.ticks(),
            leader: st.ledger.leader().map(str::to_string),
            agents: st.ledger.leaderboard(),
            market: st.ledger.market().clone(),
            onchain: self.inner.bridge.status(),
        }
    }

    pub async fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        self.inner.state.read().await.ledger.leaderboard()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.inner.state.read().await.ledger.history()
    }

    pub async fn history_csv(&self) -> String {
        self.inner.state.read().await.ledger.history_csv()
    }

    pub async fn chart(&self) -> Vec<ChartPoint> {
        self.inner.state.read().await.ledger.chart()
    }

    pub async fn activity(&self) -> Vec<ActivityItem> {
        self.inner.state.read().await.ledger.activity()
    }

    pub async fn stats(&self) -> Vec<AgentStats> {
        self.inner.state.read().await.ledger.stats(Utc::now())
    }

    /// Summary of the last stopped season
    pub async fn summary(&self) -> Option<SeasonSummary> {
        self.inner.state.read().await.summary.clone()
    }

    pub fn proposals(&self) -> Vec<PendingProposal> {
        self.inner.bridge.proposals()
    }

    /// Approve one agent's proposal; the outcome is also pushed as an event.
    pub async fn approve_proposal(
        &self,
        agent_id: &str,
    ) -> std::result::Result<ApprovalReceipt, BridgeError> {
        match self.inner.bridge.approve(agent_id).await {
            Ok(receipt) => {
                self.notice(Notice::info(format!(
                    "On-chain rebalance recorded: {}",
                    receipt.explorer_url
                )));
                self.emit(SeasonEvent::ProposalConfirmed(receipt.clone()));
                Ok(receipt)
            }
            Err(e) => {
                self.notice(Notice::error(e.reason()));
                self.emit(SeasonEvent::ProposalFailed {
                    agent_id: agent_id.to_string(),
                    reason: e.reason(),
                });
                Err(e)
            }
        }
    }

    pub fn dismiss_proposal(
        &self,
        agent_id: &str,
    ) -> std::result::Result<PendingProposal, BridgeError> {
        let dismissed = self.inner.bridge.dismiss(agent_id)?;
        self.emit(SeasonEvent::ProposalDismissed {
            agent_id: agent_id.to_string(),
        });
        Ok(dismissed)
    }
}
