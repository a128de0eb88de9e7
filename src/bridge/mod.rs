//! On-chain proposal bridge
//!
//! Turns simulated REBALANCE results into user-approvable proposals and, on
//! approval, mirrors them into the agent contract:
//!   - at most one live proposal per agent (newer replaces older)
//!   - pre-flight against the contract's own threshold before any gas is spent
//!   - success only once the contract's rebalance counter has moved
//!   - a per-session cap on submitted transactions
//!
//! Nothing here touches season state.

pub mod proposal;
pub mod wallet;

pub use proposal::{apy_to_bps, profit_to_scaled, PendingProposal, ProposalStatus, RebalanceArgs};
pub use wallet::{AlloyWalletSession, OnChainStats, WalletSession};

use dashmap::DashMap;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::BridgeConfig;
use crate::domain::{PoolId, TickResult};
use crate::error::{BridgeError, YieldWarsError};

/// Outcome of a verified on-chain rebalance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalReceipt {
    pub agent_id: String,
    pub tx_hash: String,
    pub explorer_url: String,
    pub rebalances_before: u64,
    pub rebalances_after: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeStatus {
    pub enabled: bool,
    pub wallet_connected: bool,
    pub submitted: u32,
    pub cap: u32,
}

pub struct OnChainBridge {
    config: BridgeConfig,
    wallet: Option<Arc<dyn WalletSession>>,
    enabled: AtomicBool,
    proposals: DashMap<String, PendingProposal>,
    submitted: AtomicU32,
}

impl OnChainBridge {
    pub fn new(config: BridgeConfig, wallet: Option<Arc<dyn WalletSession>>) -> Self {
        Self {
            enabled: AtomicBool::new(config.enabled),
            config,
            wallet,
            proposals: DashMap::new(),
            submitted: AtomicU32::new(0),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Flip recording mode. The season runtime refuses this while a season is active.
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
        if !enabled {
            self.clear();
        }
        info!(enabled, "on-chain recording toggled");
    }

    pub fn wallet_connected(&self) -> bool {
        self.wallet.as_ref().is_some_and(|w| w.is_connected())
    }

    pub fn status(&self) -> BridgeStatus {
        BridgeStatus {
            enabled: self.is_enabled(),
            wallet_connected: self.wallet_connected(),
            submitted: self.submitted.load(Ordering::SeqCst),
            cap: self.config.demo_tx_cap,
        }
    }

    pub fn explorer_url(&self, tx_hash: &str) -> String {
        self.config.explorer_url(tx_hash)
    }

    /// Queue a proposal for a REBALANCE result. Returns the queued proposal,
    /// or `None` when recording is off, no wallet is connected, the result is
    /// a HOLD, or this agent's previous proposal is mid-submission.
    pub fn observe(
        &self,
        result: &TickResult,
        market: &BTreeMap<PoolId, f64>,
    ) -> Option<PendingProposal> {
        if !result.is_rebalance() || !self.is_enabled() || !self.wallet_connected() {
            return None;
        }

        let proposal = match PendingProposal::from_tick(result, market, self.config.profit_scale) {
            Ok(p) => p,
            Err(e) => {
                warn!(agent_id = %result.agent_id, error = %e, "could not build proposal");
                return None;
            }
        };

        let mut entry = self.proposals.entry(result.agent_id.clone()).or_insert_with(|| proposal.clone());
        if entry.status == ProposalStatus::Submitting {
            debug!(agent_id = %result.agent_id, "proposal in flight, not replaced");
            return None;
        }
        *entry = proposal.clone();

        debug!(
            agent_id = %proposal.agent_id,
            to = %proposal.to_pool,
            delta_bps = proposal.apy_delta_bps,
            "proposal queued"
        );
        Some(proposal)
    }

    /// Live proposals ordered by agent id
    pub fn proposals(&self) -> Vec<PendingProposal> {
        let mut all: Vec<_> = self.proposals.iter().map(|e| e.value().clone()).collect();
        all.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        all
    }

    pub fn proposal(&self, agent_id: &str) -> Option<PendingProposal> {
        self.proposals.get(agent_id).map(|p| p.clone())
    }

    /// Drop a waiting proposal. No chain interaction.
    pub fn dismiss(&self, agent_id: &str) -> Result<PendingProposal, BridgeError> {
        match self
            .proposals
            .remove_if(agent_id, |_, p| p.status == ProposalStatus::Pending)
        {
            Some((_, p)) => {
                debug!(agent_id, "proposal dismissed");
                Ok(p)
            }
            None if self.proposals.contains_key(agent_id) => Err(BridgeError::AlreadyInFlight {
                agent_id: agent_id.to_string(),
            }),
            None => Err(BridgeError::NoProposal {
                agent_id: agent_id.to_string(),
            }),
        }
    }

    /// Drop every waiting proposal (season stop). In-flight approvals finish on their own.
    pub fn clear(&self) {
        self.proposals
            .retain(|_, p| p.status == ProposalStatus::Submitting);
    }

    /// Approve and mirror one agent's proposal on chain.
    ///
    /// The proposal stays `Submitting` for the whole wallet round trip and
    /// settle delay, then is removed whatever the outcome.
    pub async fn approve(&self, agent_id: &str) -> Result<ApprovalReceipt, BridgeError> {
        if !self.is_enabled() {
            return Err(BridgeError::Disabled);
        }
        let wallet = match &self.wallet {
            Some(w) if w.is_connected() => Arc::clone(w),
            _ => return Err(BridgeError::WalletUnavailable),
        };
        let cap = self.config.demo_tx_cap;
        if self.submitted.load(Ordering::SeqCst) >= cap {
            return Err(BridgeError::DemoCapReached { cap });
        }
        let contract = self
            .config
            .agent_contracts
            .get(agent_id)
            .cloned()
            .ok_or_else(|| BridgeError::MissingContract {
                agent_id: agent_id.to_string(),
            })?;

        let proposal = {
            let mut entry = self
                .proposals
                .get_mut(agent_id)
                .ok_or_else(|| BridgeError::NoProposal {
                    agent_id: agent_id.to_string(),
                })?;
            if entry.status == ProposalStatus::Submitting {
                return Err(BridgeError::AlreadyInFlight {
                    agent_id: agent_id.to_string(),
                });
            }
            entry.status = ProposalStatus::Submitting;
            entry.clone()
        };

        let outcome = self
            .submit_verified(wallet.as_ref(), &contract, &proposal)
            .await;
        self.proposals.remove(agent_id);

        match &outcome {
            Ok(receipt) => info!(
                agent_id,
                tx = %receipt.tx_hash,
                before = receipt.rebalances_before,
                after = receipt.rebalances_after,
                "on-chain rebalance verified"
            ),
            Err(e) => warn!(agent_id, error = %e, "on-chain rebalance failed"),
        }
        outcome
    }

    async fn submit_verified(
        &self,
        wallet: &dyn WalletSession,
        contract: &str,
        proposal: &PendingProposal,
    ) -> Result<ApprovalReceipt, BridgeError> {
        let before = wallet.read_stats(contract).await.map_err(chain_failure)?;

        // Direction and threshold come from the contract, not the simulation.
        let delta_bps = proposal.raw_args.delta_from_slot(before.current_pool_slot);
        if delta_bps < before.threshold_bps {
            return Err(BridgeError::PreflightRejected {
                delta_bps,
                threshold_bps: before.threshold_bps,
            });
        }

        let cap = self.config.demo_tx_cap;
        self.submitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < cap).then_some(n + 1)
            })
            .map_err(|_| BridgeError::DemoCapReached { cap })?;

        let tx_hash = wallet
            .submit_rebalance(contract, proposal.raw_args)
            .await
            .map_err(chain_failure)?;

        tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;

        let after = wallet.read_stats(contract).await.map_err(chain_failure)?;
        if after.total_rebalances <= before.total_rebalances {
            return Err(BridgeError::CounterNotAdvanced {
                before: before.total_rebalances,
                after: after.total_rebalances,
            });
        }

        Ok(ApprovalReceipt {
            agent_id: proposal.agent_id.clone(),
            explorer_url: self.explorer_url(&tx_hash),
            tx_hash,
            rebalances_before: before.total_rebalances,
            rebalances_after: after.total_rebalances,
        })
    }
}

fn chain_failure(err: YieldWarsError) -> BridgeError {
    match err {
        YieldWarsError::Bridge(inner) => inner,
        other => BridgeError::TransactionFailed(other.to_string()),
    }
}
