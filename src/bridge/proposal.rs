//! Proposals and contract argument conversion

use chrono::{DateTime, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::{PoolId, TickResult};
use crate::error::BridgeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProposalStatus {
    /// Waiting for the user
    Pending,
    /// Approved; wallet round trip or settle delay in progress
    Submitting,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "PENDING",
            ProposalStatus::Submitting => "SUBMITTING",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Integer arguments for `rebalance(uint256,uint256,uint256)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceArgs {
    /// Slot-0 pool APY in basis points (6.5% -> 650)
    pub pool_a_bps: u64,
    /// Slot-1 pool APY in basis points
    pub pool_b_bps: u64,
    pub profit_scaled: u64,
}

impl RebalanceArgs {
    /// APY of the given contract slot
    pub fn slot_bps(&self, slot: u8) -> u64 {
        if slot == 0 {
            self.pool_a_bps
        } else {
            self.pool_b_bps
        }
    }

    /// Recompute the move delta the way the contract does, relative to the
    /// slot it currently sits in. Zero when the other slot pays no more.
    pub fn delta_from_slot(&self, current_slot: u8) -> u64 {
        let current = self.slot_bps(current_slot);
        let target = self.slot_bps(if current_slot == 0 { 1 } else { 0 });
        if target <= current {
            0
        } else if current == 0 {
            10_000
        } else {
            (target - current).saturating_mul(10_000) / current
        }
    }
}

/// Percent APY to integer basis points, half-up. Negative inputs clamp to zero.
pub fn apy_to_bps(apy_pct: f64) -> Result<u64, BridgeError> {
    to_scaled(apy_pct, 100)
}

/// Yield gain (percent) to the contract's fixed-point profit unit
pub fn profit_to_scaled(gain_pct: f64, scale: u64) -> Result<u64, BridgeError> {
    to_scaled(gain_pct, scale)
}

fn to_scaled(value: f64, scale: u64) -> Result<u64, BridgeError> {
    let value = Decimal::from_f64(value)
        .ok_or_else(|| BridgeError::TransactionFailed(format!("unrepresentable value {value}")))?;
    let scaled = (value.max(Decimal::ZERO) * Decimal::from(scale))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    scaled
        .to_u64()
        .ok_or_else(|| BridgeError::TransactionFailed(format!("{scaled} does not fit uint64")))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingProposal {
    pub agent_id: String,
    pub agent_name: String,
    pub from_pool: PoolId,
    pub to_pool: PoolId,
    pub expected_profit_pct: f64,
    pub apy_delta_bps: f64,
    pub raw_args: RebalanceArgs,
    pub status: ProposalStatus,
    pub created_at: DateTime<Utc>,
}

impl PendingProposal {
    /// Build from a REBALANCE tick. Slot 0 always carries Pool A's quote;
    /// slot 1 carries whichever non-A pool the move touches (the target when both are).
    pub fn from_tick(
        result: &TickResult,
        market: &BTreeMap<PoolId, f64>,
        profit_scale: u64,
    ) -> Result<Self, BridgeError> {
        let apy_of = |pool: PoolId| -> f64 {
            if pool == result.from_pool {
                result.current_apy
            } else if pool == result.to_pool {
                result.best_apy
            } else {
                market.get(&pool).copied().unwrap_or_default()
            }
        };

        let slot_b_pool = [result.to_pool, result.from_pool]
            .into_iter()
            .find(|pool| pool.contract_slot() == 1)
            .unwrap_or(result.to_pool);

        let raw_args = RebalanceArgs {
            pool_a_bps: apy_to_bps(apy_of(PoolId::A))?,
            pool_b_bps: apy_to_bps(apy_of(slot_b_pool))?,
            profit_scaled: profit_to_scaled(result.yield_gain_pct, profit_scale)?,
        };

        Ok(Self {
            agent_id: result.agent_id.clone(),
            agent_name: result.name.clone(),
            from_pool: result.from_pool,
            to_pool: result.to_pool,
            expected_profit_pct: result.yield_gain_pct,
            apy_delta_bps: result.apy_delta_bps,
            raw_args,
            status: ProposalStatus::Pending,
            created_at: result.tick_timestamp,
        })
    }
}
