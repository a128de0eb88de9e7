//! Per-agent rebalance decision
//!
//! Memoryless: one threshold comparison against one snapshot. No cooldown,
//! no hysteresis; an agent may rebalance on consecutive ticks.

use crate::domain::{AgentView, MarketSnapshot, PoolId};

/// Delta assigned when the current pool pays nothing (or less) and some pool pays more
pub const MAX_DELTA_BPS: f64 = 10_000.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    /// Resolved current pool (after the fallback for unknown references)
    pub current_pool: PoolId,
    pub best_pool: PoolId,
    pub current_apy: f64,
    pub best_apy: f64,
    pub delta_bps: f64,
    pub should_rebalance: bool,
}

pub fn evaluate(view: AgentView, snapshot: &MarketSnapshot) -> Decision {
    let quoted = view
        .current_pool
        .and_then(|pool| snapshot.get(pool).map(|apy| (pool, apy)));
    let (current_pool, current_apy) = match quoted {
        Some(found) => found,
        None => {
            let first = snapshot.first();
            (first.pool_id, first.apy)
        }
    };

    // Strict `>` keeps the incumbent on ties.
    let mut best_pool = current_pool;
    let mut best_apy = current_apy;
    for quote in snapshot.quotes() {
        if quote.apy > best_apy {
            best_pool = quote.pool_id;
            best_apy = quote.apy;
        }
    }

    let delta_bps = delta_bps(current_apy, best_apy);
    let should_rebalance = delta_bps >= view.threshold_bps as f64 && best_pool != current_pool;

    Decision {
        current_pool,
        best_pool,
        current_apy,
        best_apy,
        delta_bps,
        should_rebalance,
    }
}

/// Relative improvement of `best` over `current`, in basis points
pub fn delta_bps(current_apy: f64, best_apy: f64) -> f64 {
    if current_apy > 0.0 {
        (best_apy - current_apy) / current_apy * 10_000.0
    } else if best_apy > 0.0 {
        MAX_DELTA_BPS
    } else {
        0.0
    }
}
