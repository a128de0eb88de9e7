//! Simulated yield accrual
//!
//! Two regimes:
//! - rebalance: `delta_bps * efficiency * 0.01 + noise` (arbitrage capture)
//! - hold: `apy * tick / year * acceleration + noise` (demo-accelerated carry)
//!
//! Efficiency is a discrete lookup on the agent's threshold: patient agents
//! capture more per move. Thresholds between the two named tiers get the
//! default factor; there is no interpolation.
//!
//! Every tick reports a strictly positive gain.

use rand::Rng;

use super::evaluator::Decision;
use crate::config::AccrualConfig;

#[derive(Debug, Clone)]
pub struct YieldModel {
    config: AccrualConfig,
}

impl YieldModel {
    pub fn new(config: AccrualConfig) -> Self {
        Self { config }
    }

    pub fn efficiency_factor(&self, threshold_bps: u32) -> f64 {
        let cfg = &self.config;
        if threshold_bps >= cfg.conservative_threshold_bps {
            cfg.conservative_efficiency
        } else if threshold_bps <= cfg.aggressive_threshold_bps {
            cfg.aggressive_efficiency
        } else {
            cfg.default_efficiency
        }
    }

    /// Rebalance regime before noise
    pub fn rebalance_gain(&self, delta_bps: f64, threshold_bps: u32) -> f64 {
        delta_bps * self.efficiency_factor(threshold_bps) * 0.01
    }

    /// Hold regime before noise
    pub fn hold_gain(&self, current_apy: f64) -> f64 {
        let cfg = &self.config;
        current_apy * (cfg.tick_seconds / cfg.seconds_per_year) * cfg.acceleration
    }

    /// Yield gained this tick, in percentage points. Always > 0.
    pub fn accrue<R: Rng + ?Sized>(
        &self,
        decision: &Decision,
        threshold_bps: u32,
        rng: &mut R,
    ) -> f64 {
        let noise = (rng.gen::<f64>() * 2.0 - 1.0) * self.config.noise;

        let raw = if decision.should_rebalance {
            self.rebalance_gain(decision.delta_bps, threshold_bps) + noise
        } else {
            self.hold_gain(decision.current_apy) + noise
        };

        self.apply_floor(raw, rng)
    }

    /// Re-roll anything below the floor threshold into a small positive band
    fn apply_floor<R: Rng + ?Sized>(&self, gain: f64, rng: &mut R) -> f64 {
        let cfg = &self.config;
        let gain = if gain.is_nan() || gain < cfg.floor_threshold {
            cfg.reroll_base + rng.gen::<f64>() * cfg.reroll_span
        } else {
            gain
        };
        gain.max(cfg.min_gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn model() -> YieldModel {
        YieldModel::new(AccrualConfig::default())
    }

    fn decision(current_apy: f64, best_apy: f64, delta_bps: f64, rebalance: bool) -> Decision {
        Decision {
            current_pool: PoolId::A,
            best_pool: PoolId::B,
            current_apy,
            best_apy,
            delta_bps,
            should_rebalance: rebalance,
        }
    }

    #[test]
    fn test_efficiency_tiers() {
        let model = model();
        assert_eq!(model.efficiency_factor(300), 0.15);
        assert_eq!(model.efficiency_factor(500), 0.15);
        assert_eq!(model.efficiency_factor(150), 0.10);
        assert_eq!(model.efficiency_factor(51), 0.10);
        assert_eq!(model.efficiency_factor(50), 0.08);
        assert_eq!(model.efficiency_factor(0), 0.08);
    }

    #[test]
    fn test_rebalance_regime_within_noise_of_formula() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(11);
        let d = decision(5.0, 9.0, 8000.0, true);

        for _ in 0..100 {
            let gain = model.accrue(&d, 50, &mut rng);
            // 8000 * 0.08 * 0.01 = 6.4
            assert!((gain - 6.4).abs() <= 0.02 + 1e-12, "gain {gain}");
        }
    }

    #[test]
    fn test_hold_regime_within_noise_of_formula() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(12);
        let d = decision(8.0, 8.2, 250.0, false);
        let expected = 8.0 * (10.0 / 31_536_000.0) * 500_000.0;

        for _ in 0..100 {
            let gain = model.accrue(&d, 300, &mut rng);
            assert!((gain - expected).abs() <= 0.02 + 1e-12, "gain {gain}");
        }
    }

    #[test]
    fn test_zero_apy_hold_is_floored_positive() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(13);
        let d = decision(0.0, 0.0, 0.0, false);

        for _ in 0..500 {
            let gain = model.accrue(&d, 150, &mut rng);
            assert!(gain > 0.0);
            assert!(gain >= 0.01, "gain {gain}");
            assert!(gain <= 0.10 + 1e-12);
        }
    }

    #[test]
    fn test_negative_inputs_never_yield_non_positive_gain() {
        let model = model();
        let mut rng = StdRng::seed_from_u64(14);
        let cases = [
            decision(-3.0, -1.0, 0.0, false),
            decision(6.5, 6.5, -500.0, true),
            decision(f64::NAN, 1.0, 0.0, false),
        ];

        for d in &cases {
            for threshold in [0u32, 50, 150, 300] {
                let gain = model.accrue(d, threshold, &mut rng);
                assert!(gain > 0.0, "{d:?} threshold {threshold} -> {gain}");
            }
        }
    }

    #[test]
    fn test_patient_agents_capture_more_per_move() {
        let model = model();
        assert!(model.rebalance_gain(1000.0, 300) > model.rebalance_gain(1000.0, 150));
        assert!(model.rebalance_gain(1000.0, 150) > model.rebalance_gain(1000.0, 50));
    }
}
