//! Synthetic market rates
//!
//! Every tick each configured pool gets `base + amplitude * sin(t) + noise`,
//! where `t` is wall-clock milliseconds over a fixed divisor. The generator
//! keeps no memory between calls.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::{MarketConfig, PoolSpec};
use crate::domain::{MarketSnapshot, PoolQuote};

#[derive(Debug, Clone)]
pub struct MarketGenerator {
    pools: Vec<PoolSpec>,
    oscillation_divisor_ms: f64,
}

impl MarketGenerator {
    pub fn new(config: &MarketConfig) -> Self {
        Self {
            pools: config.pools.clone(),
            oscillation_divisor_ms: config.oscillation_divisor_ms,
        }
    }

    pub fn generate_at<R: Rng + ?Sized>(&self, now: DateTime<Utc>, rng: &mut R) -> MarketSnapshot {
        let oscillation = self.oscillation(now);

        let quotes = self
            .pools
            .iter()
            .map(|pool| {
                let noise = (rng.gen::<f64>() - 0.5) * pool.noise_range;
                let apy = pool.base_apy + pool.amplitude * oscillation + noise;
                PoolQuote {
                    pool_id: pool.id,
                    apy: round2(apy),
                }
            })
            .collect();

        MarketSnapshot::new(quotes)
    }

    /// Shared sine term in [-1, 1]
    pub fn oscillation(&self, now: DateTime<Utc>) -> f64 {
        (now.timestamp_millis() as f64 / self.oscillation_divisor_ms).sin()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PoolId;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_every_configured_pool_is_quoted() {
        let generator = MarketGenerator::new(&MarketConfig::default());
        let mut rng = StdRng::seed_from_u64(7);

        for step in 0..200 {
            let now = DateTime::from_timestamp_millis(1_700_000_000_000 + step * 10_000).unwrap();
            let snapshot = generator.generate_at(now, &mut rng);
            let ids: Vec<_> = snapshot.quotes().iter().map(|q| q.pool_id).collect();
            assert_eq!(ids, vec![PoolId::A, PoolId::B, PoolId::C]);
            assert!(snapshot.quotes().iter().all(|q| q.apy.is_finite()));
        }
    }

    #[test]
    fn test_quotes_stay_inside_amplitude_and_noise_band() {
        let config = MarketConfig::default();
        let generator = MarketGenerator::new(&config);
        let mut rng = StdRng::seed_from_u64(42);

        for step in 0..500 {
            let now = DateTime::from_timestamp_millis(step * 777).unwrap();
            let snapshot = generator.generate_at(now, &mut rng);
            for pool in &config.pools {
                let apy = snapshot.get(pool.id).unwrap();
                let bound = pool.amplitude + pool.noise_range / 2.0 + 0.005;
                assert!(
                    (apy - pool.base_apy).abs() <= bound,
                    "{} apy {} outside band",
                    pool.id,
                    apy
                );
            }
        }
    }

    #[test]
    fn test_quotes_are_rounded_to_two_decimals() {
        let generator = MarketGenerator::new(&MarketConfig::default());
        let mut rng = StdRng::seed_from_u64(3);
        let snapshot = generator.generate_at(Utc::now(), &mut rng);

        for quote in snapshot.quotes() {
            let scaled = quote.apy * 100.0;
            assert!((scaled - scaled.round()).abs() < 1e-6);
        }
    }

    #[test]
    fn test_oscillation_is_zero_at_epoch() {
        let generator = MarketGenerator::new(&MarketConfig::default());
        let epoch = DateTime::from_timestamp_millis(0).unwrap();
        assert_eq!(generator.oscillation(epoch), 0.0);
    }
}
