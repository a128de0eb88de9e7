use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{AgentConfig, PoolId};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub accrual: AccrualConfig,
    #[serde(default)]
    pub season: SeasonConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// One synthetic pool: `apy = base_apy + amplitude * sin(t) + noise`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PoolSpec {
    pub id: PoolId,
    pub label: String,
    pub protocol: String,
    /// Base APY in percent
    pub base_apy: f64,
    /// Scale of the slow sine oscillation
    pub amplitude: f64,
    /// Full width of the uniform noise band, centred on zero
    pub noise_range: f64,
}

impl PoolSpec {
    pub fn new(
        id: PoolId,
        label: &str,
        protocol: &str,
        base_apy: f64,
        amplitude: f64,
        noise_range: f64,
    ) -> Self {
        Self {
            id,
            label: label.to_string(),
            protocol: protocol.to_string(),
            base_apy,
            amplitude,
            noise_range,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Pools in configured order; the first one is the fallback pool
    pub pools: Vec<PoolSpec>,
    /// Wall-clock milliseconds per radian of the oscillation
    pub oscillation_divisor_ms: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            pools: vec![
                PoolSpec::new(PoolId::A, "Conservative Lending", "Curvance", 6.5, 0.2, 0.1),
                PoolSpec::new(PoolId::B, "Aggressive LP", "Fastlane", 14.2, 1.5, 2.0),
                PoolSpec::new(PoolId::C, "Liquid Staking", "Magma", 9.8, 0.0, 0.4),
            ],
            oscillation_divisor_ms: 10_000.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AccrualConfig {
    pub tick_seconds: f64,
    pub seconds_per_year: f64,
    /// Demo speed-up applied to hold accrual
    pub acceleration: f64,
    /// Symmetric noise half-width, in percentage points
    pub noise: f64,
    /// Gains below this are re-rolled into the floor band
    pub floor_threshold: f64,
    pub reroll_base: f64,
    pub reroll_span: f64,
    /// Absolute lower bound after re-roll
    pub min_gain: f64,
    pub conservative_threshold_bps: u32,
    pub conservative_efficiency: f64,
    pub aggressive_threshold_bps: u32,
    pub aggressive_efficiency: f64,
    pub default_efficiency: f64,
}

impl Default for AccrualConfig {
    fn default() -> Self {
        Self {
            tick_seconds: 10.0,
            seconds_per_year: 31_536_000.0,
            acceleration: 500_000.0,
            noise: 0.02,
            floor_threshold: 0.01,
            reroll_base: 0.05,
            reroll_span: 0.05,
            min_gain: 0.001,
            conservative_threshold_bps: 300,
            conservative_efficiency: 0.15,
            aggressive_threshold_bps: 50,
            aggressive_efficiency: 0.08,
            default_efficiency: 0.10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeasonConfig {
    pub tick_interval_ms: u64,
    /// Cosmetic elapsed-time clock
    pub clock_interval_ms: u64,
    pub history_cap: usize,
    pub chart_window: usize,
    pub activity_cap: usize,
    pub roster: Vec<AgentConfig>,
}

impl Default for SeasonConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10_000,
            clock_interval_ms: 1_000,
            history_cap: 50,
            chart_window: 20,
            activity_cap: 50,
            roster: AgentConfig::default_roster(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// On-chain recording mode at boot; can be toggled while no season is active
    pub enabled: bool,
    /// Approved transactions allowed per session
    pub demo_tx_cap: u32,
    /// Wait between submit and the verification read
    pub settle_delay_ms: u64,
    /// Fixed-point scale for the expected profit argument
    pub profit_scale: u64,
    pub rpc_url: String,
    /// Signer key; set via YIELDWARS_BRIDGE__PRIVATE_KEY
    pub private_key: Option<String>,
    /// Explorer link template, `{tx}` is replaced with the hash
    pub explorer_url_template: String,
    /// Agent id -> agent contract address
    pub agent_contracts: HashMap<String, String>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            demo_tx_cap: 3,
            settle_delay_ms: 3_000,
            profit_scale: 1_000_000,
            rpc_url: "https://rpc.monad.xyz".to_string(),
            private_key: None,
            explorer_url_template: "https://monadexplorer.com/tx/{tx}".to_string(),
            agent_contracts: HashMap::new(),
        }
    }
}

impl BridgeConfig {
    pub fn explorer_url(&self, tx_hash: &str) -> String {
        self.explorer_url_template.replace("{tx}", tx_hash)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Drive ticks through an external step endpoint instead of in-process
    pub remote_step_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            remote_step_url: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/demo.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("YIELDWARS_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (YIELDWARS_SEASON__TICK_INTERVAL_MS, etc.)
            .add_source(
                Environment::with_prefix("YIELDWARS")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.market.pools.is_empty() {
            errors.push("market.pools must define at least one pool".to_string());
        }

        let mut seen = std::collections::HashSet::new();
        for pool in &self.market.pools {
            if !seen.insert(pool.id) {
                errors.push(format!("market.pools lists {} more than once", pool.id));
            }
            if !pool.base_apy.is_finite() || !pool.amplitude.is_finite() {
                errors.push(format!("{} has non-finite APY parameters", pool.id));
            }
            if pool.noise_range < 0.0 {
                errors.push(format!("{} noise_range must be non-negative", pool.id));
            }
        }

        if self.market.oscillation_divisor_ms <= 0.0 {
            errors.push("market.oscillation_divisor_ms must be positive".to_string());
        }

        if self.accrual.min_gain <= 0.0 {
            errors.push("accrual.min_gain must be positive".to_string());
        }

        if self.accrual.reroll_base <= 0.0 {
            errors.push("accrual.reroll_base must be positive".to_string());
        }

        if self.season.tick_interval_ms == 0 {
            errors.push("season.tick_interval_ms must be positive".to_string());
        }

        if self.season.history_cap == 0 || self.season.chart_window == 0 {
            errors.push("season.history_cap and season.chart_window must be positive".to_string());
        }

        if self.season.roster.is_empty() {
            errors.push("season.roster must contain at least one agent".to_string());
        }

        let mut ids = std::collections::HashSet::new();
        for agent in &self.season.roster {
            if !ids.insert(agent.id.as_str()) {
                errors.push(format!("season.roster has duplicate agent id {}", agent.id));
            }
        }

        if self.bridge.profit_scale == 0 {
            errors.push("bridge.profit_scale must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.season.tick_interval_ms, 10_000);
        assert_eq!(config.season.history_cap, 50);
        assert_eq!(config.season.chart_window, 20);
        assert_eq!(config.bridge.demo_tx_cap, 3);
        assert_eq!(config.market.pools[0].id, PoolId::A);
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = AppConfig::default();
        config.market.pools.clear();
        config.season.roster.clear();
        config.season.tick_interval_ms = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_duplicate_agent_ids_rejected() {
        let mut config = AppConfig::default();
        let dup = config.season.roster[0].clone();
        config.season.roster.push(dup);

        let errors = config.validate().unwrap_err();
        assert!(errors[0].contains("duplicate agent id"));
    }

    #[test]
    fn test_explorer_url_template() {
        let bridge = BridgeConfig::default();
        assert_eq!(
            bridge.explorer_url("0xabc"),
            "https://monadexplorer.com/tx/0xabc"
        );
    }

    #[test]
    fn test_load_from_missing_dir_uses_defaults() {
        let config = AppConfig::load_from("/nonexistent/yieldwars-config").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.market.pools.len(), 3);
    }
}
