use thiserror::Error;

/// Main error type for the yield simulation engine
#[derive(Error, Debug)]
pub enum YieldWarsError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Simulation errors
    #[error("Simulation step failed: {0}")]
    SimulationFailed(String),

    #[error("Invalid pool: {0}")]
    InvalidPool(String),

    #[error("Unknown agent: {0}")]
    UnknownAgent(String),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // On-chain errors
    #[error("On-chain bridge: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Chain error: {0}")]
    Chain(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for YieldWarsError
pub type Result<T> = std::result::Result<T, YieldWarsError>;

/// Failures of the propose-then-approve flow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("on-chain recording is disabled")]
    Disabled,

    #[error("no wallet session available")]
    WalletUnavailable,

    #[error("no pending proposal for agent {agent_id}")]
    NoProposal { agent_id: String },

    #[error("proposal for agent {agent_id} is already being submitted")]
    AlreadyInFlight { agent_id: String },

    #[error("demo cap reached: {cap} on-chain transactions per session")]
    DemoCapReached { cap: u32 },

    #[error("no contract configured for agent {agent_id}")]
    MissingContract { agent_id: String },

    #[error("delta {delta_bps} bps is below on-chain threshold {threshold_bps} bps")]
    PreflightRejected { delta_bps: u64, threshold_bps: u64 },

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("rebalance counter did not advance (before {before}, after {after})")]
    CounterNotAdvanced { before: u64, after: u64 },
}

impl BridgeError {
    /// Short human-readable reason for per-proposal notices
    pub fn reason(&self) -> String {
        match self {
            BridgeError::PreflightRejected {
                delta_bps,
                threshold_bps,
            } => format!(
                "Delta {}bps below contract threshold {}bps; nothing submitted",
                delta_bps, threshold_bps
            ),
            BridgeError::CounterNotAdvanced { .. } => {
                "Transaction mined but the agent's rebalance counter did not increase".to_string()
            }
            BridgeError::TransactionFailed(reason) => format!("Transaction failed: {}", reason),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bridge_error_wraps_into_main_error() {
        let err: YieldWarsError = BridgeError::DemoCapReached { cap: 3 }.into();
        assert!(matches!(err, YieldWarsError::Bridge(_)));
        assert!(err.to_string().contains("demo cap reached"));
    }

    #[test]
    fn test_preflight_reason_mentions_both_values() {
        let err = BridgeError::PreflightRejected {
            delta_bps: 8000,
            threshold_bps: 9000,
        };
        let reason = err.reason();
        assert!(reason.contains("8000"));
        assert!(reason.contains("9000"));
    }

    #[test]
    fn test_non_incrementing_is_distinct_from_revert() {
        let reverted = BridgeError::TransactionFailed("execution reverted".into());
        let stuck = BridgeError::CounterNotAdvanced {
            before: 4,
            after: 4,
        };
        assert_ne!(reverted.reason(), stuck.reason());
    }
}
