pub mod adapters;
pub mod api;
pub mod bridge;
pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod season;

pub use bridge::{OnChainBridge, PendingProposal, WalletSession};
pub use config::AppConfig;
pub use domain::{AgentConfig, PoolId, RebalanceAction, SeasonStatus, TickResult};
pub use engine::{LocalSimulator, SimulationStep, StepRequest, StepResponse};
pub use error::{BridgeError, Result, YieldWarsError};
pub use season::{SeasonEvent, SeasonLedger, SeasonRuntime};
