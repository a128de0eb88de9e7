//! Simulation engine: market rates, per-agent decisions, yield accrual
//!
//! Everything here is synchronous and side-effect free apart from the random
//! draws. The season controller drives it through [`SimulationStep`].

pub mod accrual;
pub mod evaluator;
pub mod market;
pub mod step;

pub use accrual::YieldModel;
pub use evaluator::{delta_bps, evaluate, Decision, MAX_DELTA_BPS};
pub use market::MarketGenerator;
pub use step::{AgentWire, LocalSimulator, SimulationStep, StepRequest, StepResponse};
