pub mod agent;
pub mod market;
pub mod state;
pub mod tick;

pub use agent::*;
pub use market::*;
pub use state::*;
pub use tick::*;
