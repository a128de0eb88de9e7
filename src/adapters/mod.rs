pub mod api_server;
pub mod step_client;

pub use api_server::{start_api_server, start_api_server_background};
pub use step_client::HttpSimulationStep;
