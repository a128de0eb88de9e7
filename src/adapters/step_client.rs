//! Simulation step over HTTP
//!
//! Talks to an external step endpoint with the same JSON contract the local
//! server exposes at `/api/agents/simulate`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::engine::{AgentWire, SimulationStep, StepRequest, StepResponse};
use crate::error::{Result, YieldWarsError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

pub struct HttpSimulationStep {
    client: reqwest::Client,
    url: String,
}

impl HttpSimulationStep {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SimulationStep for HttpSimulationStep {
    async fn roster(&self) -> Result<Vec<AgentWire>> {
        debug!(url = %self.url, "fetching baseline roster");

        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(YieldWarsError::SimulationFailed(format!(
                "roster request returned {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    async fn step(&self, request: &StepRequest) -> Result<StepResponse> {
        debug!(url = %self.url, agents = request.agents.len(), "posting simulation step");

        let response = self.client.post(&self.url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(YieldWarsError::SimulationFailed(format!(
                "Simulation API failed: {}",
                response.status()
            )));
        }

        let body: StepResponse = response.json().await?;
        if !body.success {
            return Err(YieldWarsError::SimulationFailed(
                "step endpoint reported failure".to_string(),
            ));
        }
        Ok(body)
    }
}
