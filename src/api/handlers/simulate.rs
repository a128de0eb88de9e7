use axum::{extract::State, Json};
use tracing::debug;

use super::{error_response, ApiError};
use crate::api::state::AppState;
use crate::engine::{AgentWire, SimulationStep, StepRequest, StepResponse};

/// GET /api/agents/simulate -- baseline roster
pub async fn get_roster(
    State(state): State<AppState>,
) -> std::result::Result<Json<Vec<AgentWire>>, ApiError> {
    state
        .simulator
        .roster()
        .await
        .map(Json)
        .map_err(error_response)
}

/// POST /api/agents/simulate -- one tick for the posted roster
pub async fn post_step(
    State(state): State<AppState>,
    Json(request): Json<StepRequest>,
) -> std::result::Result<Json<StepResponse>, ApiError> {
    debug!(agents = request.agents.len(), "simulate request");
    state
        .simulator
        .step(&request)
        .await
        .map(Json)
        .map_err(error_response)
}
