use axum::{
    extract::{Path, State},
    Json,
};

use super::{bridge_error_response, ApiError};
use crate::api::state::AppState;
use crate::bridge::{ApprovalReceipt, PendingProposal};

/// GET /api/proposals
pub async fn get_proposals(State(state): State<AppState>) -> Json<Vec<PendingProposal>> {
    Json(state.runtime.proposals())
}

/// POST /api/proposals/:agent_id/approve
///
/// Holds the request open through the wallet round trip and settle delay.
pub async fn approve_proposal(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> std::result::Result<Json<ApprovalReceipt>, ApiError> {
    state
        .runtime
        .approve_proposal(&agent_id)
        .await
        .map(Json)
        .map_err(bridge_error_response)
}

/// POST /api/proposals/:agent_id/dismiss
pub async fn dismiss_proposal(
    State(state): State<AppState>,
    Path(agent_id): Path<String>,
) -> std::result::Result<Json<PendingProposal>, ApiError> {
    state
        .runtime
        .dismiss_proposal(&agent_id)
        .map(Json)
        .map_err(bridge_error_response)
}
