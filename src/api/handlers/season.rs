use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};

use super::{error_response, ApiError};
use crate::api::{
    state::AppState,
    types::{OnChainToggleRequest, StartResponse, StatusResponse, StopResponse},
};
use crate::bridge::BridgeStatus;
use crate::season::{
    ActivityItem, AgentStats, ChartPoint, HistoryEntry, LeaderboardEntry, SeasonSnapshot,
    SeasonSummary,
};

/// GET /api/season
pub async fn get_season(State(state): State<AppState>) -> Json<SeasonSnapshot> {
    Json(state.runtime.snapshot().await)
}

/// POST /api/season/start
pub async fn start_season(
    State(state): State<AppState>,
) -> std::result::Result<Json<StartResponse>, ApiError> {
    let outcome = state.runtime.start().await.map_err(error_response)?;
    let snapshot = state.runtime.snapshot().await;

    Ok(Json(StartResponse {
        outcome,
        status: snapshot.status,
        ticks: snapshot.ticks,
    }))
}

/// POST /api/season/stop
pub async fn stop_season(State(state): State<AppState>) -> Json<StopResponse> {
    let summary = state.runtime.stop().await;
    Json(StopResponse {
        status: state.runtime.status().await,
        summary,
    })
}

/// POST /api/season/reset
pub async fn reset_season(
    State(state): State<AppState>,
) -> std::result::Result<Json<StatusResponse>, ApiError> {
    state.runtime.reset().await.map_err(error_response)?;
    Ok(Json(StatusResponse {
        status: state.runtime.status().await,
    }))
}

/// POST /api/season/onchain
pub async fn toggle_onchain(
    State(state): State<AppState>,
    Json(req): Json<OnChainToggleRequest>,
) -> std::result::Result<Json<BridgeStatus>, ApiError> {
    state
        .runtime
        .toggle_onchain(req.enabled)
        .await
        .map(Json)
        .map_err(error_response)
}

/// GET /api/season/leaderboard
pub async fn get_leaderboard(State(state): State<AppState>) -> Json<Vec<LeaderboardEntry>> {
    Json(state.runtime.leaderboard().await)
}

/// GET /api/season/history
pub async fn get_history(State(state): State<AppState>) -> Json<Vec<HistoryEntry>> {
    Json(state.runtime.history().await)
}

/// GET /api/season/history.csv
pub async fn export_history_csv(State(state): State<AppState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"yield_wars_history.csv\"",
            ),
        ],
        state.runtime.history_csv().await,
    )
}

/// GET /api/season/chart
pub async fn get_chart(State(state): State<AppState>) -> Json<Vec<ChartPoint>> {
    Json(state.runtime.chart().await)
}

/// GET /api/season/activity
pub async fn get_activity(State(state): State<AppState>) -> Json<Vec<ActivityItem>> {
    Json(state.runtime.activity().await)
}

/// GET /api/season/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<Vec<AgentStats>> {
    Json(state.runtime.stats().await)
}

/// GET /api/season/summary -- 404 until a season with at least one tick has stopped
pub async fn get_summary(
    State(state): State<AppState>,
) -> std::result::Result<Json<SeasonSummary>, ApiError> {
    state.runtime.summary().await.map(Json).ok_or((
        StatusCode::NOT_FOUND,
        "no season summary available".to_string(),
    ))
}
