use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{handlers, state::AppState, websocket::websocket_handler};

pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health_handler))
        // Simulation step endpoint
        .route(
            "/api/agents/simulate",
            get(handlers::get_roster).post(handlers::post_step),
        )
        // Season lifecycle
        .route("/api/season", get(handlers::get_season))
        .route("/api/season/start", post(handlers::start_season))
        .route("/api/season/stop", post(handlers::stop_season))
        .route("/api/season/reset", post(handlers::reset_season))
        .route("/api/season/onchain", post(handlers::toggle_onchain))
        // Season projections
        .route("/api/season/leaderboard", get(handlers::get_leaderboard))
        .route("/api/season/history", get(handlers::get_history))
        .route("/api/season/history.csv", get(handlers::export_history_csv))
        .route("/api/season/chart", get(handlers::get_chart))
        .route("/api/season/activity", get(handlers::get_activity))
        .route("/api/season/stats", get(handlers::get_stats))
        .route("/api/season/summary", get(handlers::get_summary))
        // On-chain proposals
        .route("/api/proposals", get(handlers::get_proposals))
        .route(
            "/api/proposals/:agent_id/approve",
            post(handlers::approve_proposal),
        )
        .route(
            "/api/proposals/:agent_id/dismiss",
            post(handlers::dismiss_proposal),
        )
        // WebSocket endpoint
        .route("/ws", get(websocket_handler))
        .with_state(state)
        .layer(cors)
}
