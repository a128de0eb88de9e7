use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use yieldwars::{
    api::{create_router, AppState},
    bridge::OnChainBridge,
    config::AppConfig,
    engine::LocalSimulator,
    season::SeasonRuntime,
};

fn test_app() -> Router {
    let config = AppConfig::default();
    let simulator = Arc::new(LocalSimulator::from_config(&config));
    let bridge = Arc::new(OnChainBridge::new(config.bridge.clone(), None));
    let runtime = SeasonRuntime::new(config.season.clone(), simulator.clone(), bridge);
    create_router(AppState::new(runtime, simulator))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(payload) => builder
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .expect("failed to build json request"),
        None => builder.body(Body::empty()).expect("failed to build request"),
    };

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router request failed");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");

    (status, String::from_utf8_lossy(&bytes).to_string())
}

fn parse(body: &str) -> Value {
    serde_json::from_str(body).expect("response is not json")
}

#[tokio::test]
async fn health_reports_idle_season() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    let json = parse(&body);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["season"], "IDLE");
}

#[tokio::test]
async fn simulate_get_returns_baseline_roster() {
    let app = test_app();
    let (status, body) = send(&app, Method::GET, "/api/agents/simulate", None).await;

    assert_eq!(status, StatusCode::OK);
    let agents = parse(&body);
    let agents = agents.as_array().expect("roster is an array");
    assert_eq!(agents.len(), 3);
    for agent in agents {
        assert!(agent["id"].is_string());
        assert!(agent["rebalanceThreshold"].is_string());
        assert_eq!(agent["simulationCount"], "0");
    }
}

#[tokio::test]
async fn simulate_post_returns_one_result_per_agent() {
    let app = test_app();
    let payload = json!({
        "agents": [
            {
                "id": "agent-x",
                "name": "Agent X",
                "strategy": "Custom",
                "rebalanceThreshold": "100",
                "riskLevel": 5,
                "currentPool": "Pool A (Curvance)",
                "simulatedYield": "0.5000",
                "simulationCount": 3
            },
            {
                "id": "agent-y",
                "name": "Agent Y",
                "rebalanceThreshold": 50,
                "currentPool": 1
            }
        ]
    });

    let (status, body) = send(&app, Method::POST, "/api/agents/simulate", Some(payload)).await;
    assert_eq!(status, StatusCode::OK);

    let json = parse(&body);
    assert_eq!(json["success"], true);
    assert_eq!(json["marketData"].as_object().map(|m| m.len()), Some(3));

    let results = json["results"].as_array().expect("results array");
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["agentId"], "agent-x");
    assert_eq!(results[0]["fromPool"], "Pool A");
    assert_eq!(results[1]["fromPool"], "Pool B");
    for result in results {
        let action = result["action"].as_str().expect("action string");
        assert!(action == "REBALANCE" || action == "HOLD");
        assert!(result["yieldGain"].as_f64().expect("yield gain") >= 0.0);
    }
}

#[tokio::test]
async fn season_start_stop_reset_flow() {
    let app = test_app();

    let (status, body) = send(&app, Method::POST, "/api/season/start", None).await;
    assert_eq!(status, StatusCode::OK);
    let started = parse(&body);
    assert_eq!(started["outcome"], "STARTED");
    assert_eq!(started["status"], "ACTIVE");
    assert_eq!(started["ticks"], 1);

    // Re-entrant start changes nothing
    let (status, body) = send(&app, Method::POST, "/api/season/start", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["outcome"], "ALREADY_ACTIVE");

    // Reset is only allowed once the season has stopped
    let (status, _) = send(&app, Method::POST, "/api/season/reset", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(&app, Method::GET, "/api/season/leaderboard", None).await;
    assert_eq!(status, StatusCode::OK);
    let board = parse(&body);
    let board = board.as_array().expect("leaderboard array");
    assert_eq!(board.len(), 3);
    assert_eq!(board[0]["rank"], 1);

    let (status, body) = send(&app, Method::POST, "/api/season/stop", None).await;
    assert_eq!(status, StatusCode::OK);
    let stopped = parse(&body);
    assert_eq!(stopped["status"], "STOPPED");
    assert_eq!(stopped["summary"]["ticks"], 1);
    assert_eq!(stopped["summary"]["agents"].as_array().map(Vec::len), Some(3));

    let (status, body) = send(&app, Method::GET, "/api/season/summary", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(parse(&body)["winner"]["finalYield"].is_string());

    let (status, body) = send(&app, Method::POST, "/api/season/reset", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse(&body)["status"], "IDLE");

    let (_, body) = send(&app, Method::GET, "/api/season", None).await;
    let snapshot = parse(&body);
    assert_eq!(snapshot["ticks"], 0);
    assert_eq!(snapshot["status"], "IDLE");
}

#[tokio::test]
async fn summary_missing_before_any_season() {
    let app = test_app();
    let (status, _) = send(&app, Method::GET, "/api/season/summary", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_csv_has_header_and_content_type() {
    let app = test_app();
    let request = Request::builder()
        .uri("/api/season/history.csv")
        .body(Body::empty())
        .expect("failed to build request");
    let response = app.oneshot(request).await.expect("router request failed");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("text/csv")
    );
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("failed to read response body");
    let body = String::from_utf8_lossy(&bytes);
    assert!(body.starts_with("Time,Agent,From,To,Delta (bps),Yield Impact (%)"));
}

#[tokio::test]
async fn onchain_toggle_locked_while_active() {
    let app = test_app();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/season/onchain",
        Some(json!({ "enabled": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let bridge = parse(&body);
    assert_eq!(bridge["enabled"], true);
    assert_eq!(bridge["walletConnected"], false);

    send(&app, Method::POST, "/api/season/start", None).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/season/onchain",
        Some(json!({ "enabled": false })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    send(&app, Method::POST, "/api/season/stop", None).await;
}

#[tokio::test]
async fn proposal_actions_without_queue_are_rejected() {
    let app = test_app();

    // Disabled bridge refuses before looking up the proposal
    let (status, _) = send(&app, Method::POST, "/api/proposals/agent-alpha/approve", None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, proposals) = send(&app, Method::GET, "/api/proposals", None).await;
    assert_eq!(parse(&proposals), json!([]));

    let (status, _) = send(&app, Method::POST, "/api/proposals/agent-alpha/dismiss", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
