//! HTTP request surface tests, driving the router in-process

mod fixtures;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use fixtures::{create_test_system, game_server, lobby_server, test_config, TestSystem};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use waypoint::routing::RoutingMode;
use waypoint::service::router;
use waypoint::types::QueueEntry;

fn setup() -> (TestSystem, Router) {
    let system = create_test_system(test_config(RoutingMode::Relay));
    let app = router(system.app.api().clone());
    (system, app)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

#[tokio::test]
async fn test_join_reports_position() {
    let (system, app) = setup();

    let (status, body) = send(
        &app,
        Method::POST,
        "/queue/join",
        Some(json!({"uuid": "p1", "mode": "duel", "lobbyServer": "10.0.0.2:7001"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");
    assert_eq!(body["mode"], "duel");
    assert_eq!(body["position"], 1);

    let (_, body) = send(
        &app,
        Method::POST,
        "/queue/join",
        Some(json!({"uuid": "p2", "mode": "duel"})),
    )
    .await;
    assert_eq!(body["position"], 2);

    let entries = system.app.api().queues.peek("duel", 2);
    assert_eq!(entries[0].lobby_server, "10.0.0.2:7001");
    assert_eq!(entries[1].lobby_server, "");
}

#[tokio::test]
async fn test_duplicate_join_queues_twice() {
    let (system, app) = setup();

    for expected in [1, 2] {
        let (status, body) = send(
            &app,
            Method::POST,
            "/queue/join",
            Some(json!({"uuid": "p1", "mode": "duel"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["position"], expected);
    }

    assert!(system.app.api().queues.contains("duel", &"p1".to_string()));
    assert_eq!(system.app.api().queues.size("duel"), 2);
}

#[tokio::test]
async fn test_join_rejects_missing_fields() {
    let (system, app) = setup();

    let (status, body) = send(
        &app,
        Method::POST,
        "/queue/join",
        Some(json!({"uuid": "", "mode": "duel"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, Method::POST, "/queue/join", Some(json!({"uuid": "p1"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    assert_eq!(system.app.api().queues.total_waiting(), 0);
}

#[tokio::test]
async fn test_leave_and_size() {
    let (system, app) = setup();
    let queues = &system.app.api().queues;
    queues.join("duel", QueueEntry::new("p1", "lobby-1"));
    queues.join("duel", QueueEntry::new("p2", "lobby-1"));

    let (status, body) = send(&app, Method::GET, "/queue/duel/size", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"mode": "duel", "size": 2}));

    let (_, body) = send(
        &app,
        Method::POST,
        "/queue/leave",
        Some(json!({"uuid": "p1", "mode": "duel"})),
    )
    .await;
    assert_eq!(body["removed"], true);

    let (_, body) = send(
        &app,
        Method::POST,
        "/queue/leave",
        Some(json!({"uuid": "p1", "mode": "duel"})),
    )
    .await;
    assert_eq!(body["removed"], false);

    let (_, body) = send(&app, Method::GET, "/queue/duel/size", None).await;
    assert_eq!(body["size"], 1);

    let (_, body) = send(&app, Method::GET, "/queue/unknown/size", None).await;
    assert_eq!(body["size"], 0);
}

#[tokio::test]
async fn test_register_and_remove_player() {
    let (system, app) = setup();

    let (status, _) = send(
        &app,
        Method::POST,
        "/players/register",
        Some(json!({"player_uuid": "p1", "player_ip": "10.1.0.1", "server_id": "lobby-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let location = system.app.api().players.get_by_ip("10.1.0.1").unwrap();
    assert_eq!(location.uuid, "p1");
    assert_eq!(location.server_id, "lobby-1");

    let (status, body) = send(&app, Method::DELETE, "/players/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(system.app.api().players.get_by_uuid("p1").is_none());
    assert_eq!(system.relay.deleted(), vec!["10.1.0.1".to_string()]);

    // Removing again is a no-op
    let (status, _) = send(&app, Method::DELETE, "/players/p1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(system.relay.deleted().len(), 1);
}

#[tokio::test]
async fn test_register_rejects_missing_ip() {
    let (_system, app) = setup();

    let (status, _) = send(
        &app,
        Method::POST,
        "/players/register",
        Some(json!({"player_uuid": "p1", "player_ip": "", "server_id": "lobby-1"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_referrals_drain_once() {
    let (system, app) = setup();
    let api = system.app.api();
    system.registry.add_server(game_server("s1", "duel", "m1", 2));
    api.players.register("p1", "10.1.0.1", "lobby-1");
    api.players.register("p2", "10.1.0.2", "lobby-1");
    api.queues.join("duel", QueueEntry::new("p1", "lobby-1"));
    api.queues.join("duel", QueueEntry::new("p2", "lobby-1"));
    system.app.engine().tick().await;

    let (status, body) = send(&app, Method::GET, "/referrals?server=lobby-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!([
            {"player_uuid": "p1", "host": "relay.local", "port": 5520},
            {"player_uuid": "p2", "host": "relay.local", "port": 5520},
        ])
    );

    let (_, body) = send(&app, Method::GET, "/referrals?server=lobby-1", None).await;
    assert_eq!(body, json!([]));

    let (status, _) = send(&app, Method::GET, "/referrals", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assign_returns_first_lobby() {
    let (system, app) = setup();
    system.registry.add_server(lobby_server("full", 10, 10));
    system.registry.add_server(lobby_server("lobby-2", 1, 10));

    let (status, body) = send(&app, Method::GET, "/assign?ip=10.1.0.9", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "lobby-2.lobby.local:6000");

    let (status, _) = send(&app, Method::GET, "/assign", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_assign_without_lobby_is_unavailable() {
    let (_system, app) = setup();

    let (status, body) = send(&app, Method::GET, "/assign?ip=10.1.0.9", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "no lobby available");
}

#[tokio::test]
async fn test_route_request_registers_connection() {
    let (system, app) = setup();
    system.registry.add_server(lobby_server("lobby-1", 0, 10));

    let (status, body) = send(
        &app,
        Method::POST,
        "/route-request",
        Some(json!({"player_ip": "10.1.0.7"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backend"], "lobby-1.lobby.local:6000");
    assert_eq!(body["server_id"], "lobby-1");

    let location = system.app.api().players.get_by_ip("10.1.0.7").unwrap();
    assert_eq!(location.server_id, "lobby-1");
    assert_eq!(
        system.relay.routes(),
        vec![("10.1.0.7".to_string(), "lobby-1.lobby.local:6000".to_string())]
    );
}

#[tokio::test]
async fn test_route_request_without_lobby() {
    let (system, app) = setup();

    let (status, _) = send(
        &app,
        Method::POST,
        "/route-request",
        Some(json!({"player_ip": "10.1.0.7"})),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(system.app.api().players.is_empty());
}

#[tokio::test]
async fn test_match_complete_endpoint() {
    let (system, app) = setup();
    system.registry.add_server(lobby_server("lobby-1", 0, 10));
    system.app.api().players.register("p1", "10.1.0.1", "s1");

    let (status, body) = send(
        &app,
        Method::POST,
        "/match-complete",
        Some(json!({
            "serverId": "s1",
            "matchId": "m1",
            "players": [
                {"uuid": "p1", "action": "lobby"},
                {"uuid": "p2", "action": "requeue", "mode": "duel"},
                {"uuid": "p3", "action": "requeue"}
            ]
        })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"status": "processed", "sentToLobby": 1, "requeued": 1, "skipped": 1})
    );
    assert_eq!(system.app.api().queues.size("duel"), 1);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (_system, app) = setup();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/match-complete")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_health_follows_running_flag() {
    let (system, app) = setup();

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");

    *system.app.api().is_running.write().await = true;
    system.app.api().queues.join("duel", QueueEntry::new("p1", "lobby-1"));

    system.app.api().players.register("p1", "10.1.0.1", "lobby-1");
    system.app.api().players.register("p2", "10.1.0.2", "lobby-1");
    system.app.api().players.register("p3", "10.1.0.3", "s1");

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["stats"]["players_waiting"], 1);
    assert_eq!(body["stats"]["tracked_players"], 3);
    assert_eq!(body["stats"]["occupied_servers"], 2);
}

#[tokio::test]
async fn test_metrics_exposition() {
    let (system, app) = setup();
    system.app.api().queues.join("duel", QueueEntry::new("p1", "lobby-1"));

    let request = Request::builder()
        .uri("/metrics")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("waypoint_players_waiting{mode=\"duel\"} 1"));
}
