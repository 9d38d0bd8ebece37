//! HTTP API for game servers, lobby plugins and the relay
//!
//! Thin translation of JSON requests onto the stores and the match engine.
//! Invalid input is answered with 400 and `{"error": ...}`; a missing lobby
//! with 503.

use crate::clients::RelayClient;
use crate::matcher::MatchEngine;
use crate::metrics::MetricsCollector;
use crate::players::PlayerRegistry;
use crate::queue::WaitQueueStore;
use crate::referrals::ReferralInbox;
use crate::service::health::{HealthCheck, HealthStatus};
use crate::types::{MatchCompleteReport, QueueEntry, Referral};
use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

/// Everything the handlers touch
#[derive(Clone)]
pub struct ApiState {
    pub queues: Arc<WaitQueueStore>,
    pub players: Arc<PlayerRegistry>,
    pub referrals: Arc<ReferralInbox>,
    pub engine: MatchEngine,
    pub relay: Option<Arc<dyn RelayClient>>,
    pub metrics: Arc<MetricsCollector>,
    pub service_name: String,
    pub is_running: Arc<RwLock<bool>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinRequest {
    uuid: String,
    mode: String,
    #[serde(default)]
    lobby_server: String,
}

#[derive(Debug, Deserialize)]
struct LeaveRequest {
    uuid: String,
    mode: String,
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    player_uuid: String,
    player_ip: String,
    server_id: String,
}

#[derive(Debug, Deserialize)]
struct RouteRequest {
    player_ip: String,
}

#[derive(Debug, Deserialize)]
struct ReferralQuery {
    server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssignQuery {
    ip: Option<String>,
}

/// Build the API router
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .route("/queue/join", post(join_handler))
        .route("/queue/leave", post(leave_handler))
        .route("/queue/{mode}/size", get(size_handler))
        .route("/players/register", post(register_handler))
        .route("/players/{uuid}", delete(remove_player_handler))
        .route("/referrals", get(referrals_handler))
        .route("/match-complete", post(match_complete_handler))
        .route("/assign", get(assign_handler))
        .route("/route-request", post(route_request_handler))
        .with_state(state)
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    error_response(StatusCode::BAD_REQUEST, message)
}

fn rejected(rejection: JsonRejection) -> Response {
    bad_request(rejection.body_text())
}

async fn health_handler(State(state): State<ApiState>) -> Response {
    let health = HealthCheck::check(&state).await;
    let status = match health.status {
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
    };
    (status, Json(health)).into_response()
}

async fn metrics_handler(State(state): State<ApiState>) -> Response {
    state.metrics.update_queue_sizes(&state.queues.sizes());
    state.metrics.update_tracked_players(state.players.len());

    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, TextEncoder::new().format_type().to_string())],
            body,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics")
        }
    }
}

async fn join_handler(
    State(state): State<ApiState>,
    body: Result<Json<JoinRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    if request.uuid.is_empty() || request.mode.is_empty() {
        return bad_request("uuid and mode are required");
    }

    if state.queues.contains(&request.mode, &request.uuid) {
        warn!(
            "{} is already waiting in '{}', queuing a second entry",
            request.uuid, request.mode
        );
    }

    let position = state.queues.join(
        &request.mode,
        QueueEntry::new(request.uuid.clone(), request.lobby_server),
    );
    state.metrics.record_join(&request.mode);
    info!(
        "{} joined '{}' at position {}",
        request.uuid, request.mode, position
    );

    Json(json!({
        "status": "queued",
        "mode": request.mode,
        "position": position,
    }))
    .into_response()
}

async fn leave_handler(
    State(state): State<ApiState>,
    body: Result<Json<LeaveRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };

    let removed = state.queues.leave(&request.mode, &request.uuid);
    if removed {
        state.metrics.record_leave(&request.mode);
        info!("{} left '{}'", request.uuid, request.mode);
    }

    Json(json!({ "removed": removed })).into_response()
}

async fn size_handler(State(state): State<ApiState>, Path(mode): Path<String>) -> Response {
    let size = state.queues.size(&mode);
    Json(json!({ "mode": mode, "size": size })).into_response()
}

async fn register_handler(
    State(state): State<ApiState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    if request.player_uuid.is_empty() || request.player_ip.is_empty() {
        return bad_request("player_uuid and player_ip are required");
    }

    state
        .players
        .register(&request.player_uuid, &request.player_ip, &request.server_id);
    info!(
        "Registered {} on {}",
        request.player_uuid, request.server_id
    );

    Json(json!({ "status": "ok" })).into_response()
}

async fn remove_player_handler(
    State(state): State<ApiState>,
    Path(uuid): Path<String>,
) -> Response {
    if let Some(location) = state.players.remove(&uuid) {
        if let Some(relay) = &state.relay {
            if let Err(e) = relay.delete_route(&location.ip).await {
                warn!("Failed to delete relay route for {}: {}", uuid, e);
            }
        }
        info!("Removed {}", uuid);
    } else {
        debug!("Remove for unknown player {}", uuid);
    }

    Json(json!({ "status": "ok" })).into_response()
}

async fn referrals_handler(
    State(state): State<ApiState>,
    Query(query): Query<ReferralQuery>,
) -> Response {
    let Some(server_id) = query.server.filter(|server| !server.is_empty()) else {
        return bad_request("server required");
    };

    let referrals: Vec<Referral> = state.referrals.drain_all(&server_id);
    if !referrals.is_empty() {
        debug!("Handing {} referrals to {}", referrals.len(), server_id);
    }
    Json(referrals).into_response()
}

async fn match_complete_handler(
    State(state): State<ApiState>,
    body: Result<Json<MatchCompleteReport>, JsonRejection>,
) -> Response {
    let Json(report) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };

    let summary = state.engine.handle_match_complete(&report).await;
    Json(json!({
        "status": "processed",
        "sentToLobby": summary.sent_to_lobby.len(),
        "requeued": summary.requeued.len(),
        "skipped": summary.skipped.len(),
    }))
    .into_response()
}

async fn assign_handler(
    State(state): State<ApiState>,
    Query(query): Query<AssignQuery>,
) -> Response {
    if query.ip.filter(|ip| !ip.is_empty()).is_none() {
        return bad_request("ip required");
    }

    match state.engine.find_lobby().await {
        Ok(Some(lobby)) => Json(json!({ "backend": lobby.backend() })).into_response(),
        Ok(None) => error_response(StatusCode::SERVICE_UNAVAILABLE, "no lobby available"),
        Err(e) => {
            warn!("Lobby lookup failed: {}", e);
            error_response(StatusCode::SERVICE_UNAVAILABLE, "no lobby available")
        }
    }
}

async fn route_request_handler(
    State(state): State<ApiState>,
    body: Result<Json<RouteRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return rejected(rejection),
    };
    if request.player_ip.is_empty() {
        return bad_request("player_ip required");
    }

    let lobby = match state.engine.find_lobby().await {
        Ok(Some(lobby)) => lobby,
        Ok(None) => {
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "no lobbies available")
        }
        Err(e) => {
            warn!("Lobby lookup failed: {}", e);
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "failed to query registry");
        }
    };

    let backend = lobby.backend();
    // Until the lobby registers the real identity, the address stands in for it.
    state
        .players
        .register(&request.player_ip, &request.player_ip, &lobby.id);

    if let Some(relay) = &state.relay {
        if let Err(e) = relay.set_route(&request.player_ip, &backend).await {
            warn!("Relay route for {} failed: {}", request.player_ip, e);
        }
    }

    info!("Routed new connection {} to {}", request.player_ip, lobby.id);
    Json(json!({ "backend": backend, "server_id": lobby.id })).into_response()
}
