//! Test fixtures and recording fakes for integration testing
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use waypoint::clients::{RelayClient, ServerNotifier};
use waypoint::config::AppConfig;
use waypoint::error::{MatchmakingError, Result};
use waypoint::registry::{ServerQuery, SessionRegistry};
use waypoint::routing::RoutingMode;
use waypoint::service::AppState;
use waypoint::types::{
    MatchId, MatchInfo, MatchStatus, PlayerId, ServerId, ServerInfo, ServerType, TransferRequest,
};

/// Session registry fake with a programmable server list.
///
/// Game queries return every game server whose mode matches; lobby queries
/// return every lobby in insertion order. Status updates are recorded and,
/// unless `fail_updates` is set, applied to the stored match.
#[derive(Debug, Default)]
pub struct FakeRegistry {
    servers: Mutex<Vec<ServerInfo>>,
    queries: Mutex<Vec<ServerQuery>>,
    updates: Mutex<Vec<(ServerId, MatchId, MatchInfo)>>,
    fail_queries: Mutex<bool>,
    fail_updates: Mutex<bool>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_server(&self, server: ServerInfo) {
        self.servers.lock().unwrap().push(server);
    }

    pub fn set_fail_queries(&self, fail: bool) {
        *self.fail_queries.lock().unwrap() = fail;
    }

    pub fn set_fail_updates(&self, fail: bool) {
        *self.fail_updates.lock().unwrap() = fail;
    }

    pub fn queries(&self) -> Vec<ServerQuery> {
        self.queries.lock().unwrap().clone()
    }

    pub fn updates(&self) -> Vec<(ServerId, MatchId, MatchInfo)> {
        self.updates.lock().unwrap().clone()
    }

    pub fn match_status(&self, server_id: &str, match_id: &str) -> Option<MatchStatus> {
        self.servers
            .lock()
            .unwrap()
            .iter()
            .find(|server| server.id == server_id)
            .and_then(|server| server.matches.get(match_id))
            .map(|info| info.status)
    }
}

#[async_trait]
impl SessionRegistry for FakeRegistry {
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerInfo>> {
        self.queries.lock().unwrap().push(query.clone());
        if *self.fail_queries.lock().unwrap() {
            return Err(MatchmakingError::RegistryUnavailable {
                message: "connection refused".to_string(),
            }
            .into());
        }

        let servers = self.servers.lock().unwrap();
        let found = servers
            .iter()
            .filter(|server| server.server_type == Some(query.server_type))
            .filter(|server| query.mode.is_none() || server.mode == query.mode)
            .filter(|server| {
                !query.has_ready_match
                    || server
                        .matches
                        .values()
                        .any(|info| info.status == MatchStatus::Ready)
            })
            .filter(|server| {
                !query.has_capacity
                    || server.max_players == 0
                    || server.players < server.max_players
            })
            .cloned()
            .collect();
        Ok(found)
    }

    async fn update_match(
        &self,
        server_id: &ServerId,
        match_id: &MatchId,
        info: &MatchInfo,
    ) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((server_id.clone(), match_id.clone(), info.clone()));
        if *self.fail_updates.lock().unwrap() {
            return Err(MatchmakingError::RegistryUnavailable {
                message: "update timed out".to_string(),
            }
            .into());
        }

        let mut servers = self.servers.lock().unwrap();
        if let Some(slot) = servers
            .iter_mut()
            .find(|server| &server.id == server_id)
            .and_then(|server| server.matches.get_mut(match_id))
        {
            *slot = info.clone();
        }
        Ok(())
    }
}

/// Records expect and transfer notifications
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    expects: Mutex<Vec<(ServerId, MatchId, Vec<PlayerId>)>>,
    transfers: Mutex<Vec<(String, TransferRequest)>>,
    fail_expects: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_expects(&self, fail: bool) {
        *self.fail_expects.lock().unwrap() = fail;
    }

    pub fn expects(&self) -> Vec<(ServerId, MatchId, Vec<PlayerId>)> {
        self.expects.lock().unwrap().clone()
    }

    pub fn transfers(&self) -> Vec<(String, TransferRequest)> {
        self.transfers.lock().unwrap().clone()
    }
}

#[async_trait]
impl ServerNotifier for RecordingNotifier {
    async fn send_expect(
        &self,
        server: &ServerInfo,
        match_id: &MatchId,
        uuids: &[PlayerId],
    ) -> Result<()> {
        self.expects
            .lock()
            .unwrap()
            .push((server.id.clone(), match_id.clone(), uuids.to_vec()));
        if *self.fail_expects.lock().unwrap() {
            return Err(MatchmakingError::NotifyFailed {
                server_id: server.id.clone(),
                message: "connection reset".to_string(),
            }
            .into());
        }
        Ok(())
    }

    async fn send_transfer(&self, origin: &str, request: &TransferRequest) -> Result<()> {
        self.transfers
            .lock()
            .unwrap()
            .push((origin.to_string(), request.clone()));
        Ok(())
    }
}

/// Records relay route changes
#[derive(Debug, Default)]
pub struct RecordingRelay {
    routes: Mutex<Vec<(String, String)>>,
    deleted: Mutex<Vec<String>>,
}

impl RecordingRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<(String, String)> {
        self.routes.lock().unwrap().clone()
    }

    pub fn deleted(&self) -> Vec<String> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl RelayClient for RecordingRelay {
    async fn set_route(&self, player_ip: &str, backend: &str) -> Result<()> {
        self.routes
            .lock()
            .unwrap()
            .push((player_ip.to_string(), backend.to_string()));
        Ok(())
    }

    async fn delete_route(&self, player_ip: &str) -> Result<()> {
        self.deleted.lock().unwrap().push(player_ip.to_string());
        Ok(())
    }
}

/// Game server for `mode` with one match slot
pub fn game_server(id: &str, mode: &str, match_id: &str, need: usize) -> ServerInfo {
    let mut matches = BTreeMap::new();
    matches.insert(
        match_id.to_string(),
        MatchInfo {
            status: MatchStatus::Ready,
            need,
            players: vec![],
        },
    );
    ServerInfo {
        id: id.to_string(),
        server_type: Some(ServerType::Game),
        mode: Some(mode.to_string()),
        host: format!("{}.game.local", id),
        port: 7000,
        players: 0,
        max_players: need,
        matches,
    }
}

pub fn lobby_server(id: &str, players: usize, max_players: usize) -> ServerInfo {
    ServerInfo {
        id: id.to_string(),
        server_type: Some(ServerType::Lobby),
        mode: None,
        host: format!("{}.lobby.local", id),
        port: 6000,
        players,
        max_players,
        matches: BTreeMap::new(),
    }
}

/// Recording fakes wired into a full application state
pub struct TestSystem {
    pub app: AppState,
    pub registry: Arc<FakeRegistry>,
    pub notifier: Arc<RecordingNotifier>,
    pub relay: Arc<RecordingRelay>,
}

/// A free local port for tests that bind the HTTP server
pub fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("Failed to find a free port")
}

pub fn test_config(routing_mode: RoutingMode) -> AppConfig {
    let mut config = AppConfig::default();
    config.service.http_host = "127.0.0.1".to_string();
    config.matchmaking.routing_mode = routing_mode;
    config.matchmaking.tick_rate_ms = 20;
    config.relay.referral_host = "relay.local".to_string();
    config.relay.referral_port = 5520;
    config
}

pub fn create_test_system(config: AppConfig) -> TestSystem {
    let registry = Arc::new(FakeRegistry::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let relay = Arc::new(RecordingRelay::new());

    let app = AppState::with_collaborators(
        config,
        registry.clone(),
        notifier.clone(),
        Some(relay.clone() as Arc<dyn RelayClient>),
    )
    .expect("Failed to build test system");

    TestSystem {
        app,
        registry,
        notifier,
        relay,
    }
}
