//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Opaque player identity, stable across a session
pub type PlayerId = String;

/// Identifier of a game or lobby server as known to the session registry
pub type ServerId = String;

/// Identifier of a match slot on a game server
pub type MatchId = String;

/// Name of a matchable game mode; each mode has its own wait queue
pub type Mode = String;

/// A player waiting in a mode queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub uuid: PlayerId,
    /// Lobby/origin server the player queued from
    pub lobby_server: String,
    pub joined_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(uuid: impl Into<PlayerId>, lobby_server: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            lobby_server: lobby_server.into(),
            joined_at: Utc::now(),
        }
    }
}

/// Where a player currently is on the network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLocation {
    pub uuid: PlayerId,
    pub ip: String,
    pub server_id: ServerId,
}

/// Deferred routing instruction left for an origin server to poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
    pub player_uuid: PlayerId,
    pub host: String,
    pub port: u16,
}

/// Match slot status as tracked by the session registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Ready,
    Busy,
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchStatus::Ready => write!(f, "ready"),
            MatchStatus::Busy => write!(f, "busy"),
        }
    }
}

/// State of one match slot on a game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchInfo {
    pub status: MatchStatus,
    /// Number of players the match needs
    pub need: usize,
    #[serde(default)]
    pub players: Vec<PlayerId>,
}

/// Kind of server the registry tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerType {
    Game,
    Lobby,
}

impl std::fmt::Display for ServerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerType::Game => write!(f, "game"),
            ServerType::Lobby => write!(f, "lobby"),
        }
    }
}

/// Session descriptor as returned by the registry. Not owned or cached here.
///
/// Matches are kept in a `BTreeMap` so "first ready match" is deterministic
/// (ordered by match id) within one server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerInfo {
    pub id: ServerId,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub server_type: Option<ServerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub players: usize,
    /// 0 means unbounded
    #[serde(default)]
    pub max_players: usize,
    #[serde(default)]
    pub matches: BTreeMap<MatchId, MatchInfo>,
}

impl ServerInfo {
    /// `host:port` backend string for routing
    pub fn backend(&self) -> String {
        crate::utils::format_backend(&self.host, self.port)
    }

    /// First match slot marked ready that needs at least one player, in
    /// match id order
    pub fn first_ready_match(&self) -> Option<(&MatchId, &MatchInfo)> {
        self.matches
            .iter()
            .find(|(_, info)| info.status == MatchStatus::Ready && info.need > 0)
    }
}

/// "Expect these players for this match", sent to a game server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectRequest {
    pub match_id: MatchId,
    pub uuids: Vec<PlayerId>,
}

/// "Move this player to target", sent to a lobby/origin server in direct mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub uuid: PlayerId,
    /// `host:port`
    pub target: String,
    #[serde(default)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// What a game server wants done with a player once its match ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerDisposition {
    Lobby,
    Requeue,
}

/// One player's line in a match-complete report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchCompletePlayer {
    pub uuid: PlayerId,
    pub action: PlayerDisposition,
    /// Mode to requeue into; requeue is not possible without it
    #[serde(default)]
    pub mode: Option<Mode>,
}

/// Report from a game server after a match finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCompleteReport {
    pub server_id: ServerId,
    /// `host:port` of the reporting server, needed for direct-push transfers
    #[serde(default)]
    pub server_address: Option<String>,
    pub match_id: MatchId,
    pub players: Vec<MatchCompletePlayer>,
}
