//! Player routing strategies
//!
//! A deployment either steers players through the central relay and leaves
//! referrals for origin servers to poll, or pushes a transfer straight to
//! the player's origin server. Exactly one is chosen at startup; running
//! both would route every player twice.

use crate::clients::{RelayClient, ServerNotifier};
use crate::error::{MatchmakingError, Result};
use crate::players::PlayerRegistry;
use crate::referrals::ReferralInbox;
use crate::types::{MatchId, PlayerId, Referral, ServerId, ServerInfo, TransferRequest};
use crate::utils::format_backend;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Which routing strategy a deployment uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Relay route update plus a referral for the current server to poll
    #[default]
    Relay,
    /// Transfer notice pushed to the player's origin server
    Direct,
}

impl std::fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RoutingMode::Relay => write!(f, "relay"),
            RoutingMode::Direct => write!(f, "direct"),
        }
    }
}

impl FromStr for RoutingMode {
    type Err = MatchmakingError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "relay" => Ok(RoutingMode::Relay),
            "direct" => Ok(RoutingMode::Direct),
            other => Err(MatchmakingError::ConfigurationError {
                message: format!("Unknown routing mode: {}", other),
            }),
        }
    }
}

/// Where a player is being sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub server_id: ServerId,
    pub host: String,
    pub port: u16,
    /// Set when the destination is a match slot
    pub match_id: Option<MatchId>,
}

impl Destination {
    pub fn for_match(server: &ServerInfo, match_id: &MatchId) -> Self {
        Self {
            server_id: server.id.clone(),
            host: server.host.clone(),
            port: server.port,
            match_id: Some(match_id.clone()),
        }
    }

    pub fn for_lobby(server: &ServerInfo) -> Self {
        Self {
            server_id: server.id.clone(),
            host: server.host.clone(),
            port: server.port,
            match_id: None,
        }
    }

    pub fn backend(&self) -> String {
        format_backend(&self.host, self.port)
    }
}

/// The player being moved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedPlayer {
    pub uuid: PlayerId,
    /// `host:port` of the server the player is on now, for direct pushes
    pub origin: Option<String>,
}

/// Moves one player to a destination
#[async_trait]
pub trait RoutingStrategy: Send + Sync {
    async fn route(&self, player: &RoutedPlayer, destination: &Destination) -> Result<()>;

    fn mode(&self) -> RoutingMode;
}

/// Relay route plus referral
pub struct RelayRouting {
    relay: Option<Arc<dyn RelayClient>>,
    players: Arc<PlayerRegistry>,
    referrals: Arc<ReferralInbox>,
    referral_host: String,
    referral_port: u16,
}

impl RelayRouting {
    /// `relay` may be absent, in which case only referrals are queued
    pub fn new(
        relay: Option<Arc<dyn RelayClient>>,
        players: Arc<PlayerRegistry>,
        referrals: Arc<ReferralInbox>,
        referral_host: impl Into<String>,
        referral_port: u16,
    ) -> Self {
        Self {
            relay,
            players,
            referrals,
            referral_host: referral_host.into(),
            referral_port,
        }
    }
}

#[async_trait]
impl RoutingStrategy for RelayRouting {
    async fn route(&self, player: &RoutedPlayer, destination: &Destination) -> Result<()> {
        let location = self.players.get_by_uuid(&player.uuid).ok_or_else(|| {
            MatchmakingError::PlayerNotFound {
                player_id: player.uuid.clone(),
            }
        })?;

        let backend = destination.backend();

        if let Some(relay) = &self.relay {
            // A failed route update still leaves the referral; the player
            // reconnects through the relay and lands wherever it points.
            if let Err(e) = relay.set_route(&location.ip, &backend).await {
                warn!("Relay route update failed for {}: {}", player.uuid, e);
            }
        }

        self.referrals.add(
            &location.server_id,
            Referral {
                player_uuid: player.uuid.clone(),
                host: self.referral_host.clone(),
                port: self.referral_port,
            },
        );
        self.players
            .update_server(&player.uuid, &destination.server_id);

        info!(
            "Queued referral: {} on {} -> {}",
            player.uuid, location.server_id, backend
        );
        Ok(())
    }

    fn mode(&self) -> RoutingMode {
        RoutingMode::Relay
    }
}

/// Transfer pushed to the origin server
pub struct DirectRouting {
    notifier: Arc<dyn ServerNotifier>,
    players: Arc<PlayerRegistry>,
}

impl DirectRouting {
    pub fn new(notifier: Arc<dyn ServerNotifier>, players: Arc<PlayerRegistry>) -> Self {
        Self { notifier, players }
    }
}

#[async_trait]
impl RoutingStrategy for DirectRouting {
    async fn route(&self, player: &RoutedPlayer, destination: &Destination) -> Result<()> {
        let origin = player
            .origin
            .as_deref()
            .filter(|origin| !origin.is_empty())
            .ok_or_else(|| MatchmakingError::InvalidRequest {
                reason: format!("No origin server recorded for {}", player.uuid),
            })?;

        let mut payload = serde_json::Map::new();
        if let Some(match_id) = &destination.match_id {
            payload.insert("matchId".to_string(), match_id.clone().into());
        }
        payload.insert("serverId".to_string(), destination.server_id.clone().into());

        let request = TransferRequest {
            uuid: player.uuid.clone(),
            target: destination.backend(),
            payload,
        };

        self.notifier.send_transfer(origin, &request).await?;
        self.players
            .update_server(&player.uuid, &destination.server_id);

        debug!(
            "Transfer sent: {} via {} -> {}",
            player.uuid, origin, request.target
        );
        Ok(())
    }

    fn mode(&self) -> RoutingMode {
        RoutingMode::Direct
    }
}
