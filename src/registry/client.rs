//! Session registry collaborator
//!
//! The registry is the source of truth for which servers exist, their
//! capacity and their match slots. We query it every tick and write match
//! status back through it; nothing it returns is cached here.

use crate::clients::{build_http_client, endpoint};
use crate::error::{MatchmakingError, Result};
use crate::types::{MatchId, MatchInfo, Mode, ServerId, ServerInfo, ServerType};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Filter for a registry server listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerQuery {
    pub server_type: ServerType,
    pub mode: Option<Mode>,
    pub has_ready_match: bool,
    pub has_capacity: bool,
}

impl ServerQuery {
    /// Game servers of `mode` exposing at least one ready match
    pub fn ready_game(mode: &str) -> Self {
        Self {
            server_type: ServerType::Game,
            mode: Some(mode.to_string()),
            has_ready_match: true,
            has_capacity: false,
        }
    }

    /// Lobby servers with spare capacity
    pub fn lobby_with_capacity() -> Self {
        Self {
            server_type: ServerType::Lobby,
            mode: None,
            has_ready_match: false,
            has_capacity: true,
        }
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("type", self.server_type.to_string())];
        if let Some(mode) = &self.mode {
            params.push(("mode", mode.clone()));
        }
        if self.has_ready_match {
            params.push(("hasReadyMatch", "true".to_string()));
        }
        if self.has_capacity {
            params.push(("hasCapacity", "true".to_string()));
        }
        params
    }
}

/// Read/write-through access to the session registry
#[async_trait]
pub trait SessionRegistry: Send + Sync {
    /// List servers matching `query`, in registry order
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerInfo>>;

    /// Replace one match slot's state on a server
    async fn update_match(
        &self,
        server_id: &ServerId,
        match_id: &MatchId,
        info: &MatchInfo,
    ) -> Result<()>;
}

/// HTTP client for the registry's `/registry/servers` API
#[derive(Clone)]
pub struct HttpSessionRegistry {
    client: Client,
    base_url: String,
}

impl HttpSessionRegistry {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SessionRegistry for HttpSessionRegistry {
    #[instrument(skip(self), fields(server_type = %query.server_type))]
    async fn find_servers(&self, query: &ServerQuery) -> Result<Vec<ServerInfo>> {
        let url = endpoint(&self.base_url, &["registry", "servers"])?;

        let response = self
            .client
            .get(url)
            .query(&query.to_params())
            .send()
            .await
            .map_err(|e| {
                warn!("Registry query failed: {}", e);
                MatchmakingError::RegistryUnavailable {
                    message: e.to_string(),
                }
            })?
            .error_for_status()
            .map_err(|e| MatchmakingError::RegistryUnavailable {
                message: e.to_string(),
            })?;

        let servers: Vec<ServerInfo> =
            response
                .json()
                .await
                .map_err(|e| MatchmakingError::MalformedResponse {
                    source_name: "session registry".to_string(),
                    message: e.to_string(),
                })?;

        debug!("Registry returned {} servers", servers.len());
        Ok(servers)
    }

    #[instrument(skip(self, info), fields(status = %info.status))]
    async fn update_match(
        &self,
        server_id: &ServerId,
        match_id: &MatchId,
        info: &MatchInfo,
    ) -> Result<()> {
        let url = endpoint(
            &self.base_url,
            &["registry", "servers", server_id.as_str(), "matches", match_id.as_str()],
        )?;

        self.client
            .put(url)
            .json(info)
            .send()
            .await
            .map_err(|e| MatchmakingError::RegistryUnavailable {
                message: e.to_string(),
            })?
            .error_for_status()
            .map_err(|e| MatchmakingError::RegistryUnavailable {
                message: e.to_string(),
            })?;

        Ok(())
    }
}
