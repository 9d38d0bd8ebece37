//! Central IP router ("relay") client
//!
//! The relay forwards a player's connection by source address, so moving a
//! player is just reprogramming the route for their IP.

use crate::clients::{build_http_client, endpoint};
use crate::error::{MatchmakingError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Serialize)]
struct SetRouteRequest<'a> {
    player_ip: &'a str,
    backend: &'a str,
}

/// Programs player routes on the relay
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RelayClient: Send + Sync {
    /// Route traffic from `player_ip` to `backend` (`host:port`)
    async fn set_route(&self, player_ip: &str, backend: &str) -> Result<()>;

    /// Forget the route for `player_ip`
    async fn delete_route(&self, player_ip: &str) -> Result<()>;
}

/// HTTP relay client: `POST /routes`, `DELETE /routes/{ip}`
#[derive(Clone)]
pub struct HttpRelayClient {
    client: Client,
    base_url: String,
}

impl HttpRelayClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

fn relay_failed(e: reqwest::Error) -> MatchmakingError {
    MatchmakingError::RelayFailed {
        message: e.to_string(),
    }
}

#[async_trait]
impl RelayClient for HttpRelayClient {
    #[instrument(skip(self))]
    async fn set_route(&self, player_ip: &str, backend: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &["routes"])?;

        self.client
            .post(url)
            .json(&SetRouteRequest { player_ip, backend })
            .send()
            .await
            .map_err(relay_failed)?
            .error_for_status()
            .map_err(relay_failed)?;

        debug!("Relay route {} -> {}", player_ip, backend);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_route(&self, player_ip: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &["routes", player_ip])?;

        self.client
            .delete(url)
            .send()
            .await
            .map_err(relay_failed)?
            .error_for_status()
            .map_err(relay_failed)?;

        debug!("Relay route for {} deleted", player_ip);
        Ok(())
    }
}
