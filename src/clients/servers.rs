//! Notifications pushed to game and lobby servers

use crate::clients::build_http_client;
use crate::error::{MatchmakingError, Result};
use crate::types::{ExpectRequest, MatchId, PlayerId, ServerInfo, TransferRequest};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, instrument};

/// Pushes match and transfer notices to servers
#[async_trait]
pub trait ServerNotifier: Send + Sync {
    /// Tell a game server which players to expect for a match
    async fn send_expect(
        &self,
        server: &ServerInfo,
        match_id: &MatchId,
        uuids: &[PlayerId],
    ) -> Result<()>;

    /// Ask the server at `origin` (`host:port`) to move a player
    async fn send_transfer(&self, origin: &str, request: &TransferRequest) -> Result<()>;
}

/// Plain HTTP notifier: `POST /expect` and `POST /transfer` on the target
#[derive(Clone)]
pub struct HttpServerNotifier {
    client: Client,
}

impl HttpServerNotifier {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_http_client(timeout)?,
        })
    }
}

#[async_trait]
impl ServerNotifier for HttpServerNotifier {
    #[instrument(skip(self, server, uuids), fields(server_id = %server.id))]
    async fn send_expect(
        &self,
        server: &ServerInfo,
        match_id: &MatchId,
        uuids: &[PlayerId],
    ) -> Result<()> {
        let url = format!("http://{}/expect", server.backend());
        let request = ExpectRequest {
            match_id: match_id.clone(),
            uuids: uuids.to_vec(),
        };

        let notify_failed = |e: reqwest::Error| MatchmakingError::NotifyFailed {
            server_id: server.id.clone(),
            message: e.to_string(),
        };

        self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(notify_failed)?
            .error_for_status()
            .map_err(notify_failed)?;

        debug!("Sent expect to {} for match {}", server.id, match_id);
        Ok(())
    }

    #[instrument(skip(self, request), fields(player = %request.uuid))]
    async fn send_transfer(&self, origin: &str, request: &TransferRequest) -> Result<()> {
        let url = format!("http://{}/transfer", origin);

        let transfer_failed = |e: reqwest::Error| MatchmakingError::TransferFailed {
            player_id: request.uuid.clone(),
            origin: origin.to_string(),
            message: e.to_string(),
        };

        self.client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(transfer_failed)?
            .error_for_status()
            .map_err(transfer_failed)?;

        debug!("Sent transfer for {} via {}", request.uuid, origin);
        Ok(())
    }
}
