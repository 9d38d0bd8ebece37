//! Main application state and service coordination
//!
//! This module contains the AppState that wires the stores, collaborator
//! clients, routing strategy and match engine together, and owns the
//! background tasks: the tick loop and the HTTP server.

use crate::clients::{HttpRelayClient, HttpServerNotifier, RelayClient, ServerNotifier};
use crate::config::AppConfig;
use crate::matcher::MatchEngine;
use crate::metrics::MetricsCollector;
use crate::players::PlayerRegistry;
use crate::queue::WaitQueueStore;
use crate::referrals::ReferralInbox;
use crate::registry::{HttpSessionRegistry, SessionRegistry};
use crate::routing::{DirectRouting, RelayRouting, RoutingMode, RoutingStrategy};
use crate::service::http::{router, ApiState};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Failed to bind {address}: {message}")]
    Bind { address: String, message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Shared state handed to the HTTP handlers
    api: ApiState,

    /// Cancels the tick loop and the HTTP server
    shutdown_token: CancellationToken,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,

    /// Address the HTTP server actually bound to
    local_addr: Option<SocketAddr>,
}

impl AppState {
    /// Initialize the application with HTTP collaborators from `config`
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing {} matchmaking service", config.service.name);
        info!(
            "Configuration: registry={}, routing={}, relay={}",
            config.registry.url,
            config.matchmaking.routing_mode,
            config.relay.url.as_deref().unwrap_or("none")
        );

        let timeout = config.request_timeout();
        let init_error = |e: anyhow::Error| ServiceError::Initialization {
            message: e.to_string(),
        };

        let registry: Arc<dyn SessionRegistry> = Arc::new(
            HttpSessionRegistry::new(config.registry.url.clone(), timeout).map_err(init_error)?,
        );
        let notifier: Arc<dyn ServerNotifier> =
            Arc::new(HttpServerNotifier::new(timeout).map_err(init_error)?);
        let relay: Option<Arc<dyn RelayClient>> = match &config.relay.url {
            Some(url) => Some(Arc::new(
                HttpRelayClient::new(url.clone(), timeout).map_err(init_error)?,
            )),
            None => None,
        };

        Self::with_collaborators(config, registry, notifier, relay)
    }

    /// Initialize the application around already-built collaborators
    pub fn with_collaborators(
        config: AppConfig,
        registry: Arc<dyn SessionRegistry>,
        notifier: Arc<dyn ServerNotifier>,
        relay: Option<Arc<dyn RelayClient>>,
    ) -> Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics = Arc::new(
            MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                message: format!("Failed to create metrics collector: {}", e),
            })?,
        );

        let queues = Arc::new(WaitQueueStore::new());
        let players = Arc::new(PlayerRegistry::new());
        let referrals = Arc::new(ReferralInbox::new());

        let routing: Arc<dyn RoutingStrategy> = match config.matchmaking.routing_mode {
            RoutingMode::Relay => {
                if relay.is_none() {
                    warn!("Relay routing without a relay URL: only referrals will be queued");
                }
                Arc::new(RelayRouting::new(
                    relay.clone(),
                    players.clone(),
                    referrals.clone(),
                    config.relay.referral_host.clone(),
                    config.relay.referral_port,
                ))
            }
            RoutingMode::Direct => Arc::new(DirectRouting::new(notifier.clone(), players.clone())),
        };

        let engine = MatchEngine::new(
            queues.clone(),
            registry,
            notifier,
            routing,
            metrics.clone(),
            config.engine_config(),
        );

        let api = ApiState {
            queues,
            players,
            referrals,
            engine,
            relay,
            metrics,
            service_name: config.service.name.clone(),
            is_running: Arc::new(RwLock::new(false)),
        };

        Ok(Self {
            config,
            api,
            shutdown_token: CancellationToken::new(),
            background_tasks: Vec::new(),
            local_addr: None,
        })
    }

    /// Bind the HTTP API and start the tick loop
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {} matchmaking service", self.config.service.name);

        let address = self.config.bind_address();
        let listener = TcpListener::bind(&address)
            .await
            .map_err(|e| ServiceError::Bind {
                address: address.clone(),
                message: e.to_string(),
            })?;
        let local_addr = listener.local_addr().map_err(|e| ServiceError::Bind {
            address: address.clone(),
            message: e.to_string(),
        })?;
        self.local_addr = Some(local_addr);

        *self.api.is_running.write().await = true;

        let app = router(self.api.clone());
        let server_token = self.shutdown_token.clone();
        let server_task = tokio::spawn(async move {
            info!("HTTP API listening on http://{}", local_addr);
            let served = axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    server_token.cancelled().await;
                    info!("HTTP server shutdown signal received");
                })
                .await;
            if let Err(e) = served {
                error!("HTTP server failed: {}", e);
            }
            info!("HTTP server stopped");
        });
        self.background_tasks.push(server_task);

        let engine_task = self.api.engine.spawn(self.shutdown_token.child_token());
        self.background_tasks.push(engine_task);

        info!("✅ {} started", self.config.service.name);
        Ok(())
    }

    /// Stop accepting requests and let the in-flight tick finish
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);

        *self.api.is_running.write().await = false;
        self.shutdown_token.cancel();

        let task_count = self.background_tasks.len();
        let mut failures = 0;
        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Waiting for background task {}/{}", i + 1, task_count);
            if let Err(e) = task.await {
                warn!("Background task ended abnormally: {}", e);
                failures += 1;
            }
        }

        let final_stats = self.api.engine.stats();
        info!("Final engine statistics: {:?}", final_stats);

        if failures > 0 {
            return Err(ServiceError::BackgroundTask {
                message: format!("{} of {} tasks failed", failures, task_count),
            });
        }

        info!("✅ {} shutdown completed", self.config.service.name);
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Shared handler state
    pub fn api(&self) -> &ApiState {
        &self.api
    }

    pub fn engine(&self) -> &MatchEngine {
        &self.api.engine
    }

    /// Address the HTTP API is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.api.is_running.read().await
    }
}
