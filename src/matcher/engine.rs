//! Match engine: the tick loop that fills ready matches from wait queues
//!
//! Each tick walks every known mode in order. For a mode it asks the session
//! registry for a ready match, pops exactly the number of players the match
//! needs, tells the game server to expect them, routes each one, and marks
//! the match busy. Every collaborator call is attempted once; failures are
//! logged and never stop the loop.

use crate::clients::ServerNotifier;
use crate::error::{error_kind, MatchmakingError, Result};
use crate::metrics::MetricsCollector;
use crate::queue::WaitQueueStore;
use crate::registry::{ServerQuery, SessionRegistry};
use crate::routing::{Destination, RoutedPlayer, RoutingStrategy};
use crate::types::{
    MatchCompleteReport, MatchId, MatchInfo, MatchStatus, Mode, PlayerDisposition, PlayerId,
    QueueEntry, ServerId, ServerInfo,
};
use crate::utils::{current_timestamp, recover};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Engine timing knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Interval between ticks
    pub tick_rate: Duration,
    /// Drop players who have waited longer than this; `None` keeps them forever
    pub queue_timeout: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: Duration::from_millis(500),
            queue_timeout: Some(Duration::from_secs(300)),
        }
    }
}

/// What happened to one mode during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Nobody waiting, the registry was not asked
    EmptyQueue,
    /// No server advertises a usable ready match
    NoReadyMatch,
    /// A ready match exists but the queue is too short
    NotEnoughPlayers { waiting: usize, needed: usize },
    /// The queue shrank between the size check and the pop
    QueueChanged,
    /// The registry could not be queried
    RegistryError,
    /// Players were popped and dispatched
    Matched {
        server_id: ServerId,
        match_id: MatchId,
        players: Vec<PlayerId>,
    },
}

/// Running totals for the engine
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    pub ticks: u64,
    pub matches_made: u64,
    pub players_matched: u64,
    pub players_expired: u64,
    pub registry_errors: u64,
    pub notify_failures: u64,
    pub route_failures: u64,
    pub status_update_failures: u64,
}

/// Result of processing one match-complete report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchCompleteSummary {
    /// Players routed to a lobby
    pub sent_to_lobby: Vec<PlayerId>,
    /// Players put back into a queue
    pub requeued: Vec<PlayerId>,
    /// Players left where they are
    pub skipped: Vec<PlayerId>,
}

/// The match engine
#[derive(Clone)]
pub struct MatchEngine {
    queues: Arc<WaitQueueStore>,
    registry: Arc<dyn SessionRegistry>,
    notifier: Arc<dyn ServerNotifier>,
    routing: Arc<dyn RoutingStrategy>,
    metrics: Arc<MetricsCollector>,
    config: EngineConfig,
    stats: Arc<RwLock<EngineStats>>,
}

impl MatchEngine {
    pub fn new(
        queues: Arc<WaitQueueStore>,
        registry: Arc<dyn SessionRegistry>,
        notifier: Arc<dyn ServerNotifier>,
        routing: Arc<dyn RoutingStrategy>,
        metrics: Arc<MetricsCollector>,
        config: EngineConfig,
    ) -> Self {
        Self {
            queues,
            registry,
            notifier,
            routing,
            metrics,
            config,
            stats: Arc::new(RwLock::new(EngineStats::default())),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> EngineStats {
        recover(self.stats.read()).clone()
    }

    /// Run ticks until `token` is cancelled.
    ///
    /// Cancellation is only observed between ticks, so a tick in flight
    /// always runs to completion.
    pub async fn run(&self, token: CancellationToken) {
        info!(
            "Match engine started: tick rate {:?}, routing {}",
            self.config.tick_rate,
            self.routing.mode()
        );

        let mut interval = tokio::time::interval(self.config.tick_rate);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick().await;
                }
                _ = token.cancelled() => {
                    info!("Match engine received shutdown signal");
                    break;
                }
            }
        }

        info!("Match engine stopped");
    }

    /// Spawn [`run`](Self::run) on the runtime
    pub fn spawn(&self, token: CancellationToken) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move { engine.run(token).await })
    }

    /// One pass over every mode, in sorted order
    pub async fn tick(&self) -> Vec<(Mode, MatchOutcome)> {
        let started = Instant::now();

        self.expire_stale_entries();

        let mut outcomes = Vec::new();
        for mode in self.queues.modes() {
            let outcome = self.try_match(&mode).await;
            outcomes.push((mode, outcome));
        }

        self.metrics.update_queue_sizes(&self.queues.sizes());
        self.metrics.record_tick(started.elapsed());
        recover(self.stats.write()).ticks += 1;

        outcomes
    }

    fn expire_stale_entries(&self) {
        let Some(timeout) = self.config.queue_timeout else {
            return;
        };
        let Ok(timeout) = chrono::Duration::from_std(timeout) else {
            return;
        };

        let Some(cutoff) = current_timestamp().checked_sub_signed(timeout) else {
            debug!("Queue timeout {:?} reaches before the calendar, nothing expires", timeout);
            return;
        };

        let expired = self.queues.remove_expired(cutoff);
        if expired.is_empty() {
            return;
        }

        for (mode, entry) in &expired {
            info!(
                "Queue timeout: {} removed from '{}' after waiting since {}",
                entry.uuid, mode, entry.joined_at
            );
            self.metrics.record_expired(mode);
        }
        recover(self.stats.write()).players_expired += expired.len() as u64;
    }

    /// Try to fill one ready match for `mode`
    #[instrument(skip(self))]
    pub async fn try_match(&self, mode: &str) -> MatchOutcome {
        let waiting = self.queues.size(mode);
        if waiting == 0 {
            return MatchOutcome::EmptyQueue;
        }

        let (server, match_id, needed) = match self.find_ready_match(mode).await {
            Ok(Some(found)) => found,
            Ok(None) => return MatchOutcome::NoReadyMatch,
            Err(e) => {
                warn!("Registry query for '{}' failed: {}", mode, e);
                self.record_failure(&e);
                recover(self.stats.write()).registry_errors += 1;
                return MatchOutcome::RegistryError;
            }
        };

        if waiting < needed {
            debug!(
                "'{}' has {} waiting, {}/{} needs {}",
                mode, waiting, server.id, match_id, needed
            );
            return MatchOutcome::NotEnoughPlayers { waiting, needed };
        }

        let Some(entries) = self.queues.pop(mode, needed) else {
            return MatchOutcome::QueueChanged;
        };
        let uuids: Vec<PlayerId> = entries.iter().map(|entry| entry.uuid.clone()).collect();

        info!(
            "Matched {} players for '{}' on {}/{}",
            uuids.len(),
            mode,
            server.id,
            match_id
        );

        // Popped players stay popped whatever happens below.
        if let Err(e) = self.notifier.send_expect(&server, &match_id, &uuids).await {
            warn!("Failed to send expect to {}: {}", server.id, e);
            self.record_failure(&e);
            recover(self.stats.write()).notify_failures += 1;
        }

        let destination = Destination::for_match(&server, &match_id);
        for entry in &entries {
            self.route_entry(entry, &destination).await;
        }

        let busy = MatchInfo {
            status: MatchStatus::Busy,
            need: uuids.len(),
            players: uuids.clone(),
        };
        if let Err(e) = self.registry.update_match(&server.id, &match_id, &busy).await {
            error!(
                "Failed to mark {}/{} busy, it may be matched again: {}",
                server.id, match_id, e
            );
            self.record_failure(&e);
            recover(self.stats.write()).status_update_failures += 1;
        }

        self.metrics.record_match(mode, uuids.len());
        {
            let mut stats = recover(self.stats.write());
            stats.matches_made += 1;
            stats.players_matched += uuids.len() as u64;
        }

        MatchOutcome::Matched {
            server_id: server.id,
            match_id,
            players: uuids,
        }
    }

    async fn route_entry(&self, entry: &QueueEntry, destination: &Destination) {
        let player = RoutedPlayer {
            uuid: entry.uuid.clone(),
            origin: Some(entry.lobby_server.clone()),
        };

        if let Err(e) = self.routing.route(&player, destination).await {
            warn!("Failed to route {}: {}", entry.uuid, e);
            self.record_failure(&e);
            recover(self.stats.write()).route_failures += 1;
        }
    }

    /// First ready match on the first game server that has one.
    /// Slots that need no players are passed over.
    pub async fn find_ready_match(
        &self,
        mode: &str,
    ) -> Result<Option<(ServerInfo, MatchId, usize)>> {
        let servers = self
            .registry
            .find_servers(&ServerQuery::ready_game(mode))
            .await?;

        for server in servers {
            let ready = server
                .first_ready_match()
                .map(|(match_id, info)| (match_id.clone(), info.need));
            if let Some((match_id, need)) = ready {
                return Ok(Some((server, match_id, need)));
            }
        }

        Ok(None)
    }

    /// First lobby with spare capacity, in registry order
    pub async fn find_lobby(&self) -> Result<Option<ServerInfo>> {
        let servers = self
            .registry
            .find_servers(&ServerQuery::lobby_with_capacity())
            .await?;
        Ok(servers.into_iter().next())
    }

    /// Apply the post-match disposition of every player in `report`
    #[instrument(skip(self, report), fields(server_id = %report.server_id, match_id = %report.match_id))]
    pub async fn handle_match_complete(&self, report: &MatchCompleteReport) -> MatchCompleteSummary {
        let mut summary = MatchCompleteSummary::default();
        let origin = report
            .server_address
            .clone()
            .unwrap_or_else(|| report.server_id.clone());

        let lobby_bound: Vec<&PlayerId> = report
            .players
            .iter()
            .filter(|player| player.action == PlayerDisposition::Lobby)
            .map(|player| &player.uuid)
            .collect();

        if !lobby_bound.is_empty() {
            match self.find_lobby().await {
                Ok(Some(lobby)) => {
                    let destination = Destination::for_lobby(&lobby);
                    for uuid in lobby_bound {
                        let player = RoutedPlayer {
                            uuid: uuid.clone(),
                            origin: Some(origin.clone()),
                        };
                        match self.routing.route(&player, &destination).await {
                            Ok(()) => summary.sent_to_lobby.push(uuid.clone()),
                            Err(e) => {
                                warn!("Failed to route {} to lobby {}: {}", uuid, lobby.id, e);
                                self.record_failure(&e);
                                summary.skipped.push(uuid.clone());
                            }
                        }
                    }
                }
                Ok(None) => {
                    warn!(
                        "{} after match {}, {} players stay put",
                        MatchmakingError::NoLobbyAvailable,
                        report.match_id,
                        lobby_bound.len()
                    );
                    self.metrics
                        .record_collaborator_error(MatchmakingError::NoLobbyAvailable.kind());
                    summary.skipped.extend(lobby_bound.into_iter().cloned());
                }
                Err(e) => {
                    warn!("Lobby lookup failed: {}", e);
                    self.record_failure(&e);
                    summary.skipped.extend(lobby_bound.into_iter().cloned());
                }
            }
        }

        for player in &report.players {
            if player.action != PlayerDisposition::Requeue {
                continue;
            }
            match &player.mode {
                Some(mode) => {
                    let position = self
                        .queues
                        .join(mode, QueueEntry::new(player.uuid.clone(), origin.clone()));
                    self.metrics.record_join(mode);
                    debug!("Requeued {} into '{}' at {}", player.uuid, mode, position);
                    summary.requeued.push(player.uuid.clone());
                }
                None => {
                    warn!(
                        "Requeue without a mode is not supported, {} left alone",
                        player.uuid
                    );
                    summary.skipped.push(player.uuid.clone());
                }
            }
        }

        info!(
            "Match {} complete on {}: {} to lobby, {} requeued, {} skipped",
            report.match_id,
            report.server_id,
            summary.sent_to_lobby.len(),
            summary.requeued.len(),
            summary.skipped.len()
        );
        summary
    }

    fn record_failure(&self, e: &anyhow::Error) {
        self.metrics.record_collaborator_error(error_kind(e));
    }
}
