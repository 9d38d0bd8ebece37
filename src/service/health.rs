//! Health check reporting
//!
//! Liveness of the service plus a snapshot of queue, player, referral and
//! engine counters, served at `/health`.

use crate::service::http::ApiState;
use serde::{Deserialize, Serialize};

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy
    pub message: Option<String>,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Players waiting across all modes
    pub players_waiting: usize,
    /// Modes with a queue
    pub modes: usize,
    /// Player locations being tracked
    pub tracked_players: usize,
    /// Distinct servers holding tracked players
    pub occupied_servers: usize,
    /// Referrals not yet polled
    pub pending_referrals: usize,
    pub ticks: u64,
    pub matches_made: u64,
    pub players_matched: u64,
    pub registry_errors: u64,
}

impl HealthCheck {
    /// Snapshot the health of the running service
    pub async fn check(state: &ApiState) -> Self {
        let mut checks = Vec::new();

        let running = *state.is_running.read().await;
        checks.push(ComponentCheck {
            name: "service_running".to_string(),
            status: if running {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            message: (!running).then(|| "Service is not running".to_string()),
        });

        let engine_stats = state.engine.stats();
        // Every tick so far hit at least one registry failure.
        let registry_failing =
            engine_stats.ticks > 0 && engine_stats.registry_errors >= engine_stats.ticks;
        let engine_check = if registry_failing {
            ComponentCheck {
                name: "session_registry".to_string(),
                status: HealthStatus::Degraded,
                message: Some(format!(
                    "{} registry errors over {} ticks",
                    engine_stats.registry_errors, engine_stats.ticks
                )),
            }
        } else {
            ComponentCheck {
                name: "session_registry".to_string(),
                status: HealthStatus::Healthy,
                message: None,
            }
        };
        checks.push(engine_check);

        let status = checks
            .iter()
            .map(|check| check.status)
            .fold(HealthStatus::Healthy, worst);

        let stats = ServiceStats {
            players_waiting: state.queues.total_waiting(),
            modes: state.queues.modes().len(),
            tracked_players: state.players.len(),
            occupied_servers: state.players.servers().len(),
            pending_referrals: state.referrals.total_pending(),
            ticks: engine_stats.ticks,
            matches_made: engine_stats.matches_made,
            players_matched: engine_stats.players_matched,
            registry_errors: engine_stats.registry_errors,
        };

        HealthCheck {
            status,
            service: state.service_name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks,
            stats,
        }
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

fn worst(a: HealthStatus, b: HealthStatus) -> HealthStatus {
    match (a, b) {
        (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
        (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
        _ => HealthStatus::Healthy,
    }
}
