//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the queue store and the
//! match engine using Prometheus metrics.

use crate::types::Mode;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Wait queue metrics
    queue_metrics: QueueMetrics,

    /// Match engine metrics
    matcher_metrics: MatcherMetrics,
}

/// Wait queue metrics
#[derive(Clone)]
pub struct QueueMetrics {
    /// Total queue joins by mode
    pub joins_total: IntCounterVec,

    /// Total explicit queue leaves by mode
    pub leaves_total: IntCounterVec,

    /// Players currently waiting by mode
    pub players_waiting: IntGaugeVec,

    /// Players dropped for waiting past the queue timeout
    pub players_expired_total: IntCounterVec,
}

/// Match engine metrics
#[derive(Clone)]
pub struct MatcherMetrics {
    /// Total ticks run
    pub ticks_total: IntCounter,

    /// Matches filled by mode
    pub matches_total: IntCounterVec,

    /// Players dispatched into matches by mode
    pub players_matched_total: IntCounterVec,

    /// Failed collaborator calls by error kind
    pub collaborator_errors_total: IntCounterVec,

    /// Wall time of one tick
    pub tick_duration: Histogram,

    /// Tracked player locations
    pub tracked_players: IntGauge,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let queue_metrics = QueueMetrics::new(&registry)?;
        let matcher_metrics = MatcherMetrics::new(&registry)?;

        Ok(Self {
            registry,
            queue_metrics,
            matcher_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn queue(&self) -> &QueueMetrics {
        &self.queue_metrics
    }

    pub fn matcher(&self) -> &MatcherMetrics {
        &self.matcher_metrics
    }

    pub fn record_join(&self, mode: &str) {
        self.queue_metrics
            .joins_total
            .with_label_values(&[mode])
            .inc();
    }

    pub fn record_leave(&self, mode: &str) {
        self.queue_metrics
            .leaves_total
            .with_label_values(&[mode])
            .inc();
    }

    pub fn record_expired(&self, mode: &str) {
        self.queue_metrics
            .players_expired_total
            .with_label_values(&[mode])
            .inc();
    }

    /// Overwrite the waiting gauges from a size snapshot
    pub fn update_queue_sizes(&self, sizes: &[(Mode, usize)]) {
        for (mode, size) in sizes {
            self.queue_metrics
                .players_waiting
                .with_label_values(&[mode.as_str()])
                .set(*size as i64);
        }
    }

    pub fn update_tracked_players(&self, count: usize) {
        self.matcher_metrics.tracked_players.set(count as i64);
    }

    pub fn record_tick(&self, duration: Duration) {
        self.matcher_metrics.ticks_total.inc();
        self.matcher_metrics
            .tick_duration
            .observe(duration.as_secs_f64());
    }

    pub fn record_match(&self, mode: &str, players: usize) {
        self.matcher_metrics
            .matches_total
            .with_label_values(&[mode])
            .inc();
        self.matcher_metrics
            .players_matched_total
            .with_label_values(&[mode])
            .inc_by(players as u64);
    }

    pub fn record_collaborator_error(&self, kind: &str) {
        self.matcher_metrics
            .collaborator_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Render the registry in Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let metric_families = self.registry.gather();
        Ok(TextEncoder::new().encode_to_string(&metric_families)?)
    }
}

impl QueueMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let joins_total = IntCounterVec::new(
            Opts::new("waypoint_queue_joins_total", "Total queue joins"),
            &["mode"],
        )?;
        registry.register(Box::new(joins_total.clone()))?;

        let leaves_total = IntCounterVec::new(
            Opts::new("waypoint_queue_leaves_total", "Total explicit queue leaves"),
            &["mode"],
        )?;
        registry.register(Box::new(leaves_total.clone()))?;

        let players_waiting = IntGaugeVec::new(
            Opts::new("waypoint_players_waiting", "Players currently waiting"),
            &["mode"],
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let players_expired_total = IntCounterVec::new(
            Opts::new(
                "waypoint_players_expired_total",
                "Players removed after waiting past the queue timeout",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_expired_total.clone()))?;

        Ok(Self {
            joins_total,
            leaves_total,
            players_waiting,
            players_expired_total,
        })
    }
}

impl MatcherMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let ticks_total = IntCounter::new("waypoint_ticks_total", "Total matcher ticks")?;
        registry.register(Box::new(ticks_total.clone()))?;

        let matches_total = IntCounterVec::new(
            Opts::new("waypoint_matches_total", "Matches filled"),
            &["mode"],
        )?;
        registry.register(Box::new(matches_total.clone()))?;

        let players_matched_total = IntCounterVec::new(
            Opts::new(
                "waypoint_players_matched_total",
                "Players dispatched into matches",
            ),
            &["mode"],
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        let collaborator_errors_total = IntCounterVec::new(
            Opts::new(
                "waypoint_collaborator_errors_total",
                "Failed calls to external collaborators",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(collaborator_errors_total.clone()))?;

        let tick_duration = Histogram::with_opts(
            HistogramOpts::new("waypoint_tick_duration_seconds", "Matcher tick duration")
                .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
        )?;
        registry.register(Box::new(tick_duration.clone()))?;

        let tracked_players =
            IntGauge::new("waypoint_tracked_players", "Player locations being tracked")?;
        registry.register(Box::new(tracked_players.clone()))?;

        Ok(Self {
            ticks_total,
            matches_total,
            players_matched_total,
            collaborator_errors_total,
            tick_duration,
            tracked_players,
        })
    }
}
