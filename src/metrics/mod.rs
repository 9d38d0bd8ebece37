//! Metrics and monitoring for the matchmaking service
//!
//! Prometheus counters and gauges for queues and the match engine, served
//! by the HTTP surface at `/metrics`.

pub mod collector;

pub use collector::{MatcherMetrics, MetricsCollector, QueueMetrics};
