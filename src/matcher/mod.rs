//! Tick-driven match engine

pub mod engine;

pub use engine::{EngineConfig, EngineStats, MatchCompleteSummary, MatchEngine, MatchOutcome};
