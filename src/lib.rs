//! Waypoint - FIFO matchmaking and player routing service
//!
//! This crate keeps per-mode wait queues, tracks where players are
//! connected, and on every tick fills ready matches advertised by a session
//! registry, routing matched players through a relay or by direct transfer.

pub mod clients;
pub mod config;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod players;
pub mod queue;
pub mod referrals;
pub mod registry;
pub mod routing;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use clients::{RelayClient, ServerNotifier};
pub use matcher::{EngineConfig, MatchEngine, MatchOutcome};
pub use players::PlayerRegistry;
pub use queue::WaitQueueStore;
pub use referrals::ReferralInbox;
pub use registry::SessionRegistry;
pub use routing::{RoutingMode, RoutingStrategy};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
