//! Utility functions for the matchmaking service

use chrono::{DateTime, Utc};
use std::sync::{LockResult, PoisonError};

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Join a host and port into the `host:port` form used for routing
pub fn format_backend(host: &str, port: u16) -> String {
    format!("{}:{}", host, port)
}

/// Take a lock guard even if a previous holder panicked.
///
/// Store state is plain data; a panic mid-operation cannot leave it
/// half-written in a way later readers would misinterpret.
pub fn recover<G>(result: LockResult<G>) -> G {
    result.unwrap_or_else(PoisonError::into_inner)
}
