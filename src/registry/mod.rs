//! Session registry integration
//!
//! Queries for ready matches and lobby capacity, and match status updates.

pub mod client;

pub use client::{HttpSessionRegistry, ServerQuery, SessionRegistry};
