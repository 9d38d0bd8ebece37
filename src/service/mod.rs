//! Service layer for the waypoint matchmaking service
//!
//! This module contains the application state, the HTTP API and health
//! reporting for the production service.

pub mod app;
pub mod health;
pub mod http;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
pub use http::{router, ApiState};
