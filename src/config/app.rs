//! Main application configuration
//!
//! This module defines the configuration structures for the waypoint
//! matchmaking service, including environment variable loading, TOML file
//! loading and validation.

use crate::matcher::EngineConfig;
use crate::routing::RoutingMode;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Longest accepted queue timeout: one week
pub const MAX_QUEUE_TIMEOUT_SECONDS: u64 = 7 * 24 * 60 * 60;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub registry: RegistrySettings,
    pub matchmaking: MatchmakingSettings,
    pub relay: RelaySettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Address the HTTP API binds to
    pub http_host: String,
    /// Port for the HTTP API, health and metrics
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Session registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Base URL of the session registry
    pub url: String,
    /// Timeout for every outbound request (registry, servers, relay)
    pub request_timeout_ms: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Interval between matcher ticks
    pub tick_rate_ms: u64,
    /// Drop players who waited longer than this; 0 disables expiry
    pub queue_timeout_seconds: u64,
    /// How matched players are moved
    pub routing_mode: RoutingMode,
}

/// Relay settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelaySettings {
    /// Relay route API; without it referrals are still queued
    pub url: Option<String>,
    /// Host handed out in referrals
    pub referral_host: String,
    /// Port handed out in referrals
    pub referral_port: u16,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "waypoint".to_string(),
            log_level: "info".to_string(),
            http_host: "0.0.0.0".to_string(),
            http_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            url: "http://localhost:3000".to_string(),
            request_timeout_ms: 5000,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            tick_rate_ms: 500,
            queue_timeout_seconds: 300, // 5 minutes
            routing_mode: RoutingMode::Relay,
        }
    }
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            url: None,
            referral_host: "localhost".to_string(),
            referral_port: 5520,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", name, value))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration from a TOML file; missing keys take defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        validate_config(&config)?;
        Ok(config)
    }

    /// Build a config from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Service settings
        if let Some(name) = lookup("SERVICE_NAME") {
            config.service.name = name;
        }
        if let Some(log_level) = lookup("LOG_LEVEL") {
            config.service.log_level = log_level;
        }
        if let Some(host) = lookup("HTTP_HOST") {
            config.service.http_host = host;
        }
        if let Some(port) = lookup("HTTP_PORT") {
            config.service.http_port = parse_var("HTTP_PORT", &port)?;
        }
        if let Some(timeout) = lookup("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", &timeout)?;
        }

        // Registry settings
        if let Some(url) = lookup("REGISTRY_URL") {
            config.registry.url = url;
        }
        if let Some(timeout) = lookup("REQUEST_TIMEOUT_MS") {
            config.registry.request_timeout_ms = parse_var("REQUEST_TIMEOUT_MS", &timeout)?;
        }

        // Matchmaking settings
        if let Some(tick) = lookup("TICK_RATE_MS") {
            config.matchmaking.tick_rate_ms = parse_var("TICK_RATE_MS", &tick)?;
        }
        if let Some(timeout) = lookup("QUEUE_TIMEOUT_SECONDS") {
            config.matchmaking.queue_timeout_seconds =
                parse_var("QUEUE_TIMEOUT_SECONDS", &timeout)?;
        }
        if let Some(mode) = lookup("ROUTING_MODE") {
            config.matchmaking.routing_mode = mode.parse()?;
        }

        // Relay settings
        if let Some(url) = lookup("RELAY_URL") {
            config.relay.url = (!url.is_empty()).then_some(url);
        }
        if let Some(host) = lookup("RELAY_HOST") {
            config.relay.referral_host = host;
        }
        if let Some(port) = lookup("RELAY_PORT") {
            config.relay.referral_port = parse_var("RELAY_PORT", &port)?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get outbound request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.registry.request_timeout_ms)
    }

    /// Get tick interval as Duration
    pub fn tick_rate(&self) -> Duration {
        Duration::from_millis(self.matchmaking.tick_rate_ms)
    }

    /// Queue timeout, or `None` when expiry is disabled
    pub fn queue_timeout(&self) -> Option<Duration> {
        match self.matchmaking.queue_timeout_seconds {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tick_rate: self.tick_rate(),
            queue_timeout: self.queue_timeout(),
        }
    }

    /// `host:port` the HTTP API binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.http_host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.relay.referral_port == 0 {
        return Err(anyhow!("Referral port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.registry.request_timeout_ms == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }
    if config.matchmaking.tick_rate_ms == 0 {
        return Err(anyhow!("Tick rate must be greater than 0"));
    }
    if config.matchmaking.queue_timeout_seconds > MAX_QUEUE_TIMEOUT_SECONDS {
        return Err(anyhow!(
            "Queue timeout cannot exceed {} seconds",
            MAX_QUEUE_TIMEOUT_SECONDS
        ));
    }

    // Validate collaborators
    if config.registry.url.is_empty() {
        return Err(anyhow!("Registry URL cannot be empty"));
    }
    if config.relay.referral_host.is_empty() {
        return Err(anyhow!("Referral host cannot be empty"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        validate_config(&config).unwrap();

        assert_eq!(config.tick_rate(), Duration::from_millis(500));
        assert_eq!(config.queue_timeout(), Some(Duration::from_secs(300)));
        assert_eq!(config.relay.referral_port, 5520);
        assert_eq!(config.matchmaking.routing_mode, RoutingMode::Relay);
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("REGISTRY_URL", "http://registry:3000"),
            ("TICK_RATE_MS", "250"),
            ("QUEUE_TIMEOUT_SECONDS", "0"),
            ("ROUTING_MODE", "direct"),
            ("RELAY_URL", "http://relay:9000"),
            ("RELAY_PORT", "6000"),
        ]))
        .unwrap();

        assert_eq!(config.registry.url, "http://registry:3000");
        assert_eq!(config.tick_rate(), Duration::from_millis(250));
        assert_eq!(config.queue_timeout(), None);
        assert_eq!(config.matchmaking.routing_mode, RoutingMode::Direct);
        assert_eq!(config.relay.url.as_deref(), Some("http://relay:9000"));
        assert_eq!(config.relay.referral_port, 6000);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = AppConfig::from_lookup(lookup(&[("HTTP_PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("HTTP_PORT"));

        assert!(AppConfig::from_lookup(lookup(&[("TICK_RATE_MS", "0")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("ROUTING_MODE", "both")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("LOG_LEVEL", "loud")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[("REGISTRY_URL", "")])).is_err());
    }

    #[test]
    fn test_queue_timeout_upper_bound() {
        let mut config = AppConfig::default();
        config.matchmaking.queue_timeout_seconds = MAX_QUEUE_TIMEOUT_SECONDS;
        validate_config(&config).unwrap();

        config.matchmaking.queue_timeout_seconds = 10_000_000_000_000;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("Queue timeout"));

        assert!(AppConfig::from_lookup(lookup(&[(
            "QUEUE_TIMEOUT_SECONDS",
            "10000000000000"
        )]))
        .is_err());
    }

    #[test]
    fn test_empty_relay_url_means_none() {
        let config = AppConfig::from_lookup(lookup(&[("RELAY_URL", "")])).unwrap();
        assert!(config.relay.url.is_none());
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [matchmaking]
            tick_rate_ms = 100
            routing_mode = "direct"

            [relay]
            url = "http://relay:9000"
            "#,
        )
        .unwrap();

        assert_eq!(config.matchmaking.tick_rate_ms, 100);
        assert_eq!(config.matchmaking.queue_timeout_seconds, 300);
        assert_eq!(config.matchmaking.routing_mode, RoutingMode::Direct);
        assert_eq!(config.service.http_port, 8080);
        validate_config(&config).unwrap();
    }

    #[test]
    fn test_from_file_missing() {
        let err = AppConfig::from_file(Path::new("/nonexistent/waypoint.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
