//! Outbound HTTP clients for game servers, lobby servers and the relay
//!
//! Every outbound call carries a bounded timeout and is attempted once.

pub mod relay;
pub mod servers;

pub use relay::{HttpRelayClient, RelayClient};
pub use servers::{HttpServerNotifier, ServerNotifier};

use crate::error::{MatchmakingError, Result};
use reqwest::{Client, Url};
use std::time::Duration;

/// Build a reqwest client with the shared request timeout
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    let client = Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
        .build()
        .map_err(|e| MatchmakingError::InternalError {
            message: format!("Failed to build HTTP client: {}", e),
        })?;

    Ok(client)
}

/// `base_url` with `segments` appended as percent-encoded path segments
pub fn endpoint(base_url: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base_url).map_err(|e| MatchmakingError::ConfigurationError {
        message: format!("Invalid base URL {}: {}", base_url, e),
    })?;

    url.path_segments_mut()
        .map_err(|_| MatchmakingError::ConfigurationError {
            message: format!("Base URL {} cannot carry a path", base_url),
        })?
        .pop_if_empty()
        .extend(segments);

    Ok(url)
}
