//! Error types for the matchmaking service
//!
//! Stores report absence through `Option`/`bool`; only collaborator calls and
//! configuration loading produce errors. They are carried as `anyhow::Error`
//! with a typed `MatchmakingError` at the root where the cause is ours.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Session registry unavailable: {message}")]
    RegistryUnavailable { message: String },

    #[error("Malformed response from {source_name}: {message}")]
    MalformedResponse {
        source_name: String,
        message: String,
    },

    #[error("Expect notification to {server_id} failed: {message}")]
    NotifyFailed { server_id: String, message: String },

    #[error("Transfer of {player_id} via {origin} failed: {message}")]
    TransferFailed {
        player_id: String,
        origin: String,
        message: String,
    },

    #[error("Relay request failed: {message}")]
    RelayFailed { message: String },

    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: String },

    #[error("No lobby with capacity available")]
    NoLobbyAvailable,

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Short label used for the collaborator error metric
    pub fn kind(&self) -> &'static str {
        match self {
            MatchmakingError::RegistryUnavailable { .. } => "registry",
            MatchmakingError::MalformedResponse { .. } => "malformed",
            MatchmakingError::NotifyFailed { .. } => "notify",
            MatchmakingError::TransferFailed { .. } => "transfer",
            MatchmakingError::RelayFailed { .. } => "relay",
            MatchmakingError::InvalidRequest { .. } => "invalid_request",
            MatchmakingError::PlayerNotFound { .. } => "player_not_found",
            MatchmakingError::NoLobbyAvailable => "no_lobby",
            MatchmakingError::ConfigurationError { .. } => "configuration",
            MatchmakingError::InternalError { .. } => "internal",
        }
    }
}

/// Label for an arbitrary error, falling back to "other" when the root
/// cause is not one of ours (e.g. a transport error bubbling up through `?`)
pub fn error_kind(error: &anyhow::Error) -> &'static str {
    error
        .downcast_ref::<MatchmakingError>()
        .map(MatchmakingError::kind)
        .unwrap_or("other")
}
