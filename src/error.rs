//! Mimir error types

use crate::types::Provider;

/// Mimir error types.
///
/// The enum is `Clone` so a single upstream failure can be handed
/// verbatim to every caller joined on the same in-flight computation.
#[derive(Debug, Clone, thiserror::Error)]
pub enum MimirError {
    // Provider/network errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("rate limited by provider")]
    RateLimited,

    #[error("authentication failed")]
    AuthenticationFailed,

    /// No API key configured for the provider. Surfaces on first use of
    /// the provider rather than at startup.
    #[error("no credentials configured for provider '{provider}'")]
    MissingCredentials { provider: Provider },

    // Admission errors
    /// The admission gate is full. Recoverable: retry or back off.
    #[error("capacity exceeded: {capacity} concurrent tasks already admitted")]
    CapacityExceeded { capacity: usize },

    // Configuration errors
    #[error("no provider configured")]
    NoProvider,

    #[error("unknown provider: {0}")]
    UnknownProvider(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    // Upstream error that fits no other variant
    #[error("upstream error: {0}")]
    Upstream(String),
}

/// Result type alias for Mimir operations
pub type Result<T> = std::result::Result<T, MimirError>;
