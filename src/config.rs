//! Environment-sourced configuration.
//!
//! Two concerns live here:
//!
//! - the admission gate's concurrency ceiling, read from
//!   [`MAX_CONCURRENT_ENV_VAR`] with a fallback of
//!   [`DEFAULT_MAX_CONCURRENT`] when the variable is absent or invalid;
//! - per-provider API keys, read from the conventional environment
//!   variables. A missing key is not a startup error; the provider
//!   fails hard on first use instead.

use crate::types::Provider;
use crate::{MimirError, Result};

/// Default ceiling for concurrently admitted tasks.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

/// Environment variable overriding the admission ceiling.
pub const MAX_CONCURRENT_ENV_VAR: &str = "MIMIR_MAX_CONCURRENT";

/// Provider → environment variable name mapping.
const PROVIDER_ENV_VARS: &[(Provider, &str)] = &[
    (Provider::OpenRouter, "OPENROUTER_API_KEY"),
    (Provider::Anthropic, "ANTHROPIC_API_KEY"),
    (Provider::OpenAi, "OPENAI_API_KEY"),
    (Provider::Google, "GOOGLE_API_KEY"),
];

/// Read the admission ceiling from the environment.
///
/// Absent, empty, non-numeric, or zero values fall back to
/// [`DEFAULT_MAX_CONCURRENT`].
pub fn max_concurrent_from_env() -> usize {
    parse_max_concurrent(std::env::var(MAX_CONCURRENT_ENV_VAR).ok().as_deref())
}

fn parse_max_concurrent(raw: Option<&str>) -> usize {
    raw.and_then(|s| s.trim().parse::<usize>().ok())
        .filter(|&n| n >= 1)
        .unwrap_or(DEFAULT_MAX_CONCURRENT)
}

/// Look up the API key for a provider in the environment.
pub fn api_key(provider: Provider) -> Option<String> {
    PROVIDER_ENV_VARS
        .iter()
        .find(|(p, _)| *p == provider)
        .and_then(|(_, var)| std::env::var(var).ok())
        .filter(|key| !key.is_empty())
}

/// Like [`api_key`], but a missing key is a hard error.
///
/// Provider implementations call this on first use, so an unconfigured
/// provider degrades to a per-request failure rather than a crash.
pub fn require_api_key(provider: Provider) -> Result<String> {
    api_key(provider).ok_or(MimirError::MissingCredentials { provider })
}
