//! Upstream provider identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MimirError;

/// Identifier for a configured upstream text-generation provider.
///
/// The process-wide default (used when a request names no provider) is
/// held by [`CompletionService`](crate::service::CompletionService) and
/// settable at runtime via its provider-selection surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// OpenRouter (routes to many models, good default).
    #[default]
    OpenRouter,
    Anthropic,
    OpenAi,
    Google,
}

impl Provider {
    /// Stable string form, used for fingerprinting and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenRouter => "openrouter",
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
            Provider::Google => "google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = MimirError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "openrouter" => Ok(Provider::OpenRouter),
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            "google" => Ok(Provider::Google),
            other => Err(MimirError::UnknownProvider(other.to_string())),
        }
    }
}
