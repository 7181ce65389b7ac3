//! Completion response types.

use serde::{Deserialize, Serialize};

/// A completed text generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Generated text.
    pub text: String,

    /// Token usage information.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    /// Model reported by the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Token usage statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A response together with how it was obtained.
///
/// `cached` is `true` only when the response was served from a live
/// cache entry. Freshly computed responses and coalesced joins on an
/// in-flight computation report `false`.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved {
    pub response: CompletionResponse,
    pub cached: bool,
}
