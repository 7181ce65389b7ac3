//! Completion request options (provider-agnostic).

use serde::{Deserialize, Serialize};

use super::Provider;

/// A request for a text completion.
///
/// Every field except `skip_cache` and `metadata` participates in the
/// cache fingerprint; see [`crate::cache::key`] for the exact rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The prompt to complete.
    pub prompt: String,

    /// Target provider. When `None`, the service's process-wide default
    /// provider is used.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<Provider>,

    /// Sampling temperature. Treated as 0.7 when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum number of tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Nucleus sampling threshold.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Sequences where generation should stop.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop_sequences: Vec<String>,

    /// System/instruction text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Bypass cache lookup, storage, and coalescing for this request.
    /// For callers that must guarantee a fresh answer.
    #[serde(default)]
    pub skip_cache: bool,

    /// Opaque caller metadata. Never part of the cache fingerprint: two
    /// requests differing only here are the same request to the cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl CompletionRequest {
    /// Create a request with the given prompt.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            provider: None,
            temperature: None,
            max_tokens: None,
            top_p: None,
            stop_sequences: Vec::new(),
            system: None,
            skip_cache: false,
            metadata: None,
        }
    }

    /// Target a specific provider instead of the process default.
    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set max tokens.
    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set top_p.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set stop sequences.
    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.stop_sequences = sequences;
        self
    }

    /// Add a single stop sequence.
    pub fn stop_sequence(mut self, sequence: impl Into<String>) -> Self {
        self.stop_sequences.push(sequence.into());
        self
    }

    /// Set system/instruction text.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Force a fresh answer, bypassing the cache entirely.
    pub fn skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Attach opaque caller metadata (excluded from fingerprinting).
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
