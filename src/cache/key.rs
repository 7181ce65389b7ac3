//! Request fingerprinting.
//!
//! A fingerprint is a content hash over the fields that determine what
//! a provider would generate: prompt, resolved provider, sampling
//! parameters, stop sequences, and system text. Fields that do not
//! change the completion (`skip_cache`, caller metadata) are excluded,
//! so two requests differing only there share a cache entry.
//!
//! Uses `DefaultHasher` (SipHash) for a reasonable collision-resistance
//! / performance trade-off. The hash is deterministic within a process
//! lifetime, which is sufficient for an in-memory cache. For a future
//! distributed backend, replace with a stable cross-process hash.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::types::{CompletionRequest, Provider};

/// Temperature assumed when a request sets none.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Compute the cache fingerprint for a request.
///
/// `default_provider` is substituted when the request names no provider,
/// so the key always reflects the provider that would actually serve it.
/// Fields are hashed in a fixed order; each listed field contributes to
/// the key, and nothing else does.
pub fn fingerprint(request: &CompletionRequest, default_provider: Provider) -> u64 {
    let mut hasher = DefaultHasher::new();

    request.prompt.hash(&mut hasher);
    request
        .provider
        .unwrap_or(default_provider)
        .as_str()
        .hash(&mut hasher);
    request
        .temperature
        .unwrap_or(DEFAULT_TEMPERATURE)
        .to_bits()
        .hash(&mut hasher);
    request.max_tokens.hash(&mut hasher);
    request.top_p.map(f32::to_bits).hash(&mut hasher);
    request.stop_sequences.hash(&mut hasher);
    request.system.hash(&mut hasher);

    hasher.finish()
}
