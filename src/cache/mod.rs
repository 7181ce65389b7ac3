//! Caching subsystem.
//!
//! Two collaborating pieces:
//!
//! - [`key`] — request fingerprinting. Deterministic content hash over
//!   the fields that change what a provider would generate; everything
//!   else (caller metadata, cache directives) is excluded.
//!
//! - [`response::ResponseCache`] — TTL + capacity-bounded memoization of
//!   provider responses with coalescing of concurrent identical
//!   requests. See the [`response`] module docs for the concurrency
//!   story and the deliberate insertion-order eviction policy.

pub mod key;
pub mod response;

pub use key::{DEFAULT_TEMPERATURE, fingerprint};
pub use response::{CacheConfig, CacheMetrics, DEFAULT_SWEEP_INTERVAL, ResponseCache};
