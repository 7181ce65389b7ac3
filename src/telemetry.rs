//! Telemetry metric name constants.
//!
//! Centralised metric names for mimir operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `mimir_`. Counters end in `_total`.
//!
//! # Common labels
//!
//! - `provider` — provider id the request resolved to

/// Total cache hits served without touching a provider.
pub const CACHE_HITS_TOTAL: &str = "mimir_cache_hits_total";

/// Total cache misses that registered a new upstream fetch.
pub const CACHE_MISSES_TOTAL: &str = "mimir_cache_misses_total";

/// Total callers that joined an already in-flight fetch instead of
/// starting their own.
pub const CACHE_COALESCED_TOTAL: &str = "mimir_cache_coalesced_total";

/// Total entries evicted because the cache exceeded its capacity.
pub const CACHE_EVICTIONS_TOTAL: &str = "mimir_cache_evictions_total";

/// Total tasks admitted by the gate.
pub const GATE_ADMISSIONS_TOTAL: &str = "mimir_gate_admissions_total";

/// Total tasks rejected because the gate was full.
pub const GATE_REJECTIONS_TOTAL: &str = "mimir_gate_rejections_total";

/// Total permits released back to the gate.
pub const GATE_RELEASES_TOTAL: &str = "mimir_gate_releases_total";
