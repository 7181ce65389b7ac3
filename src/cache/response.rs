//! Memoizing response cache with request coalescing.
//!
//! [`ResponseCache::resolve`] is the single entry point for executing a
//! completion under cost control. For each request fingerprint it serves
//! a live cached response, joins an already in-flight fetch, or starts
//! the one upstream fetch that all concurrent identical requests share.
//!
//! # Architecture
//!
//! Cache entries, the in-flight registry, and the hit/miss counters live
//! behind one `Mutex`, which is only ever held for short synchronous
//! sections — never across an await. The miss decision and the in-flight
//! registration happen inside the same critical section, so two
//! concurrent misses for one key cannot both reach the provider.
//!
//! In-flight computations are `futures_util` [`Shared`] futures: every
//! joined caller polls the same underlying fetch and receives the same
//! resolved value, or the same error ([`MimirError`] is `Clone` for
//! exactly this reason). The registry entry is removed when the fetch
//! settles, success or failure, so a failed fetch never poisons later
//! attempts.
//!
//! # Eviction policy
//!
//! Capacity eviction is by ascending creation time, not last access:
//! a frequently re-read old entry goes before a never-reused recent one.
//! Lookups never touch entry placement or timestamps.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};

use super::key::fingerprint;
use crate::Result;
use crate::telemetry;
use crate::types::{CompletionRequest, CompletionResponse, Provider, Resolved};

/// Period between background prune sweeps.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Configuration for the response cache.
///
/// ```rust
/// # use mimir::cache::CacheConfig;
/// # use std::time::Duration;
/// let config = CacheConfig::new()
///     .max_entries(500)
///     .ttl(Duration::from_secs(120));
/// ```
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of cached entries. Default: 1,000.
    pub max_entries: usize,
    /// Time-to-live for cached entries. Default: 300 seconds.
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            ttl: Duration::from_secs(300),
        }
    }
}

impl CacheConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of cached entries.
    pub fn max_entries(mut self, n: usize) -> Self {
        self.max_entries = n;
        self
    }

    /// Set the time-to-live for cached entries.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Current cache size and running hit ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CacheMetrics {
    /// Number of entries currently stored (including not-yet-pruned
    /// expired ones).
    pub size: usize,
    /// `hits / (hits + misses)`, `0.0` before any request.
    pub hit_rate: f64,
}

/// A stored response. Immutable once created; `expires_at` is fixed at
/// insertion time and later TTL changes do not rewrite it.
struct CacheEntry {
    response: CompletionResponse,
    created_at: Instant,
    expires_at: Instant,
}

/// A pending upstream fetch that any number of callers can await.
type InflightFetch = Shared<BoxFuture<'static, Result<CompletionResponse>>>;

struct CacheState {
    entries: HashMap<u64, CacheEntry>,
    inflight: HashMap<u64, InflightFetch>,
    ttl: Duration,
    max_entries: usize,
    hits: u64,
    misses: u64,
}

impl CacheState {
    fn evict_overflow(&mut self) {
        while self.entries.len() > self.max_entries {
            let Some((&oldest, _)) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
            else {
                break;
            };
            self.entries.remove(&oldest);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        }
    }

    fn prune(&mut self, now: Instant) {
        self.entries.retain(|_, entry| entry.expires_at > now);
    }
}

/// Memoizing cache over upstream completion fetches.
///
/// Cheap to clone; clones share the same state. Construct a fresh
/// instance per test rather than resetting shared globals.
#[derive(Clone)]
pub struct ResponseCache {
    state: Arc<Mutex<CacheState>>,
}

impl ResponseCache {
    /// Create a new response cache with the given configuration.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            state: Arc::new(Mutex::new(CacheState {
                entries: HashMap::new(),
                inflight: HashMap::new(),
                ttl: config.ttl,
                max_entries: config.max_entries,
                hits: 0,
                misses: 0,
            })),
        }
    }

    /// Resolve a request to a response, consulting the cache first.
    ///
    /// `fetch` produces the upstream computation and is invoked at most
    /// once per fingerprint at a time, however many callers arrive
    /// concurrently. `default_provider` fills in the fingerprint when
    /// the request names no provider.
    ///
    /// With `skip_cache` set on the request, the fetch runs directly:
    /// no lookup, no coalescing, no storage, no counter movement.
    pub async fn resolve<F, Fut>(
        &self,
        request: &CompletionRequest,
        default_provider: Provider,
        fetch: F,
    ) -> Result<Resolved>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompletionResponse>> + Send + 'static,
    {
        if request.skip_cache {
            let response = fetch().await?;
            return Ok(Resolved {
                response,
                cached: false,
            });
        }

        let key = fingerprint(request, default_provider);

        let pending = {
            let mut state = self.state.lock().expect("cache lock poisoned");
            let now = Instant::now();

            if let Some(entry) = state.entries.get(&key) {
                if entry.expires_at > now {
                    let response = entry.response.clone();
                    state.hits += 1;
                    metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                    tracing::debug!(key, "cache hit");
                    return Ok(Resolved {
                        response,
                        cached: true,
                    });
                }
            }

            if let Some(pending) = state.inflight.get(&key) {
                metrics::counter!(telemetry::CACHE_COALESCED_TOTAL).increment(1);
                tracing::debug!(key, "joining in-flight fetch");
                pending.clone()
            } else {
                state.misses += 1;
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                tracing::debug!(key, "cache miss, starting fetch");
                // Building the future does not run it, so calling
                // `fetch` here keeps the miss decision and the
                // registration in one critical section.
                let pending = Self::settling(Arc::clone(&self.state), key, fetch());
                state.inflight.insert(key, pending.clone());
                pending
            }
        };

        let response = pending.await?;
        Ok(Resolved {
            response,
            cached: false,
        })
    }

    /// Wrap a fetch so that, on settlement, it deregisters itself and
    /// (on success only) stores the entry and enforces capacity.
    fn settling(
        state: Arc<Mutex<CacheState>>,
        key: u64,
        fut: impl Future<Output = Result<CompletionResponse>> + Send + 'static,
    ) -> InflightFetch {
        async move {
            let result = fut.await;
            let mut state = state.lock().expect("cache lock poisoned");
            state.inflight.remove(&key);
            if let Ok(response) = &result {
                let now = Instant::now();
                let expires_at = now + state.ttl;
                state.entries.insert(
                    key,
                    CacheEntry {
                        response: response.clone(),
                        created_at: now,
                        expires_at,
                    },
                );
                state.evict_overflow();
            }
            result
        }
        .boxed()
        .shared()
    }

    /// Remove all expired entries. Idempotent and safe to call
    /// concurrently with `resolve`.
    pub fn prune(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.prune(Instant::now());
    }

    /// Empty the cache and reset the hit/miss counters.
    ///
    /// In-flight fetches are untouched; they still settle and, being
    /// misses, repopulate the now-empty cache.
    pub fn clear(&self) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.entries.clear();
        state.hits = 0;
        state.misses = 0;
    }

    /// Update TTL and, optionally, capacity for future entries, then
    /// run an immediate prune/eviction pass.
    ///
    /// Existing entries keep the `expires_at` they were stored with.
    pub fn configure(&self, ttl: Duration, max_entries: Option<usize>) {
        let mut state = self.state.lock().expect("cache lock poisoned");
        state.ttl = ttl;
        if let Some(max) = max_entries {
            state.max_entries = max;
        }
        state.prune(Instant::now());
        state.evict_overflow();
    }

    /// Current entry count and running hit ratio.
    pub fn metrics(&self) -> CacheMetrics {
        let state = self.state.lock().expect("cache lock poisoned");
        let total = state.hits + state.misses;
        let hit_rate = if total == 0 {
            0.0
        } else {
            state.hits as f64 / total as f64
        };
        CacheMetrics {
            size: state.entries.len(),
            hit_rate,
        }
    }

    /// Spawn a background task pruning expired entries every `period`.
    ///
    /// The task holds only a weak reference to the cache and exits once
    /// every cache handle has been dropped.
    ///
    /// # Panics
    ///
    /// Requires a tokio runtime context.
    pub fn spawn_sweeper(&self, period: Duration) -> tokio::task::JoinHandle<()> {
        let state: Weak<Mutex<CacheState>> = Arc::downgrade(&self.state);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                let Some(state) = state.upgrade() else { break };
                let mut state = state.lock().expect("cache lock poisoned");
                state.prune(Instant::now());
            }
        })
    }
}
