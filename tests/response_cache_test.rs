//! Tests for [`ResponseCache`] — memoization, coalescing, TTL, eviction.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use mimir::cache::{CacheConfig, ResponseCache};
use mimir::types::{CompletionRequest, CompletionResponse, Provider, Usage};
use mimir::MimirError;

fn make_response(text: &str) -> CompletionResponse {
    CompletionResponse {
        text: text.to_string(),
        usage: Some(Usage {
            prompt_tokens: 3,
            completion_tokens: 7,
            total_tokens: 10,
        }),
        model: None,
    }
}

/// Fetch that counts invocations and resolves after `delay`.
fn counted_fetch(
    calls: &Arc<AtomicUsize>,
    text: &str,
    delay: Duration,
) -> impl Future<Output = mimir::Result<CompletionResponse>> + Send + 'static {
    let calls = Arc::clone(calls);
    let text = text.to_string();
    async move {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(delay).await;
        Ok(make_response(&text))
    }
}

// =========================================================================
// Hit identity
// =========================================================================

#[tokio::test]
async fn second_resolve_is_a_hit_with_identical_content() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    let request = CompletionRequest::new("hello");

    let first = cache
        .resolve(&request, Provider::OpenRouter, || {
            counted_fetch(&calls, "answer", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(!first.cached);

    let second = cache
        .resolve(&request, Provider::OpenRouter, || {
            counted_fetch(&calls, "different answer", Duration::ZERO)
        })
        .await
        .unwrap();

    assert!(second.cached);
    assert_eq!(second.response, first.response);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn different_requests_do_not_share_entries() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    for prompt in ["alpha", "beta"] {
        cache
            .resolve(&CompletionRequest::new(prompt), Provider::OpenRouter, || {
                counted_fetch(&calls, prompt, Duration::ZERO)
            })
            .await
            .unwrap();
    }

    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(cache.metrics().size, 2);
}

// =========================================================================
// Coalescing
// =========================================================================

#[tokio::test]
async fn concurrent_identical_requests_share_one_fetch() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        tasks.push(tokio::spawn(async move {
            cache
                .resolve(
                    &CompletionRequest::new("shared prompt"),
                    Provider::OpenRouter,
                    || counted_fetch(&calls, "shared answer", Duration::from_millis(100)),
                )
                .await
        }));
    }

    for task in tasks {
        let resolved = task.await.unwrap().unwrap();
        assert_eq!(resolved.response.text, "shared answer");
        // Joiners did not read a stored entry.
        assert!(!resolved.cached);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // One miss was recorded for the whole coalesced set.
    let metrics = cache.metrics();
    assert_eq!(metrics.size, 1);
    assert_eq!(metrics.hit_rate, 0.0);
}

#[tokio::test]
async fn coalesced_failure_reaches_every_caller_and_is_not_cached() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let failing_fetch = |calls: &Arc<AtomicUsize>| {
        let calls = Arc::clone(calls);
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(100)).await;
            Err::<CompletionResponse, _>(MimirError::Api {
                status: 500,
                message: "provider exploded".to_string(),
            })
        }
    };

    let mut tasks = Vec::new();
    for _ in 0..4 {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        tasks.push(tokio::spawn(async move {
            cache
                .resolve(
                    &CompletionRequest::new("doomed prompt"),
                    Provider::OpenRouter,
                    move || failing_fetch(&calls),
                )
                .await
        }));
    }

    for task in tasks {
        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, MimirError::Api { status: 500, .. }));
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.metrics().size, 0);

    // The failure did not poison the key: the next resolve fetches anew.
    let resolved = cache
        .resolve(
            &CompletionRequest::new("doomed prompt"),
            Provider::OpenRouter,
            || counted_fetch(&calls, "recovered", Duration::ZERO),
        )
        .await
        .unwrap();
    assert_eq!(resolved.response.text, "recovered");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

// =========================================================================
// skip_cache
// =========================================================================

#[tokio::test]
async fn skip_cache_bypasses_lookup_storage_and_counters() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    // Populate the entry the skipping request would otherwise hit.
    cache
        .resolve(&CompletionRequest::new("prompt"), Provider::OpenRouter, || {
            counted_fetch(&calls, "stored", Duration::ZERO)
        })
        .await
        .unwrap();
    let before = cache.metrics();

    let fresh = cache
        .resolve(
            &CompletionRequest::new("prompt").skip_cache(true),
            Provider::OpenRouter,
            || counted_fetch(&calls, "fresh", Duration::ZERO),
        )
        .await
        .unwrap();

    assert!(!fresh.cached);
    assert_eq!(fresh.response.text, "fresh");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    // No counter moved and nothing new was stored.
    assert_eq!(cache.metrics(), before);

    // The stored entry is still the original one.
    let hit = cache
        .resolve(&CompletionRequest::new("prompt"), Provider::OpenRouter, || {
            counted_fetch(&calls, "unused", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(hit.cached);
    assert_eq!(hit.response.text, "stored");
}

// =========================================================================
// TTL expiry and pruning
// =========================================================================

#[tokio::test]
async fn entry_expires_after_ttl() {
    let config = CacheConfig::new().ttl(Duration::from_millis(50));
    let cache = ResponseCache::new(&config);
    let calls = Arc::new(AtomicUsize::new(0));
    let request = CompletionRequest::new("ephemeral");

    cache
        .resolve(&request, Provider::OpenRouter, || {
            counted_fetch(&calls, "v1", Duration::ZERO)
        })
        .await
        .unwrap();

    // Live before the deadline.
    let hit = cache
        .resolve(&request, Provider::OpenRouter, || {
            counted_fetch(&calls, "unused", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(hit.cached);

    tokio::time::sleep(Duration::from_millis(100)).await;

    // Expired: the fetch runs again.
    let miss = cache
        .resolve(&request, Provider::OpenRouter, || {
            counted_fetch(&calls, "v2", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(!miss.cached);
    assert_eq!(miss.response.text, "v2");
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn prune_removes_expired_entries_and_is_idempotent() {
    let config = CacheConfig::new().ttl(Duration::from_millis(30));
    let cache = ResponseCache::new(&config);
    let calls = Arc::new(AtomicUsize::new(0));

    for prompt in ["one", "two"] {
        cache
            .resolve(&CompletionRequest::new(prompt), Provider::OpenRouter, || {
                counted_fetch(&calls, prompt, Duration::ZERO)
            })
            .await
            .unwrap();
    }
    assert_eq!(cache.metrics().size, 2);

    tokio::time::sleep(Duration::from_millis(80)).await;

    // Expiry is lazy: entries linger until a sweep.
    assert_eq!(cache.metrics().size, 2);
    cache.prune();
    assert_eq!(cache.metrics().size, 0);
    cache.prune();
    assert_eq!(cache.metrics().size, 0);
}

#[tokio::test]
async fn background_sweeper_prunes_without_lookups() {
    let config = CacheConfig::new().ttl(Duration::from_millis(20));
    let cache = ResponseCache::new(&config);
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .resolve(&CompletionRequest::new("swept"), Provider::OpenRouter, || {
            counted_fetch(&calls, "swept", Duration::ZERO)
        })
        .await
        .unwrap();

    let sweeper = cache.spawn_sweeper(Duration::from_millis(40));
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert_eq!(cache.metrics().size, 0);

    // Dropping every cache handle stops the sweeper.
    drop(cache);
    tokio::time::timeout(Duration::from_millis(200), sweeper)
        .await
        .expect("sweeper should exit once the cache is dropped")
        .unwrap();
}

// =========================================================================
// Capacity eviction (oldest-created first)
// =========================================================================

#[tokio::test]
async fn eviction_is_by_creation_time_not_access_time() {
    let config = CacheConfig::new().max_entries(2);
    let cache = ResponseCache::new(&config);
    let calls = Arc::new(AtomicUsize::new(0));

    for prompt in ["a", "b"] {
        cache
            .resolve(&CompletionRequest::new(prompt), Provider::OpenRouter, || {
                counted_fetch(&calls, prompt, Duration::ZERO)
            })
            .await
            .unwrap();
        // Distinct creation timestamps.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // Re-read "a" repeatedly; access must not rescue it from eviction.
    for _ in 0..5 {
        let hit = cache
            .resolve(&CompletionRequest::new("a"), Provider::OpenRouter, || {
                counted_fetch(&calls, "unused", Duration::ZERO)
            })
            .await
            .unwrap();
        assert!(hit.cached);
    }

    cache
        .resolve(&CompletionRequest::new("c"), Provider::OpenRouter, || {
            counted_fetch(&calls, "c", Duration::ZERO)
        })
        .await
        .unwrap();

    assert_eq!(cache.metrics().size, 2);

    // "a" (oldest-created) is gone despite being hottest.
    let a = cache
        .resolve(&CompletionRequest::new("a"), Provider::OpenRouter, || {
            counted_fetch(&calls, "a again", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(!a.cached);

    // "b" survived.
    let b = cache
        .resolve(&CompletionRequest::new("b"), Provider::OpenRouter, || {
            counted_fetch(&calls, "unused", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(b.cached);
}

// =========================================================================
// Metrics arithmetic
// =========================================================================

#[tokio::test]
async fn hit_rate_is_hits_over_total_and_zero_when_empty() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    assert_eq!(cache.metrics().hit_rate, 0.0);
    assert_eq!(cache.metrics().size, 0);

    // 2 misses.
    for prompt in ["x", "y"] {
        cache
            .resolve(&CompletionRequest::new(prompt), Provider::OpenRouter, || {
                counted_fetch(&calls, prompt, Duration::ZERO)
            })
            .await
            .unwrap();
    }
    // 3 hits.
    for _ in 0..3 {
        cache
            .resolve(&CompletionRequest::new("x"), Provider::OpenRouter, || {
                counted_fetch(&calls, "unused", Duration::ZERO)
            })
            .await
            .unwrap();
    }

    let metrics = cache.metrics();
    assert_eq!(metrics.size, 2);
    assert!((metrics.hit_rate - 0.6).abs() < f64::EPSILON);

    cache.clear();
    let metrics = cache.metrics();
    assert_eq!(metrics.size, 0);
    assert_eq!(metrics.hit_rate, 0.0);
}

#[tokio::test]
async fn clear_does_not_cancel_inflight_fetches() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    let pending = {
        let cache = cache.clone();
        let calls = Arc::clone(&calls);
        tokio::spawn(async move {
            cache
                .resolve(&CompletionRequest::new("slow"), Provider::OpenRouter, || {
                    counted_fetch(&calls, "slow answer", Duration::from_millis(100))
                })
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    cache.clear();

    let resolved = pending.await.unwrap().unwrap();
    assert_eq!(resolved.response.text, "slow answer");
    // The settled miss repopulated the emptied cache.
    assert_eq!(cache.metrics().size, 1);
}

// =========================================================================
// configure()
// =========================================================================

#[tokio::test]
async fn configure_does_not_rewrite_existing_deadlines() {
    let config = CacheConfig::new().ttl(Duration::from_millis(50));
    let cache = ResponseCache::new(&config);
    let calls = Arc::new(AtomicUsize::new(0));

    cache
        .resolve(&CompletionRequest::new("old"), Provider::OpenRouter, || {
            counted_fetch(&calls, "old", Duration::ZERO)
        })
        .await
        .unwrap();

    // Raising the TTL must not extend the entry stored under the old one.
    cache.configure(Duration::from_secs(600), None);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let resolved = cache
        .resolve(&CompletionRequest::new("old"), Provider::OpenRouter, || {
            counted_fetch(&calls, "refetched", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(!resolved.cached);

    // The refetched entry got the new TTL and survives the same wait.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let hit = cache
        .resolve(&CompletionRequest::new("old"), Provider::OpenRouter, || {
            counted_fetch(&calls, "unused", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(hit.cached);
}

#[tokio::test]
async fn configure_shrinking_capacity_evicts_immediately() {
    let cache = ResponseCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));

    for prompt in ["a", "b", "c"] {
        cache
            .resolve(&CompletionRequest::new(prompt), Provider::OpenRouter, || {
                counted_fetch(&calls, prompt, Duration::ZERO)
            })
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(cache.metrics().size, 3);

    cache.configure(Duration::from_secs(300), Some(1));
    assert_eq!(cache.metrics().size, 1);

    // The survivor is the most recently created entry.
    let c = cache
        .resolve(&CompletionRequest::new("c"), Provider::OpenRouter, || {
            counted_fetch(&calls, "unused", Duration::ZERO)
        })
        .await
        .unwrap();
    assert!(c.cached);
}

// =========================================================================
// Telemetry (local debugging recorder)
// =========================================================================

/// Runs async cache operations within a local recorder scope.
///
/// Uses `block_in_place` + `block_on` to keep `with_local_recorder` on
/// the same thread (it's a thread-local recorder).
#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn counters_emitted_to_metrics_recorder() {
    use metrics_util::MetricKind;
    use metrics_util::debugging::{DebugValue, DebuggingRecorder};

    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();

    metrics::with_local_recorder(&recorder, || {
        tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async {
                let cache = ResponseCache::new(&CacheConfig::default());
                let calls = Arc::new(AtomicUsize::new(0));
                let request = CompletionRequest::new("metered");

                // Miss, then hit.
                for _ in 0..2 {
                    cache
                        .resolve(&request, Provider::OpenRouter, || {
                            counted_fetch(&calls, "metered", Duration::ZERO)
                        })
                        .await
                        .unwrap();
                }
            })
        })
    });

    let snapshot = snapshotter.snapshot().into_vec();
    let counter = |name: &str| -> u64 {
        snapshot
            .iter()
            .filter(|(key, _, _, _)| {
                key.kind() == MetricKind::Counter && key.key().name() == name
            })
            .map(|(_, _, _, val)| match val {
                DebugValue::Counter(c) => *c,
                _ => 0,
            })
            .sum()
    };

    assert_eq!(counter("mimir_cache_misses_total"), 1, "expected 1 miss");
    assert_eq!(counter("mimir_cache_hits_total"), 1, "expected 1 hit");
}
