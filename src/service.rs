//! Service facade composing the cache and the gate.
//!
//! [`CompletionService`] wires the two independent cost-control
//! components together for callers: every [`execute`] call goes through
//! the response cache, and the fetch that runs on a miss first passes
//! the admission gate, holding its permit for the whole provider call.
//!
//! The service also carries the control surfaces the surrounding system
//! exposes: cache statistics/clear/settings, process-wide default
//! provider selection, and gate utilization. DTO field names match the
//! wire shapes those surfaces serve.
//!
//! [`execute`]: CompletionService::execute

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheConfig, DEFAULT_SWEEP_INTERVAL, ResponseCache};
use crate::config;
use crate::gate::{AdmissionGate, GateObserver};
use crate::traits::CompletionProvider;
use crate::types::{CompletionRequest, Provider, Resolved};
use crate::{MimirError, Result};

/// Main entry point for creating service instances.
pub struct Mimir;

impl Mimir {
    /// Create a new builder for configuring the service.
    pub fn builder() -> MimirBuilder {
        MimirBuilder::new()
    }
}

/// Builder for configuring [`CompletionService`] instances.
pub struct MimirBuilder {
    providers: HashMap<Provider, Arc<dyn CompletionProvider>>,
    cache_config: CacheConfig,
    max_concurrent: Option<usize>,
    default_provider: Provider,
    observers: Vec<Arc<dyn GateObserver>>,
}

impl MimirBuilder {
    pub fn new() -> Self {
        Self {
            providers: HashMap::new(),
            cache_config: CacheConfig::default(),
            max_concurrent: None,
            default_provider: Provider::default(),
            observers: Vec::new(),
        }
    }

    /// Register an upstream provider under an id. Last registration for
    /// an id wins.
    pub fn provider(mut self, id: Provider, provider: Arc<dyn CompletionProvider>) -> Self {
        self.providers.insert(id, provider);
        self
    }

    /// Configure the response cache.
    pub fn cache(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Cap for concurrently admitted provider calls.
    ///
    /// Defaults to the `MIMIR_MAX_CONCURRENT` environment variable,
    /// falling back to [`config::DEFAULT_MAX_CONCURRENT`].
    pub fn max_concurrent(mut self, n: usize) -> Self {
        self.max_concurrent = Some(n);
        self
    }

    /// Initial process-wide default provider.
    pub fn default_provider(mut self, provider: Provider) -> Self {
        self.default_provider = provider;
        self
    }

    /// Attach a lifecycle observer to the admission gate.
    pub fn gate_observer(mut self, observer: Arc<dyn GateObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Build the service.
    pub fn build(self) -> Result<CompletionService> {
        if self.providers.is_empty() {
            return Err(MimirError::NoProvider);
        }

        let capacity = self
            .max_concurrent
            .unwrap_or_else(config::max_concurrent_from_env);

        Ok(CompletionService {
            cache: ResponseCache::new(&self.cache_config),
            gate: AdmissionGate::with_observers(capacity, self.observers),
            providers: self.providers,
            default_provider: RwLock::new(self.default_provider),
        })
    }
}

impl Default for MimirBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Executes completion requests under cost control.
pub struct CompletionService {
    cache: ResponseCache,
    gate: AdmissionGate,
    providers: HashMap<Provider, Arc<dyn CompletionProvider>>,
    default_provider: RwLock<Provider>,
}

impl std::fmt::Debug for CompletionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionService")
            .field("default_provider", &self.default_provider)
            .finish_non_exhaustive()
    }
}

impl CompletionService {
    /// Execute a request: cache hit, coalesced join, or admitted fetch.
    ///
    /// On a miss the fetch first passes the admission gate; a full gate
    /// surfaces as [`MimirError::CapacityExceeded`] to this caller and
    /// any coalesced ones. The permit is held across the provider call
    /// and released on every exit path.
    pub async fn execute(&self, request: &CompletionRequest) -> Result<Resolved> {
        let provider_id = request.provider.unwrap_or_else(|| self.default_provider());
        let provider = self
            .providers
            .get(&provider_id)
            .cloned()
            .ok_or_else(|| MimirError::UnknownProvider(provider_id.to_string()))?;

        let gate = self.gate.clone();
        let req = request.clone();
        self.cache
            .resolve(request, provider_id, move || async move {
                let _permit = gate.try_admit(format!("completion via {provider_id}"))?;
                provider.complete(&req).await
            })
            .await
    }

    /// The current process-wide default provider.
    pub fn default_provider(&self) -> Provider {
        *self
            .default_provider
            .read()
            .expect("default provider lock poisoned")
    }

    /// Set the process-wide default provider used when a request names
    /// none.
    pub fn set_default_provider(&self, provider: Provider) {
        *self
            .default_provider
            .write()
            .expect("default provider lock poisoned") = provider;
    }

    /// Cache statistics surface.
    pub fn cache_stats(&self) -> CacheStats {
        let metrics = self.cache.metrics();
        CacheStats {
            size: metrics.size,
            hit_rate: metrics.hit_rate,
        }
    }

    /// Cache clear surface.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache settings surface. Invalid values are rejected before any
    /// cache state changes.
    pub fn update_cache_settings(&self, settings: CacheSettings) -> Result<()> {
        if settings.ttl_in_seconds < 1 {
            return Err(MimirError::Configuration(
                "ttlInSeconds must be at least 1".to_string(),
            ));
        }
        if settings.max_size < 1 {
            return Err(MimirError::Configuration(
                "maxSize must be at least 1".to_string(),
            ));
        }
        self.cache.configure(
            Duration::from_secs(settings.ttl_in_seconds),
            Some(settings.max_size),
        );
        Ok(())
    }

    /// Utilization surface, reporting the gate's stats under the field
    /// names the dashboard displays.
    pub fn utilization(&self) -> Utilization {
        let stats = self.gate.stats();
        Utilization {
            active_threads: stats.active,
            max_threads: stats.capacity,
            available_threads: stats.available,
        }
    }

    /// Spawn the periodic cache sweep (every
    /// [`DEFAULT_SWEEP_INTERVAL`]). The task stops once the service is
    /// dropped.
    pub fn spawn_cache_sweeper(&self) -> tokio::task::JoinHandle<()> {
        self.cache.spawn_sweeper(DEFAULT_SWEEP_INTERVAL)
    }

    /// Direct access to the response cache.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Direct access to the admission gate.
    pub fn gate(&self) -> &AdmissionGate {
        &self.gate
    }
}

/// Wire shape of the cache statistics surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub size: usize,
    pub hit_rate: f64,
}

/// Wire shape accepted by the cache settings surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSettings {
    pub ttl_in_seconds: u64,
    pub max_size: usize,
}

/// Wire shape of the utilization surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Utilization {
    pub active_threads: usize,
    pub max_threads: usize,
    pub available_threads: usize,
}
