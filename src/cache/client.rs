//! Prediction cache client.
//!
//! Wraps a [`CacheStore`] with JSON encoding, the service key prefix,
//! per-namespace TTLs and a bounded timeout on every round-trip. The cache is
//! an optimisation: any store failure is logged, counted and then treated as
//! a miss (reads) or skipped (writes). Nothing here returns an error.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use super::config::{CacheBackend, CacheConfig};
use super::keys::{CacheKey, Namespace};
use super::redis::RedisStore;
use super::store::{CacheStore, CacheStoreError, MemoryStore};

pub(crate) const METRIC_CACHE_HIT: &str = "scorecast_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "scorecast_cache_miss_total";
pub(crate) const METRIC_CACHE_ERROR: &str = "scorecast_cache_error_total";

/// Cache statistics combining this process's view with store-reported figures.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub backend: &'static str,
    pub connected: bool,
    /// Lookups answered from the cache by this process.
    pub hit_count: u64,
    /// Lookups this process had to compute, including lookups during outages.
    pub miss_count: u64,
    /// Percentage of lookups served from the cache, two decimals.
    pub hit_rate: f64,
    pub memory_used_bytes: Option<u64>,
    pub memory_used_human: Option<String>,
    pub eviction_count: Option<u64>,
    pub keyspace_hits: Option<u64>,
    pub keyspace_misses: Option<u64>,
    pub connected_clients: Option<u64>,
    pub server_version: Option<String>,
    pub uptime_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connectivity as reported by `/health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHealth {
    Connected,
    Unavailable,
    Disabled,
}

impl CacheHealth {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::Unavailable => "unavailable",
            Self::Disabled => "disabled",
        }
    }
}

pub struct PredictionCache {
    config: CacheConfig,
    store: Option<Arc<dyn CacheStore>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl PredictionCache {
    pub fn new(config: CacheConfig, store: Arc<dyn CacheStore>) -> Self {
        Self {
            config,
            store: Some(store),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// A cache that never stores anything; every lookup is a miss.
    pub fn disabled(config: CacheConfig) -> Self {
        Self {
            config: CacheConfig {
                enabled: false,
                ..config
            },
            store: None,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Build the configured backend. Only an unparsable Redis URL fails here;
    /// connectivity problems surface later as misses.
    pub fn from_config(config: CacheConfig) -> Result<Self, CacheStoreError> {
        if !config.enabled {
            return Ok(Self::disabled(config));
        }

        let store: Arc<dyn CacheStore> = match config.backend {
            CacheBackend::Redis => Arc::new(RedisStore::new(
                &config.redis_url,
                config.connect_timeout,
            )?),
            CacheBackend::Memory => Arc::new(MemoryStore::new(config.memory_capacity_non_zero())),
        };
        Ok(Self::new(config, store))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend(&self) -> &'static str {
        self.store.as_ref().map_or("none", |store| store.backend())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let found = match self.store.as_ref() {
            Some(store) => {
                let store_key = self.store_key(key);
                self.guarded("get", store.get(&store_key))
                    .await
                    .flatten()
                    .and_then(|raw| self.decode(key, &raw))
            }
            None => None,
        };

        self.record_lookups(
            key.namespace(),
            found.is_some() as u64,
            found.is_none() as u64,
        );
        found
    }

    pub async fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let Some(encoded) = self.encode(key, value) else {
            return;
        };

        let ttl = self.config.ttl_for(key.namespace());
        let store_key = self.store_key(key);
        self.guarded("set", store.set(&store_key, &encoded, ttl))
            .await;
    }

    /// Look up `keys` in one round-trip. The result is index-aligned with `keys`.
    pub async fn batch_get<T: DeserializeOwned>(&self, keys: &[CacheKey]) -> Vec<Option<T>> {
        if keys.is_empty() {
            return Vec::new();
        }

        let raw = match self.store.as_ref() {
            Some(store) => {
                let store_keys: Vec<String> = keys.iter().map(|key| self.store_key(key)).collect();
                self.guarded("batch_get", store.get_many(&store_keys))
                    .await
                    .filter(|values| {
                        if values.len() == keys.len() {
                            true
                        } else {
                            warn!(
                                target = "scorecast::cache",
                                expected = keys.len(),
                                received = values.len(),
                                "cache batch reply length mismatch; treating as misses"
                            );
                            false
                        }
                    })
            }
            None => None,
        };

        let values: Vec<Option<T>> = match raw {
            Some(values) => keys
                .iter()
                .zip(values)
                .map(|(key, raw)| raw.and_then(|raw| self.decode(key, &raw)))
                .collect(),
            None => keys.iter().map(|_| None).collect(),
        };

        let mut per_namespace: HashMap<Namespace, (u64, u64)> = HashMap::new();
        for (key, value) in keys.iter().zip(&values) {
            let slot = per_namespace.entry(key.namespace()).or_default();
            if value.is_some() {
                slot.0 += 1;
            } else {
                slot.1 += 1;
            }
        }
        for (namespace, (hits, misses)) in per_namespace {
            self.record_lookups(namespace, hits, misses);
        }

        values
    }

    /// Write `entries` in one round-trip per namespace.
    pub async fn batch_set<T: Serialize>(&self, entries: &[(CacheKey, T)]) {
        let Some(store) = self.store.as_ref() else {
            return;
        };
        if entries.is_empty() {
            return;
        }

        let mut grouped: HashMap<Namespace, Vec<(String, String)>> = HashMap::new();
        for (key, value) in entries {
            if let Some(encoded) = self.encode(key, value) {
                grouped
                    .entry(key.namespace())
                    .or_default()
                    .push((self.store_key(key), encoded));
            }
        }

        for (namespace, encoded) in grouped {
            let ttl = self.config.ttl_for(namespace);
            self.guarded("batch_set", store.set_many(&encoded, ttl))
                .await;
        }
    }

    /// Remove entries under the service prefix matching `pattern`.
    /// Returns how many were removed; zero when the store is unreachable.
    pub async fn flush(&self, pattern: &str) -> u64 {
        let Some(store) = self.store.as_ref() else {
            return 0;
        };

        let pattern = if pattern.trim().is_empty() {
            "*"
        } else {
            pattern.trim()
        };
        let full_pattern = format!("{}{}", self.config.key_prefix, pattern);
        self.guarded("flush", store.delete_matching(&full_pattern))
            .await
            .unwrap_or(0)
    }

    pub async fn stats(&self) -> CacheStats {
        let hit_count = self.hits.load(Ordering::Relaxed);
        let miss_count = self.misses.load(Ordering::Relaxed);
        let mut stats = CacheStats {
            enabled: self.config.enabled,
            backend: self.backend(),
            connected: false,
            hit_count,
            miss_count,
            hit_rate: hit_rate(hit_count, miss_count),
            memory_used_bytes: None,
            memory_used_human: None,
            eviction_count: None,
            keyspace_hits: None,
            keyspace_misses: None,
            connected_clients: None,
            server_version: None,
            uptime_seconds: None,
            error: None,
        };

        let Some(store) = self.store.as_ref() else {
            return stats;
        };

        match tokio::time::timeout(self.config.operation_timeout, store.info()).await {
            Ok(Ok(info)) => {
                stats.connected = true;
                stats.memory_used_bytes = Some(info.used_memory_bytes);
                stats.memory_used_human = info.used_memory_human;
                stats.eviction_count = Some(info.evicted_keys);
                stats.keyspace_hits = Some(info.keyspace_hits);
                stats.keyspace_misses = Some(info.keyspace_misses);
                stats.connected_clients = info.connected_clients;
                stats.server_version = info.server_version;
                stats.uptime_seconds = info.uptime_seconds;
            }
            Ok(Err(err)) => {
                self.report_failure("stats", &err);
                stats.error = Some(err.to_string());
            }
            Err(_) => {
                let err = CacheStoreError::Timeout(self.config.operation_timeout);
                self.report_failure("stats", &err);
                stats.error = Some(err.to_string());
            }
        }

        stats
    }

    pub async fn health(&self) -> CacheHealth {
        match self.store.as_ref() {
            None => CacheHealth::Disabled,
            Some(store) => match self.guarded("ping", store.ping()).await {
                Some(()) => CacheHealth::Connected,
                None => CacheHealth::Unavailable,
            },
        }
    }

    fn store_key(&self, key: &CacheKey) -> String {
        format!("{}{}", self.config.key_prefix, key)
    }

    /// Run a store call under the operation timeout, absorbing failures.
    async fn guarded<T, F>(&self, op: &'static str, call: F) -> Option<T>
    where
        F: Future<Output = Result<T, CacheStoreError>>,
    {
        match tokio::time::timeout(self.config.operation_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(err)) => {
                self.report_failure(op, &err);
                None
            }
            Err(_) => {
                self.report_failure(op, &CacheStoreError::Timeout(self.config.operation_timeout));
                None
            }
        }
    }

    fn report_failure(&self, op: &'static str, err: &CacheStoreError) {
        counter!(METRIC_CACHE_ERROR, "op" => op).increment(1);
        warn!(
            target = "scorecast::cache",
            op,
            backend = self.backend(),
            error = %err,
            "cache operation failed; continuing without cache"
        );
    }

    fn record_lookups(&self, namespace: Namespace, hits: u64, misses: u64) {
        if hits > 0 {
            self.hits.fetch_add(hits, Ordering::Relaxed);
            counter!(METRIC_CACHE_HIT, "namespace" => namespace.as_str()).increment(hits);
        }
        if misses > 0 {
            self.misses.fetch_add(misses, Ordering::Relaxed);
            counter!(METRIC_CACHE_MISS, "namespace" => namespace.as_str()).increment(misses);
        }
    }

    fn encode<T: Serialize>(&self, key: &CacheKey, value: &T) -> Option<String> {
        match serde_json::to_string(value) {
            Ok(encoded) => Some(encoded),
            Err(err) => {
                warn!(
                    target = "scorecast::cache",
                    key = %key,
                    error = %err,
                    "failed to encode cache value"
                );
                None
            }
        }
    }

    fn decode<T: DeserializeOwned>(&self, key: &CacheKey, raw: &str) -> Option<T> {
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(
                    target = "scorecast::cache",
                    key = %key,
                    error = %err,
                    "discarding undecodable cache entry"
                );
                None
            }
        }
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 {
        return 0.0;
    }
    ((hits as f64 / total as f64) * 10_000.0).round() / 100.0
}
