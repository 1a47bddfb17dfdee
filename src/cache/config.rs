//! Cache configuration.
//!
//! Controls the prediction cache backend, TTLs and timeouts via `scorecast.toml`.

use std::num::NonZeroUsize;
use std::time::Duration;

use super::keys::Namespace;

// Default values for cache configuration
const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";
const DEFAULT_KEY_PREFIX: &str = "scorecast:";
const DEFAULT_SCORE_TTL_SECS: u64 = 3600;
const DEFAULT_CLUSTER_TTL_SECS: u64 = 300;
const DEFAULT_OPERATION_TIMEOUT_MS: u64 = 1000;
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 500;
const DEFAULT_MEMORY_CAPACITY: usize = 10_000;

/// Which store backs the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    Redis,
    Memory,
}

impl CacheBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "redis" => Some(Self::Redis),
            "memory" => Some(Self::Memory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// When false every lookup is a miss and nothing is written.
    pub enabled: bool,
    pub backend: CacheBackend,
    pub redis_url: String,
    /// Prepended to every store key; flushes never leave this prefix.
    pub key_prefix: String,
    pub score_ttl: Duration,
    pub cluster_ttl: Duration,
    /// Upper bound for a single store round-trip.
    pub operation_timeout: Duration,
    pub connect_timeout: Duration,
    /// Entry limit of the in-process backend.
    pub memory_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::Redis,
            redis_url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            score_ttl: Duration::from_secs(DEFAULT_SCORE_TTL_SECS),
            cluster_ttl: Duration::from_secs(DEFAULT_CLUSTER_TTL_SECS),
            operation_timeout: Duration::from_millis(DEFAULT_OPERATION_TIMEOUT_MS),
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            memory_capacity: DEFAULT_MEMORY_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            backend: settings.backend,
            redis_url: settings.redis_url.clone(),
            key_prefix: settings.key_prefix.clone(),
            score_ttl: settings.score_ttl,
            cluster_ttl: settings.cluster_ttl,
            operation_timeout: settings.operation_timeout,
            connect_timeout: settings.connect_timeout,
            memory_capacity: settings.memory_capacity.get(),
        }
    }
}

impl CacheConfig {
    pub fn ttl_for(&self, namespace: Namespace) -> Duration {
        match namespace {
            Namespace::Score => self.score_ttl,
            Namespace::Cluster => self.cluster_ttl,
        }
    }

    /// Returns the memory capacity as NonZeroUsize, clamping to 1 if zero.
    pub fn memory_capacity_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.memory_capacity).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enabled);
        assert_eq!(config.backend, CacheBackend::Redis);
        assert_eq!(config.key_prefix, "scorecast:");
        assert_eq!(config.ttl_for(Namespace::Score), Duration::from_secs(3600));
        assert_eq!(config.ttl_for(Namespace::Cluster), Duration::from_secs(300));
        assert_eq!(config.operation_timeout, Duration::from_millis(1000));
        assert!(config.connect_timeout < config.operation_timeout);
    }

    #[test]
    fn zero_capacity_clamps_to_one() {
        let config = CacheConfig {
            memory_capacity: 0,
            ..Default::default()
        };
        assert_eq!(config.memory_capacity_non_zero().get(), 1);
    }

    #[test]
    fn backend_parsing_is_case_insensitive() {
        assert_eq!(CacheBackend::parse("Redis"), Some(CacheBackend::Redis));
        assert_eq!(CacheBackend::parse(" memory "), Some(CacheBackend::Memory));
        assert_eq!(CacheBackend::parse("memcached"), None);
    }
}
