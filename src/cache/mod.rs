//! Prediction cache.
//!
//! Predictions are memoised in an external key-value store keyed by a digest
//! of the input features:
//!
//! - **keys**: namespace + SHA-256 digest of the canonical feature form
//! - **store**: the `CacheStore` seam with Redis and in-process LRU backends
//! - **client**: JSON encoding, TTLs, timeouts and degrade-to-miss semantics
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! backend = "redis"
//! redis_url = "redis://127.0.0.1:6379"
//! score_ttl_seconds = 3600
//! # ... see config.rs for all options
//! ```

mod client;
mod config;
mod keys;
mod lock;
mod redis;
mod store;

pub use client::{CacheHealth, CacheStats, PredictionCache};
pub use self::config::{CacheBackend, CacheConfig};
pub use keys::{CacheKey, Namespace, canonical_form};
pub use self::redis::RedisStore;
pub use store::{CacheStore, CacheStoreError, MemoryStore, StoreInfo};
